//! Cursor over the ordered route matches of one request.

use super::route::RouteMatch;

/// The ordered, single-use sequence of matches for one request.
///
/// The match list itself never changes; a cursor marks how far execution has
/// progressed. [`advance`](Self::advance) hands out the next match and moves
/// past it in one step, so a handler that continues the chain can never be
/// handed its own match again.
#[derive(Debug, Default)]
pub struct RouteHandlerChain {
    matches: Vec<RouteMatch>,
    cursor: usize,
}

impl RouteHandlerChain {
    pub fn new(matches: Vec<RouteMatch>) -> Self {
        Self { matches, cursor: 0 }
    }

    /// Total number of matches, consumed or not.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Matches not yet handed out.
    pub fn remaining(&self) -> usize {
        self.matches.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.matches.len()
    }

    /// Every match, in execution order.
    pub fn matches(&self) -> &[RouteMatch] {
        &self.matches
    }

    /// Hands out the next match and moves past it.
    pub fn advance(&mut self) -> Option<&RouteMatch> {
        let next = self.matches.get(self.cursor)?;
        self.cursor += 1;
        Some(next)
    }

    /// Moves the cursor to the end, returning the matches that were skipped.
    pub fn skip_remaining(&mut self) -> &[RouteMatch] {
        let skipped = &self.matches[self.cursor..];
        self.cursor = self.matches.len();
        skipped
    }
}
