//! Route pattern parsing and matching.
//!
//! | Pattern               | Example match            | Captured params          |
//! |-----------------------|--------------------------|--------------------------|
//! | `/users`              | `/users`                 | *(none)*                 |
//! | `/users/{id}`         | `/users/42`              | `id → "42"`              |
//! | `/users/:id`          | `/users/42`              | `id → "42"`              |
//! | `/files/{path*}`      | `/files/docs/readme.txt` | `path → "docs/readme.txt"` |
//! | `/files/*`            | `/files/docs/readme.txt` | `wildcard → "docs/readme.txt"` |
//!
//! Patterns and paths are split on `/` with empty segments dropped, so a
//! trailing slash or a doubled slash never changes the outcome. Literal
//! segments compare byte-for-byte.

use std::fmt;

use super::error::RouteValidationError;
use crate::context::Parameters;

/// Name bound by a bare `*` wildcard.
pub const WILDCARD_PARAM: &str = "wildcard";

/// One segment of a compiled [`PathPattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Matches only the identical segment.
    Static(String),
    /// Matches any single segment and binds it under this name.
    Parameter(String),
    /// Matches the rest of the path, including slashes. Always last.
    Wildcard(String),
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compiles a pattern string.
    ///
    /// # Errors
    ///
    /// - [`RouteValidationError::EmptyPattern`] for `""`.
    /// - [`RouteValidationError::WildcardNotLast`] when a wildcard is followed by more segments.
    /// - [`RouteValidationError::EmptyParameterName`] for `{}`, `{*}` or a lone `:`.
    /// - [`RouteValidationError::DuplicateParameter`] when a name is bound twice.
    ///
    /// # Examples
    ///
    /// ```
    /// use pathway::router::PathPattern;
    ///
    /// let pattern = PathPattern::parse("/posts/{id}/comments/{comment_id}").unwrap();
    /// let params = pattern.matches("/posts/123/comments/456").unwrap();
    /// assert_eq!(params.get("id"), Some("123"));
    /// assert_eq!(params.get("comment_id"), Some("456"));
    /// ```
    pub fn parse(pattern: &str) -> Result<Self, RouteValidationError> {
        if pattern.is_empty() {
            return Err(RouteValidationError::EmptyPattern);
        }

        let mut segments: Vec<Segment> = Vec::new();
        for part in pattern.split('/').filter(|s| !s.is_empty()) {
            if matches!(segments.last(), Some(Segment::Wildcard(_))) {
                return Err(RouteValidationError::WildcardNotLast {
                    pattern: pattern.to_owned(),
                });
            }

            let segment = Self::parse_segment(part);
            if let Segment::Parameter(name) | Segment::Wildcard(name) = &segment {
                if name.is_empty() {
                    return Err(RouteValidationError::EmptyParameterName {
                        pattern: pattern.to_owned(),
                    });
                }
                if segments.iter().any(|s| s.param_name() == Some(name.as_str())) {
                    return Err(RouteValidationError::DuplicateParameter {
                        pattern: pattern.to_owned(),
                        name: name.clone(),
                    });
                }
            }
            segments.push(segment);
        }

        Ok(Self {
            source: pattern.to_owned(),
            segments,
        })
    }

    fn parse_segment(part: &str) -> Segment {
        if part == "*" {
            return Segment::Wildcard(WILDCARD_PARAM.to_owned());
        }
        if let Some(inner) = part.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            return match inner.strip_suffix('*') {
                Some(name) => Segment::Wildcard(name.to_owned()),
                None => Segment::Parameter(inner.to_owned()),
            };
        }
        if let Some(name) = part.strip_prefix(':') {
            return Segment::Parameter(name.to_owned());
        }
        Segment::Static(part.to_owned())
    }

    /// The pattern string this was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of all parameters, in pattern order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::param_name)
    }

    /// Returns `true` if the pattern ends in a wildcard.
    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard(_)))
    }

    /// Tries to match `path`, returning the bound parameters on success.
    ///
    /// Without a wildcard, the path must have exactly as many segments as the
    /// pattern. With one, it needs at least as many segments as the part of the
    /// pattern before the wildcard, and the rest is bound re-joined with `/`
    /// (possibly empty).
    pub fn matches(&self, path: &str) -> Option<Parameters> {
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let fixed = if self.has_wildcard() {
            self.segments.len() - 1
        } else {
            self.segments.len()
        };

        if self.has_wildcard() {
            if path_segments.len() < fixed {
                return None;
            }
        } else if path_segments.len() != fixed {
            return None;
        }

        let mut params = Parameters::new();
        for (segment, value) in self.segments.iter().zip(&path_segments) {
            match segment {
                Segment::Static(literal) => {
                    if literal != value {
                        return None;
                    }
                }
                Segment::Parameter(name) => params.insert(name.as_str(), *value),
                Segment::Wildcard(_) => break,
            }
        }

        if let Some(Segment::Wildcard(name)) = self.segments.last() {
            params.insert(name.as_str(), path_segments[fixed..].join("/"));
        }

        Some(params)
    }

    /// Builds a concrete path from `params`, or `None` if one is missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use pathway::context::Parameters;
    /// use pathway::router::PathPattern;
    ///
    /// let pattern = PathPattern::parse("/posts/{id}").unwrap();
    /// let params: Parameters = [("id", "123")].into_iter().collect();
    /// assert_eq!(pattern.reverse(&params).as_deref(), Some("/posts/123"));
    /// ```
    pub fn reverse(&self, params: &Parameters) -> Option<String> {
        let mut path = String::new();

        for segment in &self.segments {
            let part = match segment {
                Segment::Static(literal) => literal.as_str(),
                Segment::Parameter(name) => params.get(name)?,
                Segment::Wildcard(name) => {
                    let rest = params.get(name)?;
                    if rest.is_empty() {
                        continue;
                    }
                    rest
                }
            };
            path.push('/');
            path.push_str(part.trim_start_matches('/'));
        }

        if path.is_empty() {
            path.push('/');
        }

        Some(path)
    }
}

impl Segment {
    fn param_name(&self) -> Option<&str> {
        match self {
            Segment::Static(_) => None,
            Segment::Parameter(name) | Segment::Wildcard(name) => Some(name),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
