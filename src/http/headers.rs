//! Header fields shared by requests and responses.
//!
//! Names compare ASCII case-insensitively and entries keep their arrival
//! order. Request parsing only ever appends. The response side also needs
//! replacement: its terminal writes own `Content-Type` and `Location`, and
//! serialization owns `Connection`, so those must end up with one value no
//! matter what a handler appended earlier.

/// Ordered list of `(name, value)` header entries.
///
/// # Examples
///
/// ```
/// use pathway::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.append("Location", "/draft");
/// headers.append("Set-Cookie", "a=1");
/// headers.append("Set-Cookie", "b=2");
///
/// // What `Response::redirect` does once it commits.
/// headers.set("Location", "/login");
///
/// assert_eq!(headers.get("location"), Some("/login"));
/// assert_eq!(headers.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Adds an entry after the existing ones, keeping any earlier entry of the
    /// same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Leaves exactly one `name` entry holding `value`.
    ///
    /// Earlier entries with that name are dropped whatever their casing, and
    /// the new entry goes last.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Drops every `name` entry, returning whether there was one.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|(field, _)| !field.eq_ignore_ascii_case(name));
        before != self.entries.len()
    }

    /// Entry count; a repeated name counts once per entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(headers: &Headers) -> Vec<&str> {
        headers.iter().map(|(name, _)| name).collect()
    }

    #[test]
    fn handler_location_is_replaced_by_the_redirect() {
        let mut h = Headers::new();
        h.append("location", "/stale");
        h.append("X-Request-Id", "7");
        h.append("LOCATION", "/also-stale");

        h.set("Location", "/login");

        assert_eq!(h.get("Location"), Some("/login"));
        assert_eq!(names(&h), ["X-Request-Id", "Location"]);
    }

    #[test]
    fn json_content_type_wins_over_an_earlier_guess() {
        let mut h = Headers::new();
        h.append("Content-Type", "text/plain");

        h.set("Content-Type", "application/json");

        assert_eq!(h.get("content-type"), Some("application/json"));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn connection_is_set_even_when_absent() {
        let mut h = Headers::new();
        assert!(!h.contains("connection"));
        h.set("Connection", "close");
        assert_eq!(h.get("connection"), Some("close"));
    }

    #[test]
    fn append_keeps_repeated_names_in_order() {
        let mut h = Headers::new();
        h.append("Set-Cookie", "a=1");
        h.append("Vary", "Accept");
        h.append("Set-Cookie", "b=2");

        let cookies: Vec<_> = h
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
            .map(|(_, value)| value)
            .collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
        assert_eq!(h.get("set-cookie"), Some("a=1"));
    }

    #[test]
    fn remove_reports_whether_anything_went() {
        let mut h = Headers::new();
        h.append("X-Trace", "on");
        assert!(h.remove("x-trace"));
        assert!(h.is_empty());
        assert!(!h.remove("x-trace"));
    }
}
