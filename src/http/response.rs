//! HTTP/1.1 response.
//!
//! A [`Response`] is built up by handlers and eventually serialized by the
//! transport with [`Response::into_bytes`]. It carries a *committed* flag: once
//! a terminal write ([`send`](Response::send), [`json`](Response::json),
//! [`redirect`](Response::redirect) or [`commit`](Response::commit)) has
//! happened the flag stays set for the rest of the request, and the handler
//! chain stops handing control to further routes.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use super::{Headers, StatusCode};

/// Errors raised by terminal writes on a [`Response`].
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response already committed with status {status}")]
    AlreadyCommitted { status: StatusCode },

    #[error("failed to serialize JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

/// An HTTP/1.1 response.
///
/// # Examples
///
/// ```
/// use pathway::http::{Response, StatusCode};
///
/// let mut response = Response::new(StatusCode::Ok);
/// assert!(!response.is_committed());
///
/// response.send("hello").unwrap();
/// assert!(response.is_committed());
/// assert!(response.send("again").is_err());
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.ends_with("hello"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
    committed: bool,
}

impl Response {
    /// Creates a new, uncommitted response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: true,
            committed: false,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Appends a header in-place.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.append(name, value);
    }

    /// Sets the response body from a string without committing.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Controls whether `Connection: keep-alive` or `Connection: close` is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.keep_alive = keep_alive;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Changes the status code. Has no effect once the response is committed.
    pub fn set_status(&mut self, status: StatusCode) {
        if !self.committed {
            self.status = status;
        }
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Returns `true` once a terminal write has begun. Never reverts.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Marks the response as committed without writing a body.
    pub fn commit(&mut self) {
        self.committed = true;
    }

    /// Writes `body` as the final response body and commits.
    ///
    /// # Errors
    ///
    /// [`ResponseError::AlreadyCommitted`] if a terminal write already happened.
    pub fn send(&mut self, body: impl Into<String>) -> Result<(), ResponseError> {
        self.ensure_uncommitted()?;
        self.body = body.into().into_bytes();
        self.committed = true;
        Ok(())
    }

    /// Writes raw bytes as the final response body and commits.
    ///
    /// # Errors
    ///
    /// [`ResponseError::AlreadyCommitted`] if a terminal write already happened.
    pub fn send_bytes(&mut self, body: impl Into<Vec<u8>>) -> Result<(), ResponseError> {
        self.ensure_uncommitted()?;
        self.body = body.into();
        self.committed = true;
        Ok(())
    }

    /// Serializes `value` as the final JSON body and commits.
    ///
    /// # Errors
    ///
    /// [`ResponseError::AlreadyCommitted`] if a terminal write already happened,
    /// [`ResponseError::Json`] if `value` cannot be serialized.
    pub fn json<T>(&mut self, value: &T) -> Result<(), ResponseError>
    where
        T: serde::Serialize + ?Sized,
    {
        self.ensure_uncommitted()?;
        self.body = serde_json::to_vec(value)?;
        self.headers.set("Content-Type", "application/json");
        self.committed = true;
        Ok(())
    }

    /// Commits a `302 Found` redirect to `location`.
    ///
    /// # Errors
    ///
    /// [`ResponseError::AlreadyCommitted`] if a terminal write already happened.
    pub fn redirect(&mut self, location: impl Into<String>) -> Result<(), ResponseError> {
        self.ensure_uncommitted()?;
        self.status = StatusCode::Found;
        self.headers.set("Location", location);
        self.body.clear();
        self.committed = true;
        Ok(())
    }

    fn ensure_uncommitted(&self) -> Result<(), ResponseError> {
        if self.committed {
            return Err(ResponseError::AlreadyCommitted {
                status: self.status,
            });
        }
        Ok(())
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Content-Type: text/plain; charset=utf-8` if the body is non-empty and no
    ///   `Content-Type` header was set.
    /// - `Content-Length: <n>` (always written).
    /// - `Connection: keep-alive` or `Connection: close`.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers
                .append("Content-Type", "text/plain; charset=utf-8");
        }

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.set("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        buf.put(&b"\r\n"[..]);

        if !self.body.is_empty() {
            buf.put(self.body.as_slice());
        }

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn new_response_is_uncommitted() {
        let r = Response::new(StatusCode::Ok).body("draft");
        assert!(!r.is_committed());
    }

    #[test]
    fn send_commits_once() {
        let mut r = Response::default();
        r.send("first").unwrap();
        let err = r.send("second").unwrap_err();
        assert!(matches!(
            err,
            ResponseError::AlreadyCommitted {
                status: StatusCode::Ok
            }
        ));
        assert_eq!(r.body_bytes(), b"first");
    }

    #[test]
    fn send_bytes_keeps_binary_body() {
        let mut r = Response::default();
        r.send_bytes(vec![0x89, b'P', b'N', b'G', 0xff]).unwrap();
        assert!(r.is_committed());
        assert_eq!(r.body_bytes(), &[0x89, b'P', b'N', b'G', 0xff]);
        assert!(r.send_bytes(Vec::new()).is_err());
    }

    #[test]
    fn status_is_frozen_after_commit() {
        let mut r = Response::default();
        r.set_status(StatusCode::Created);
        r.commit();
        r.set_status(StatusCode::InternalServerError);
        assert_eq!(r.status(), StatusCode::Created);
    }

    #[test]
    fn json_sets_content_type() {
        let mut r = Response::default();
        r.json(&serde_json::json!({"id": 42})).unwrap();
        assert_eq!(r.headers().get("content-type"), Some("application/json"));
        let s = to_string(r.into_bytes());
        assert!(s.ends_with(r#"{"id":42}"#));
    }

    #[test]
    fn redirect_writes_location() {
        let mut r = Response::default();
        r.redirect("/login").unwrap();
        assert!(r.is_committed());
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 302 Found\r\n"));
        assert!(s.contains("Location: /login\r\n"));
    }

    #[test]
    fn redirect_replaces_a_location_added_earlier() {
        let mut r = Response::default();
        r.add_header("location", "/draft");
        r.redirect("/login").unwrap();
        let s = to_string(r.into_bytes());
        assert_eq!(s.matches("ocation: ").count(), 1, "{s}");
        assert!(s.contains("Location: /login\r\n"));
    }

    #[test]
    fn json_replaces_a_content_type_added_earlier() {
        let mut r = Response::default();
        r.add_header("Content-Type", "text/html");
        r.json(&[1, 2]).unwrap();
        let s = to_string(r.into_bytes());
        assert_eq!(s.matches("Content-Type: ").count(), 1, "{s}");
        assert!(s.contains("Content-Type: application/json\r\n"));
    }

    #[test]
    fn serialization_owns_the_connection_header() {
        let r = Response::new(StatusCode::Ok)
            .header("Connection", "keep-alive")
            .keep_alive(false);
        let s = to_string(r.into_bytes());
        assert_eq!(s.matches("Connection: ").count(), 1, "{s}");
        assert!(s.contains("Connection: close\r\n"));
    }

    #[test]
    fn no_body_no_content_type() {
        let r = Response::new(StatusCode::NoContent);
        let s = to_string(r.into_bytes());
        assert!(!s.contains("Content-Type"));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn connection_close() {
        let r = Response::new(StatusCode::Ok).keep_alive(false);
        let s = to_string(r.into_bytes());
        assert!(s.contains("Connection: close\r\n"));
    }
}
