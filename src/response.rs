//! The response writer handed to every middleware and handler.
//!
//! Handlers do not return a response; they write into a [`ResponseWriter`]
//! that the whole middleware chain shares. The writer buffers everything and
//! is turned into an [`http::Response`] once dispatch returns.
//!
//! ```rust
//! use std::io::Write;
//! use arbor::{Request, ResponseWriter};
//! use http::StatusCode;
//!
//! fn create_user(rw: &mut ResponseWriter, _req: &mut Request) {
//!     rw.write_header(StatusCode::CREATED);
//!     rw.headers_mut().insert("location", "/users/99".parse().unwrap());
//!     write!(rw, r#"{{"id":99}}"#).unwrap();
//! }
//! ```

use std::io;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use tracing::warn;

/// Buffered response: a status line written at most once, headers, and body bytes.
#[derive(Debug)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    // Status committed by the first body write when none was set explicitly.
    implicit: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            status: None,
            implicit: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
        }
    }

    /// Sets the status code. The first call wins; later calls are ignored.
    pub fn write_header(&mut self, status: StatusCode) {
        match self.status {
            None => self.status = Some(status),
            Some(current) => {
                warn!(%current, ignored = %status, "superfluous write_header call");
            }
        }
    }

    /// Appends body bytes, committing the status if none was written yet.
    pub fn write_body(&mut self, data: &[u8]) {
        if self.status.is_none() {
            self.status = Some(self.implicit);
        }
        self.body.extend_from_slice(data);
    }

    pub fn headers(&self) -> &HeaderMap { &self.headers }

    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }

    /// The committed status, if any.
    pub fn status(&self) -> Option<StatusCode> { self.status }

    /// The committed status as a number, or `0` if nothing was written yet.
    pub fn status_code(&self) -> u16 {
        self.status.map_or(0, |s| s.as_u16())
    }

    /// Whether a status has been committed.
    pub fn written(&self) -> bool { self.status.is_some() }

    /// Number of body bytes written so far.
    pub fn size(&self) -> usize { self.body.len() }

    pub fn body(&self) -> &[u8] { &self.body }

    /// Status used if the body is written before any explicit status.
    pub(crate) fn set_implicit_status(&mut self, status: StatusCode) {
        self.implicit = status;
    }

    /// Converts the buffered response into an `http` response. A writer that
    /// was never written to becomes an empty `200 OK`.
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = self.status.unwrap_or(self.implicit);
        *response.headers_mut() = self.headers;
        response
    }
}

impl Default for ResponseWriter {
    fn default() -> Self { Self::new() }
}

/// Lets handlers use `write!` and any `io::Write` based serialiser.
impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn body_write_commits_200() {
        let mut rw = ResponseWriter::new();
        assert!(!rw.written());
        assert_eq!(rw.status_code(), 0);

        let n = rw.write(b"Hello world").unwrap();
        assert_eq!(n, 11);
        assert_eq!(rw.status(), Some(StatusCode::OK));
        assert_eq!(rw.size(), 11);
        assert_eq!(rw.body(), b"Hello world");
        assert!(rw.written());
    }

    #[test]
    fn first_status_wins() {
        let mut rw = ResponseWriter::new();
        rw.write_header(StatusCode::NOT_FOUND);
        rw.write_header(StatusCode::OK);
        write!(rw, "gone").unwrap();
        assert_eq!(rw.status_code(), 404);
    }

    #[test]
    fn implicit_status_applies_to_unstatused_bodies() {
        let mut rw = ResponseWriter::new();
        rw.set_implicit_status(StatusCode::INTERNAL_SERVER_ERROR);
        rw.write_body(b"oops");
        assert_eq!(rw.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));

        let mut rw = ResponseWriter::new();
        rw.set_implicit_status(StatusCode::INTERNAL_SERVER_ERROR);
        rw.write_header(StatusCode::SERVICE_UNAVAILABLE);
        rw.write_body(b"later");
        assert_eq!(rw.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn converts_into_an_http_response() {
        let mut rw = ResponseWriter::new();
        rw.headers_mut().insert("x-test", "1".parse().unwrap());
        rw.write_header(StatusCode::ACCEPTED);

        let response = rw.into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()["x-test"], "1");

        let untouched = ResponseWriter::new().into_response();
        assert_eq!(untouched.status(), StatusCode::OK);
    }
}
