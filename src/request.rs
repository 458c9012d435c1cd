//! Incoming HTTP request type.

use bytes::Bytes;
use http::request::Parts;
use percent_encoding::percent_decode_str;
use http::{HeaderMap, Uri};

use crate::tree::Params;

/// An incoming HTTP request plus the routing state dispatch fills in.
///
/// Path parameters and the matched route are empty until every root-router
/// middleware has run and the path has been resolved; see
/// [`is_routed`](Request::is_routed).
#[derive(Debug)]
pub struct Request {
    head: Parts,
    body: Bytes,
    // Percent-decoded `head.uri.path()`; what routing matches against.
    path: String,
    params: Params,
    route: Option<String>,
}

impl Request {
    pub fn new(request: http::Request<Bytes>) -> Self {
        let (head, body) = request.into_parts();
        let path = decode_path(head.uri.path());
        Self { head, body, path, params: Params::new(), route: None }
    }

    pub fn method(&self) -> &http::Method { &self.head.method }
    /// The request URI exactly as received.
    pub fn uri(&self) -> &Uri { &self.head.uri }

    /// The percent-decoded URI path (`/caf%C3%A9` is `/café`). Routes and
    /// path parameters are matched against this.
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Non-UTF-8 values are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `req.param("id")` on `/users/42` returns `Some("42")`.
    /// A trailing `:*` is available as `req.param("*")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &Params { &self.params }

    /// The registered pattern of the matched route (e.g. `/users/:id`).
    pub fn route_path(&self) -> Option<&str> { self.route.as_deref() }

    /// Whether the request has been resolved to a route yet.
    pub fn is_routed(&self) -> bool { self.route.is_some() }

    pub(crate) fn set_route(&mut self, path: &str, params: Params) {
        self.route = Some(path.to_owned());
        self.params = params;
    }
}

/// Paths whose escapes do not decode to UTF-8 are kept as received.
fn decode_path(raw: &str) -> String {
    match percent_decode_str(raw).decode_utf8() {
        Ok(path) => path.into_owned(),
        Err(_) => raw.to_owned(),
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(request: http::Request<Bytes>) -> Self { Self::new(request) }
}
