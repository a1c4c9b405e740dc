//! Request type handed to handlers.

use std::collections::HashMap;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};

use crate::error::Error;

/// A request travelling through the loopback, built by the caller and read
/// by exactly one handler.
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: HashMap::new(),
        }
    }

    /// Builds a `GET` for `url`.
    ///
    /// Accepts origin-form (`/pkg/fmt/?m=all`) and absolute-form
    /// (`http://localhost/pkg/fmt/`). The authority of an absolute URL is
    /// dropped: every request resolves against the in-process router.
    pub fn get(url: &str) -> Result<Self, Error> {
        Ok(Self::new(Method::GET, parse_target(url)?))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> Option<&str> { self.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Case-insensitive header lookup. Returns the first value only.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub(crate) fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }
}

fn parse_target(url: &str) -> Result<Uri, Error> {
    if url.is_empty() {
        return Err(Error::invalid_url(url, "empty url"));
    }
    let uri: Uri = url.parse().map_err(|e| Error::invalid_url(url, e))?;
    if uri.scheme().is_some_and(|s| s != "http" && s != "https") {
        return Err(Error::invalid_url(url, "only http and https urls are served"));
    }
    // `Uri::path` reports "/" for `http://localhost`, so a bare authority
    // lands on the root.
    let path = uri.path();
    if !path.starts_with('/') {
        return Err(Error::invalid_url(url, "url has no absolute path"));
    }
    let target = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_owned(),
    };
    target.parse().map_err(|e| Error::invalid_url(url, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_form_keeps_query() {
        let req = Request::get("/pkg/fmt/?m=all").unwrap();
        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.path(), "/pkg/fmt/");
        assert_eq!(req.query(), Some("m=all"));
    }

    #[test]
    fn absolute_form_drops_authority() {
        let req = Request::get("http://example.com/doc/?x=1").unwrap();
        assert_eq!(req.uri().to_string(), "/doc/?x=1");
        assert!(req.uri().authority().is_none());
    }

    #[test]
    fn bare_authority_is_root() {
        let req = Request::get("http://localhost").unwrap();
        assert_eq!(req.path(), "/");
    }

    #[test]
    fn malformed_urls_are_rejected() {
        for url in ["", "not a url", "ftp://host/file", "relative/path", "*"] {
            assert!(
                matches!(Request::get(url), Err(Error::InvalidUrl { .. })),
                "{url:?} should be rejected"
            );
        }
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = Request::get("/")
            .unwrap()
            .with_header(HeaderName::from_static("x-trace"), HeaderValue::from_static("abc"));
        assert_eq!(req.header("X-Trace"), Some("abc"));
        assert_eq!(req.header("missing"), None);
    }
}
