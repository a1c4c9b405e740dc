//! A fully read response, as handed to the host UI.

use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;

use crate::body::BodyStream;

/// Status, headers and the complete body of one page.
///
/// Hosts that cannot consume streams get everything in one value. Nothing
/// here refers back to the handler that produced it.
#[derive(Clone)]
pub struct Page {
    /// `"<code> <reason>"`, e.g. `"200 OK"`. The reason is empty for codes
    /// without a registered phrase.
    pub status: String,
    pub status_code: u16,
    pub body: Bytes,
    headers: HeaderMap,
}

impl Page {
    /// Drains `response` into a page.
    pub async fn read(response: http::Response<BodyStream>) -> Self {
        let (parts, body) = response.into_parts();
        let Ok(collected) = body.collect().await;
        Self {
            status: status_line(parts.status),
            status_code: parts.status.as_u16(),
            body: collected.to_bytes(),
            headers: parts.headers,
        }
    }

    /// First value of `key`, case-insensitive. `None` if absent or not
    /// visible ASCII.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

fn status_line(status: StatusCode) -> String {
    format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or(""))
}

/// Bodies are cut to their first 16 bytes; pages can be megabytes long.
impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = if self.body.len() <= 16 {
            String::from_utf8_lossy(&self.body).into_owned()
        } else {
            format!("{}... (len:{})", String::from_utf8_lossy(&self.body[..16]), self.body.len())
        };
        f.debug_struct("Page")
            .field("status", &self.status)
            .field("status_code", &self.status_code)
            .field("headers", &self.headers)
            .field("body", &body)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(code: u16, body: &'static [u8]) -> Page {
        let mut headers = HeaderMap::new();
        headers.insert("foo", "bar".parse().unwrap());
        let status = StatusCode::from_u16(code).unwrap();
        Page {
            status: status_line(status),
            status_code: code,
            body: Bytes::from_static(body),
            headers,
        }
    }

    #[test]
    fn status_line_uses_canonical_reason() {
        assert_eq!(status_line(StatusCode::OK), "200 OK");
        assert_eq!(status_line(StatusCode::NOT_FOUND), "404 Not Found");
        assert_eq!(status_line(StatusCode::from_u16(299).unwrap()), "299 ");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let p = page(200, b"ok");
        assert_eq!(p.header("Foo"), Some("bar"));
        assert_eq!(p.header("missing"), None);
        assert!(p.is_success());
        assert!(!page(404, b"").is_success());
    }

    #[test]
    fn debug_truncates_long_bodies() {
        let short = format!("{:?}", page(200, b"okok"));
        assert!(short.contains(r#"body: "okok""#), "{short}");

        let long = format!("{:?}", page(200, b"0123456789abcdefXYZ"));
        assert!(long.contains("0123456789abcdef... (len:19)"), "{long}");
    }
}
