//! The response sink handed to every handler.
//!
//! # Lifecycle
//!
//! ```text
//!  Idle ──write_head / first write / drop──▶ Streaming ──drop──▶ Closed
//! ```
//!
//! - **Idle**: headers may be set. No status chosen yet.
//! - **Finalization** happens once, on the first of: [`ResponseWriter::write_head`],
//!   the first body write (status defaults to `200 OK`), or the writer being
//!   dropped with neither (status defaults to `500 Internal Server Error`).
//!   The status and headers are moved out and handed to the waiting caller.
//! - **Streaming**: header mutations and further `write_head` calls are
//!   ignored; body writes go to the pipe.
//! - **Closed**: the writer is dropped when the handler returns (or unwinds),
//!   which closes the pipe. No write can follow, the writer no longer exists.

use std::io;

use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::body::{BodyStream, PipeWriter, pipe};

/// Status and headers, frozen at finalization.
#[derive(Debug)]
pub(crate) struct Head {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    /// Finalized by completion: no body will follow.
    pub(crate) empty: bool,
}

/// Write-only side of a response.
///
/// Owned by the handler for the duration of one request.
pub struct ResponseWriter {
    headers: HeaderMap,
    status: Option<StatusCode>,
    /// `Some` while idle; taken at finalization.
    head_tx: Option<oneshot::Sender<Head>>,
    pipe: PipeWriter,
}

impl ResponseWriter {
    pub(crate) fn new() -> (Self, oneshot::Receiver<Head>, BodyStream) {
        let (head_tx, head_rx) = oneshot::channel();
        let (pipe, body) = pipe();
        let writer = Self {
            headers: HeaderMap::new(),
            status: None,
            head_tx: Some(head_tx),
            pipe,
        };
        (writer, head_rx, body)
    }

    /// Headers set so far. Empty once finalized: they have been handed off.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The finalized status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn is_finalized(&self) -> bool {
        self.head_tx.is_none()
    }

    /// Replaces every value of `name` with `value`.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let Some((name, value)) = self.checked_header(name, value) {
            self.headers.insert(name, value);
        }
    }

    /// Adds `value` to `name`, keeping earlier values.
    pub fn append_header(&mut self, name: &str, value: &str) {
        if let Some((name, value)) = self.checked_header(name, value) {
            self.headers.append(name, value);
        }
    }

    pub fn remove_header(&mut self, name: &str) {
        if self.is_finalized() {
            debug!(header = name, "header removal after head was sent, ignored");
            return;
        }
        self.headers.remove(name);
    }

    fn checked_header(&self, name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
        if self.is_finalized() {
            debug!(header = name, "header set after head was sent, ignored");
            return None;
        }
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => Some((name, value)),
            _ => {
                warn!(header = name, "invalid header name or value, ignored");
                None
            }
        }
    }

    /// Sends the status line and headers. Later calls are no-ops.
    pub fn write_head(&mut self, status: StatusCode) {
        if self.is_finalized() {
            debug!(%status, "superfluous write_head, ignored");
            return;
        }
        self.finalize(status, false);
    }

    /// Writes `data` to the body, finalizing with `200 OK` first if needed.
    ///
    /// Returns once the reader has taken the bytes.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.send(Bytes::copy_from_slice(data)).await?;
        Ok(data.len())
    }

    /// Like [`write`](Self::write) without copying.
    pub async fn send(&mut self, data: Bytes) -> io::Result<()> {
        if !self.is_finalized() {
            self.finalize(StatusCode::OK, false);
        }
        if data.is_empty() {
            return Ok(());
        }
        trace!(len = data.len(), "body chunk");
        self.pipe.send(data).await
    }

    fn finalize(&mut self, status: StatusCode, empty: bool) {
        let Some(head_tx) = self.head_tx.take() else { return };
        self.status = Some(status);
        let head = Head { status, headers: std::mem::take(&mut self.headers), empty };
        debug!(%status, empty, "response head finalized");
        if head_tx.send(head).is_err() {
            debug!("caller went away before the head was sent");
        }
    }
}

impl Drop for ResponseWriter {
    fn drop(&mut self) {
        if !self.is_finalized() {
            self.finalize(StatusCode::INTERNAL_SERVER_ERROR, true);
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Replies with a plain-text error page: `message` followed by a newline.
pub async fn error(w: &mut ResponseWriter, status: StatusCode, message: &str) {
    w.remove_header(header::CONTENT_LENGTH.as_str());
    w.set_header(header::CONTENT_TYPE.as_str(), "text/plain; charset=utf-8");
    w.set_header(header::X_CONTENT_TYPE_OPTIONS.as_str(), "nosniff");
    w.write_head(status);
    // A vanished reader is not the handler's problem.
    let _ = w.send(Bytes::from(format!("{message}\n"))).await;
}

/// Replies with `404 page not found`.
pub async fn not_found(w: &mut ResponseWriter) {
    error(w, StatusCode::NOT_FOUND, "404 page not found").await;
}

/// Replies with a redirect to `location`.
pub fn redirect(w: &mut ResponseWriter, location: &str, status: StatusCode) {
    w.set_header(header::LOCATION.as_str(), location);
    w.write_head(status);
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    #[tokio::test]
    async fn first_write_defaults_to_ok() {
        let (mut w, head, body) = ResponseWriter::new();
        w.set_header("foo", "bar");
        let task = tokio::spawn(async move {
            w.write(b"ok").await.unwrap();
            w.write(b"ok").await.unwrap();
        });

        let head = head.await.unwrap();
        assert_eq!(head.status, StatusCode::OK);
        assert_eq!(head.headers["foo"], "bar");
        assert!(!head.empty);
        assert_eq!(body.collect().await.unwrap().to_bytes(), "okok");
        task.await.unwrap();
    }

    #[tokio::test]
    async fn silent_drop_defaults_to_server_error() {
        let (w, head, _body) = ResponseWriter::new();
        drop(w);
        let head = head.await.unwrap();
        assert_eq!(head.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(head.empty);
    }

    #[tokio::test]
    async fn head_is_finalized_once() {
        let (mut w, head, _body) = ResponseWriter::new();
        w.write_head(StatusCode::CREATED);
        w.write_head(StatusCode::NOT_FOUND);
        w.set_header("late", "1");
        assert_eq!(w.status(), Some(StatusCode::CREATED));
        assert!(w.headers().is_empty());

        let head = head.await.unwrap();
        assert_eq!(head.status, StatusCode::CREATED);
        assert!(head.headers.get("late").is_none());
    }

    #[tokio::test]
    async fn write_head_after_body_is_ignored() {
        let (mut w, head, body) = ResponseWriter::new();
        let task = tokio::spawn(async move {
            w.write(b"x").await.unwrap();
            w.write_head(StatusCode::IM_A_TEAPOT);
            w.status()
        });
        assert_eq!(head.await.unwrap().status, StatusCode::OK);
        body.collect().await.unwrap();
        assert_eq!(task.await.unwrap(), Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn append_keeps_every_value_and_invalid_headers_are_dropped() {
        let (mut w, head, _body) = ResponseWriter::new();
        w.append_header("vary", "accept");
        w.append_header("vary", "cookie");
        w.set_header("bad header", "x");
        w.set_header("x-ok", "line\nbreak");
        w.write_head(StatusCode::NO_CONTENT);

        let head = head.await.unwrap();
        let vary: Vec<_> = head.headers.get_all("vary").iter().collect();
        assert_eq!(vary, ["accept", "cookie"]);
        assert_eq!(head.headers.len(), 2);
    }

    #[tokio::test]
    async fn empty_write_finalizes_without_touching_the_pipe() {
        let (mut w, head, _body) = ResponseWriter::new();
        assert_eq!(w.write(b"").await.unwrap(), 0);
        assert!(w.is_finalized());
        assert_eq!(head.await.unwrap().status, StatusCode::OK);
    }

    #[tokio::test]
    async fn error_helper_writes_plain_text() {
        let (mut w, head, body) = ResponseWriter::new();
        w.set_header("content-length", "999");
        tokio::spawn(async move { error(&mut w, StatusCode::NOT_FOUND, "gone").await });

        let head = head.await.unwrap();
        assert_eq!(head.status, StatusCode::NOT_FOUND);
        assert_eq!(head.headers["content-type"], "text/plain; charset=utf-8");
        assert_eq!(head.headers["x-content-type-options"], "nosniff");
        assert!(head.headers.get("content-length").is_none());
        assert_eq!(body.collect().await.unwrap().to_bytes(), "gone\n");
    }
}
