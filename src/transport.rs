//! The loopback transport.
//!
//! Turns a push-style handler into a pull-style call. Each round trip spawns
//! the handler on the current tokio runtime and waits for exactly one thing:
//! the response head. The body is returned as a [`BodyStream`] still being
//! written by the handler, so pages of any size pass through without being
//! buffered here.
//!
//! ```text
//!  round_trip(req)                       spawned task
//!  ───────────────                       ────────────
//!  (writer, head, body) = new()
//!  spawn ─────────────────────────────▶  router.dispatch(req, writer)
//!  head.await  ◀─── oneshot ───────────  write_head / first write / drop
//!  return Response(body) ◀── pipe ─────  write … write … drop (closes)
//! ```
//!
//! There is no cancellation. A caller that keeps the body without reading it
//! leaves the handler task parked on its next write; dropping the body makes
//! that write fail with `BrokenPipe` instead.

use std::sync::Arc;

use http::Version;
use tracing::{Instrument, debug_span};

use crate::body::BodyStream;
use crate::error::Error;
use crate::request::Request;
use crate::router::Router;
use crate::writer::ResponseWriter;

/// Sends requests to an in-process [`Router`] instead of a socket.
#[derive(Clone)]
pub struct Transport {
    router: Arc<Router>,
}

impl Transport {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }

    /// Runs `req` through the router and returns as soon as the handler has
    /// settled on a status line.
    ///
    /// Routing misses and handler failures come back as ordinary 4xx/5xx
    /// responses. Must be called from within a tokio runtime.
    pub async fn round_trip(&self, req: Request) -> Result<http::Response<BodyStream>, Error> {
        let (writer, head, mut body) = ResponseWriter::new();
        let span = debug_span!("handler", method = %req.method(), path = req.path());
        let router = Arc::clone(&self.router);

        tokio::spawn(async move { router.dispatch(req, writer).await }.instrument(span));

        // The writer's drop guard always sends a head, even on panic.
        let head = head.await.map_err(|_| Error::Aborted)?;
        if head.empty {
            body.mark_empty();
        }

        let mut response = http::Response::new(body);
        *response.status_mut() = head.status;
        *response.headers_mut() = head.headers;
        // One request per "connection", nothing kept alive.
        *response.version_mut() = Version::HTTP_10;
        Ok(response)
    }

    /// Builds a `GET` for `url` and round-trips it.
    pub async fn get(&self, url: &str) -> Result<http::Response<BodyStream>, Error> {
        self.round_trip(Request::get(url)?).await
    }
}
