//! Liveness handler.
//!
//! Lets a host check that the bridge is up before it starts fetching pages:
//!
//! ```rust,no_run
//! use localserve::{Router, health};
//!
//! let app = Router::new().get("/healthz", health::liveness);
//! ```

use crate::{Request, ResponseWriter};

/// Always replies `200 OK` with body `ok`. Reaching it at all proves the
/// runtime, router and pipe are working.
pub async fn liveness(_req: Request, mut w: ResponseWriter) {
    w.set_header("content-type", "text/plain; charset=utf-8");
    let _ = w.write(b"ok").await;
}
