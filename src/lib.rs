//! # localserve
//!
//! Fetch pages from in-process HTTP handlers with one blocking call. No
//! socket, no port, no listener.
//!
//! ## The contract
//!
//! A host UI (a mobile shell, a webview, a CLI) asks for a URL and gets back
//! a finished page: status line, headers, body. The page is produced by an
//! ordinary streaming handler that writes a status, sets headers and pushes
//! body bytes, unaware that nobody is on the other end of a wire.
//!
//! What localserve does:
//!
//! - **Loopback transport**: runs the handler in its own task and returns
//!   as soon as the status line is settled, with the body as a stream.
//! - **Exactly-once head**: first `write_head`, first body write (`200`), or
//!   the handler finishing silently (`500`), whichever comes first.
//! - **Back-pressure**: body writes wait for the reader; nothing is
//!   buffered in between, so page size does not matter.
//! - **Blocking façade**: [`serve`] sets up a process-wide bridge once and
//!   reads the whole body for callers that cannot take streams.
//!
//! What it does not: real network I/O, TLS, keep-alive, timeouts or
//! cancellation. A handler, once dispatched, runs to completion.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use localserve::{Bridge, Request, ResponseWriter, Router};
//!
//! async fn hello(req: Request, mut w: ResponseWriter) {
//!     w.set_header("content-type", "text/plain; charset=utf-8");
//!     let _ = w.write(format!("hello from {}", req.path()).as_bytes()).await;
//! }
//!
//! async fn gone(_req: Request, mut w: ResponseWriter) {
//!     localserve::error(&mut w, StatusCode::GONE, "gone").await;
//! }
//!
//! let bridge = Bridge::new(Router::new().get("/hello", hello).get("/old", gone), 2)?;
//! let page = bridge.serve("/hello")?;
//! assert_eq!(page.status, "200 OK");
//! assert_eq!(page.body, "hello from /hello");
//! # Ok::<(), localserve::Error>(())
//! ```

mod body;
mod bridge;
mod config;
mod error;
mod files;
mod handler;
mod page;
mod request;
mod router;
mod transport;
mod writer;

pub mod health;
pub mod site;
pub mod vfs;

pub use body::BodyStream;
pub use bridge::{Bridge, init, serve};
pub use config::{Config, ConfigError};
pub use error::Error;
pub use files::{FileServer, Redirect};
pub use handler::Handler;
pub use page::Page;
pub use request::Request;
pub use router::Router;
pub use transport::Transport;
pub use vfs::MapFs;
pub use writer::{ResponseWriter, error, not_found, redirect};
