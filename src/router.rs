//! The handler registry.
//!
//! Two kinds of routes:
//!
//! - **Exact routes**: one radix tree per method, `{name}` parameters
//!   allowed, O(path-length) lookup via [`matchit`].
//! - **Mounts**: a prefix ending in `/` that owns its whole subtree for every
//!   method. The longest matching prefix wins.
//!
//! Lookup order for a request: exact route → trailing-slash redirect (a
//! request for `/dir` when `/dir/` is mounted) → longest mount → 404.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::writer::{self, ResponseWriter};

/// The routing table.
///
/// Build it once at startup; it is shared read-only by every request
/// afterwards. Registrations chain:
///
/// ```rust,no_run
/// # use localserve::{Request, ResponseWriter, Router};
/// # async fn page(_: Request, _: ResponseWriter) {}
/// # async fn user(_: Request, _: ResponseWriter) {}
/// # async fn files(_: Request, _: ResponseWriter) {}
/// Router::new()
///     .get("/about", page)
///     .get("/users/{id}", user)
///     .mount("/static/", files);
/// ```
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    /// Sorted longest prefix first.
    mounts: Vec<(String, BoxedHandler)>,
}

enum Route {
    Handler(BoxedHandler, HashMap<String, String>),
    Redirect(String),
    NotFound,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), mounts: Vec::new() }
    }

    /// Registers a handler for a method + path pair.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with an existing
    /// one. Routes are fixed at startup, so this is a programming error.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Shorthand for `on(Method::GET, …)`.
    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    /// Hands every request under `prefix` to `handler`, whatever the method.
    ///
    /// # Panics
    ///
    /// Panics if `prefix` does not start and end with `/`, or is already
    /// mounted.
    pub fn mount(mut self, prefix: &str, handler: impl Handler) -> Self {
        assert!(
            prefix.starts_with('/') && prefix.ends_with('/'),
            "mount prefix `{prefix}` must start and end with `/`"
        );
        assert!(
            self.mounts.iter().all(|(p, _)| p != prefix),
            "mount prefix `{prefix}` registered twice"
        );
        self.mounts.push((prefix.to_owned(), handler.into_boxed_handler()));
        self.mounts.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
        self
    }

    /// Routes `req` and runs the chosen handler to completion.
    pub(crate) async fn dispatch(&self, req: Request, mut w: ResponseWriter) {
        match self.lookup(&req) {
            Route::Handler(handler, params) => handler.call(req.with_params(params), w).await,
            Route::Redirect(location) => {
                debug!(%location, "redirecting to mounted directory");
                writer::redirect(&mut w, &location, StatusCode::MOVED_PERMANENTLY);
            }
            Route::NotFound => {
                debug!(path = req.path(), "no route");
                writer::not_found(&mut w).await;
            }
        }
    }

    fn lookup(&self, req: &Request) -> Route {
        let path = req.path();

        if let Some(matched) = self.routes.get(req.method()).and_then(|t| t.at(path).ok()) {
            let params = matched.params.iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            return Route::Handler(Arc::clone(matched.value), params);
        }

        if !path.ends_with('/') {
            let dir = format!("{path}/");
            if self.mounts.iter().any(|(prefix, _)| *prefix == dir) {
                let location = match req.query() {
                    Some(query) => format!("{dir}?{query}"),
                    None => dir,
                };
                return Route::Redirect(location);
            }
        }

        self.mounts.iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map_or(Route::NotFound, |(_, handler)| {
                Route::Handler(Arc::clone(handler), HashMap::new())
            })
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
