//! Handler trait and type erasure.
//!
//! # How streaming handlers are stored
//!
//! The router holds handlers of *different* types: closures, `async fn`s and
//! the crate's own [`FileServer`](crate::FileServer) and
//! [`Redirect`](crate::Redirect). They all sit behind one trait object
//! (`dyn ErasedHandler`) so the tables can store them uniformly.
//!
//! ```text
//! async fn page(req: Request, mut w: ResponseWriter) { … }  ← user writes this
//!        ↓ router.get("/page", page)
//! page.into_boxed_handler()                                 ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(page))                                 ← stored as BoxedHandler
//!        ↓
//! handler.call(req, writer)  in the request's own task      ← one vtable dispatch
//! ```
//!
//! A handler returns nothing. Everything it has to say goes through the
//! [`ResponseWriter`]; returning (and so dropping the writer) ends the
//! response.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::writer::ResponseWriter;

/// A heap-allocated, type-erased handler future.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request, w: ResponseWriter) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// Satisfied by any function or closure with the shape:
///
/// ```text
/// async fn name(req: Request, w: ResponseWriter)
/// ```
///
/// and by the crate's built-in handlers. The trait is sealed.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

pub(crate) mod private {
    pub trait Sealed {}
}

impl<F, Fut> private::Sealed for F
where
    F: Fn(Request, ResponseWriter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
}

impl<F, Fut> Handler for F
where
    F: Fn(Request, ResponseWriter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Newtype bridging a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut> ErasedHandler for FnHandler<F>
where
    F: Fn(Request, ResponseWriter) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, req: Request, w: ResponseWriter) -> BoxFuture {
        Box::pin((self.0)(req, w))
    }
}
