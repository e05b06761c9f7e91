//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! Routes hold handlers of *different* types, so each one is hidden behind a
//! trait object (`dyn ErasedHandler`) and stored uniformly:
//!
//! ```text
//! async fn get_note(req: Request) -> Result<Response, BoxError> { … }
//!        ↓ Route::new(Method::Get, "/notes/{id}", get_note)
//! get_note.into_boxed_handler()                    ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(get_note))                    ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at request time               ← one vtable dispatch
//!        ↓
//! Box::pin(async { get_note(req).await … })        ← BoxFuture
//! ```
//!
//! The error side is erased to [`BoxError`]. Handlers never build error
//! responses; the boundary maps the error.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::domain::BoxError;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
///
/// `Send` lets tokio move the future across worker threads. The lifetime
/// lets middleware futures borrow the stage and the writer they run with.
pub type BoxFuture<'a, T = ()> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler resolves to once erased.
pub(crate) type HandlerResult = Result<Response, BoxError>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, HandlerResult>;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` (or closure returning a future) with the shape:
///
/// ```text
/// async fn name(req: Request) -> Result<impl IntoResponse, impl Into<BoxError>>
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R, E> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
}

impl<F, Fut, R, E> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype bridging a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R, E> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, HandlerResult> {
        let fut = (self.0)(req);
        Box::pin(async move {
            match fut.await {
                Ok(res) => Ok(res.into_response()),
                Err(e) => Err(e.into()),
            }
        })
    }
}
