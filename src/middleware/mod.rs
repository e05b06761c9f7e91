//! Ordered middleware and the chain that composes them.
//!
//! A [`Middleware`] sees the request on its way in, may update the request
//! context it owns, and then either hands over to the rest of the chain
//! through [`Next::run`] or stops it with [`Next::reject`]. Once a stage
//! rejects, nothing after it runs: no later stage, no handler.
//!
//! Each route's chain folds the stage list around the terminal handler from the
//! back, so the first stage in the list is the outermost one. It sees the
//! raw request first and regains control last, which is what lets the
//! logging stage time everything behind it.
//!
//! ```text
//!  request ─▶ [Cors] ─▶ RequestId ─▶ Locale ─▶ Logging ─▶ [Auth] ─▶ handler
//!                           │                                 │          │
//!                           └──── reject ───▶ ErrorHandler ◀──┘◀─ Err ───┘
//! ```

mod cors;
mod locale;
mod logging;
mod request_id;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::error;

pub use cors::CorsStage;
pub use locale::LocaleStage;
pub use logging::LoggingStage;
pub(crate) use logging::RequestLine;
pub use request_id::{REQUEST_ID_HEADER, RequestIdStage};

use crate::context::RequestContext;
use crate::domain::{BoxError, DomainError, LocalizableError};
use crate::handler::{BoxFuture, BoxedHandler};
use crate::mapper::{INTERNAL_ERROR_KEY, classify};
use crate::request::Request;
use crate::status::Status;
use crate::writer::ResponseWriter;

// ── Public traits ─────────────────────────────────────────────────────────────

/// One request-processing stage.
///
/// ```rust
/// use keel::middleware::{Middleware, Next};
/// use keel::{BoxFuture, DomainError, Principal, Request, ResponseWriter, Status};
///
/// struct ApiKey(&'static str);
///
/// impl Middleware for ApiKey {
///     fn execute<'a>(
///         &'a self,
///         mut req: Request,
///         writer: &'a mut ResponseWriter,
///         next: Next<'a>,
///     ) -> BoxFuture<'a> {
///         Box::pin(async move {
///             if req.header("x-api-key") != Some(self.0) {
///                 return next.reject(req.context(), writer, DomainError::Unauthorized, Status::Unauthorized);
///             }
///             req.context_mut().set_principal(Principal::new("api-key"));
///             next.run(req, writer).await
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn execute<'a>(&'a self, req: Request, writer: &'a mut ResponseWriter, next: Next<'a>) -> BoxFuture<'a>;
}

/// Shared short-circuit target.
///
/// Receives the context of the failing request, its writer, the error and
/// the status the caller suggests. Must write exactly one response.
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle(&self, ctx: &RequestContext, writer: &mut ResponseWriter, error: BoxError, status: Status);
}

impl<F> ErrorHandler for F
where
    F: Fn(&RequestContext, &mut ResponseWriter, BoxError, Status) + Send + Sync + 'static,
{
    fn handle(&self, ctx: &RequestContext, writer: &mut ResponseWriter, error: BoxError, status: Status) {
        self(ctx, writer, error, status)
    }
}

/// The stages every route gets, outermost first: request id, locale, logging.
pub fn standard() -> Vec<Arc<dyn Middleware>> {
    let stages: [Arc<dyn Middleware>; 3] = [Arc::new(RequestIdStage), Arc::new(LocaleStage), Arc::new(LoggingStage)];
    stages.into()
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The remainder of the chain, as seen from one stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    rest: &'a dyn Stage,
    errors: &'a dyn ErrorHandler,
}

impl<'a> Next<'a> {
    /// Continues with the next stage (or the handler).
    pub fn run<'w>(self, req: Request, writer: &'w mut ResponseWriter) -> BoxFuture<'w>
    where
        'a: 'w,
    {
        self.rest.call(req, writer)
    }

    /// Stops the chain and hands the failure to the shared error handler.
    pub fn reject(self, ctx: &RequestContext, writer: &mut ResponseWriter, error: impl Into<BoxError>, status: Status) {
        self.errors.handle(ctx, writer, error.into(), status);
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// A composed callable: stages wrapped around a handler.
pub(crate) trait Stage: Send + Sync {
    fn call<'w>(&'w self, req: Request, writer: &'w mut ResponseWriter) -> BoxFuture<'w>;
}

/// Middleware list plus handler, composed once at route registration.
pub(crate) struct Chain {
    entry: Box<dyn Stage>,
}

impl Chain {
    /// Folds `middlewares` around `handler`, first element outermost.
    pub(crate) fn new(handler: BoxedHandler, errors: Arc<dyn ErrorHandler>, middlewares: &[Arc<dyn Middleware>]) -> Self {
        let terminal: Box<dyn Stage> = Box::new(Terminal { handler, errors: Arc::clone(&errors) });
        let entry = middlewares.iter().rev().fold(terminal, |rest, middleware| -> Box<dyn Stage> {
            Box::new(Layer { middleware: Arc::clone(middleware), rest, errors: Arc::clone(&errors) })
        });
        Self { entry }
    }

    /// Runs one request through the chain. Exactly one response ends up in
    /// `writer` unless a stage neither continues nor rejects.
    pub(crate) fn call<'w>(&'w self, req: Request, writer: &'w mut ResponseWriter) -> BoxFuture<'w> {
        self.entry.call(req, writer)
    }
}

struct Layer {
    middleware: Arc<dyn Middleware>,
    rest: Box<dyn Stage>,
    errors: Arc<dyn ErrorHandler>,
}

impl Stage for Layer {
    fn call<'w>(&'w self, req: Request, writer: &'w mut ResponseWriter) -> BoxFuture<'w> {
        let next = Next { rest: &*self.rest, errors: &*self.errors };
        self.middleware.execute(req, writer, next)
    }
}

/// Innermost stage: runs the handler and routes its error to the handler
/// with the status the taxonomy assigns.
///
/// A panicking handler becomes a localized 500 here, where the context
/// still carries the request's id and locale.
struct Terminal {
    handler: BoxedHandler,
    errors: Arc<dyn ErrorHandler>,
}

impl Stage for Terminal {
    fn call<'w>(&'w self, req: Request, writer: &'w mut ResponseWriter) -> BoxFuture<'w> {
        Box::pin(async move {
            let ctx = req.context().clone();
            let outcome = AssertUnwindSafe(async { self.handler.call(req).await }).catch_unwind().await;
            match outcome {
                Ok(Ok(res)) => writer.write(res),
                Ok(Err(e)) => {
                    let status = classify(&*e);
                    self.errors.handle(&ctx, writer, e, status);
                }
                Err(_) => recover_panic(&*self.errors, &ctx, writer),
            }
        })
    }
}

/// Turns a caught panic into a 500 with the localized internal message.
///
/// The error handler logs it. If a response already went out, nothing can be
/// sent and the panic is logged here instead.
pub(crate) fn recover_panic(errors: &dyn ErrorHandler, ctx: &RequestContext, writer: &mut ResponseWriter) {
    if writer.is_committed() {
        error!(request_id = %ctx.log_id(), status = writer.status(), "request handler panicked after responding");
        return;
    }
    let err = LocalizableError::new(INTERNAL_ERROR_KEY, DomainError::Internal.with_context("request handler panicked"));
    errors.handle(ctx, writer, err.into(), Status::InternalServerError);
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::handler::Handler;
    use crate::response::Response;

    pub(crate) type Trace = Arc<Mutex<Vec<String>>>;

    /// Records its name and optionally rejects.
    pub(crate) struct Recorder {
        pub(crate) name: &'static str,
        pub(crate) reject: bool,
        pub(crate) trace: Trace,
    }

    impl Middleware for Recorder {
        fn execute<'a>(&'a self, req: Request, writer: &'a mut ResponseWriter, next: Next<'a>) -> BoxFuture<'a> {
            Box::pin(async move {
                self.trace.lock().unwrap().push(format!("{}:in", self.name));
                if self.reject {
                    return next.reject(req.context(), writer, DomainError::Unauthorized, Status::Unauthorized);
                }
                next.run(req, &mut *writer).await;
                self.trace.lock().unwrap().push(format!("{}:out", self.name));
            })
        }
    }

    pub(crate) fn recording_errors(trace: Trace) -> Arc<dyn ErrorHandler> {
        Arc::new(move |_: &RequestContext, w: &mut ResponseWriter, e: BoxError, s: Status| {
            trace.lock().unwrap().push(format!("error:{}:{e}", s.as_u16()));
            w.write(Response::status(s));
        })
    }

    fn handler(trace: Trace) -> BoxedHandler {
        (move |_req: Request| {
            let trace = Arc::clone(&trace);
            async move {
                trace.lock().unwrap().push("H".to_owned());
                Ok::<_, BoxError>(Response::status(Status::Ok))
            }
        })
        .into_boxed_handler()
    }

    fn recorder(name: &'static str, reject: bool, trace: &Trace) -> Arc<dyn Middleware> {
        Arc::new(Recorder { name, reject, trace: Arc::clone(trace) })
    }

    async fn run(chain: &Chain) -> ResponseWriter {
        let mut writer = ResponseWriter::new();
        let req = crate::request::tests::request("/", &[], "");
        chain.call(req, &mut writer).await;
        writer
    }

    #[tokio::test]
    async fn stages_run_in_list_order_and_unwind_in_reverse() {
        let trace = Trace::default();
        let chain = Chain::new(
            handler(Arc::clone(&trace)),
            recording_errors(Arc::clone(&trace)),
            &[recorder("A", false, &trace), recorder("B", false, &trace)],
        );
        let writer = run(&chain).await;

        assert_eq!(writer.status(), 200);
        assert_eq!(*trace.lock().unwrap(), ["A:in", "B:in", "H", "B:out", "A:out"]);
    }

    #[tokio::test]
    async fn rejecting_stage_stops_the_chain() {
        let trace = Trace::default();
        let chain = Chain::new(
            handler(Arc::clone(&trace)),
            recording_errors(Arc::clone(&trace)),
            &[recorder("A", true, &trace), recorder("B", false, &trace)],
        );
        let writer = run(&chain).await;

        assert_eq!(writer.status(), 401);
        assert_eq!(*trace.lock().unwrap(), ["A:in", "error:401:unauthorized"]);
    }

    #[tokio::test]
    async fn handler_error_reaches_error_handler_with_mapped_status() {
        let trace = Trace::default();
        let failing = (|_req: Request| async { Err::<Response, _>(DomainError::Conflict) }).into_boxed_handler();
        let chain = Chain::new(failing, recording_errors(Arc::clone(&trace)), &[recorder("A", false, &trace)]);
        let writer = run(&chain).await;

        assert_eq!(writer.status(), 409);
        assert_eq!(*trace.lock().unwrap(), ["A:in", "error:409:conflict", "A:out"]);
    }

    #[tokio::test]
    async fn empty_chain_is_just_the_handler() {
        let trace = Trace::default();
        let chain = Chain::new(handler(Arc::clone(&trace)), recording_errors(Arc::clone(&trace)), &[]);
        run(&chain).await;
        assert_eq!(*trace.lock().unwrap(), ["H"]);
    }

    #[tokio::test]
    async fn panicking_handler_is_reported_as_internal_500() {
        let trace = Trace::default();
        let exploding = (|_req: Request| async {
            if true {
                panic!("handler bug");
            }
            Ok::<_, BoxError>(Response::status(Status::Ok))
        })
        .into_boxed_handler();
        let chain = Chain::new(exploding, recording_errors(Arc::clone(&trace)), &[recorder("A", false, &trace)]);
        let writer = run(&chain).await;

        assert_eq!(writer.status(), 500);
        assert_eq!(
            *trace.lock().unwrap(),
            ["A:in", "error:500:request handler panicked: unexpected internal error", "A:out"]
        );
    }

    #[test]
    fn panic_after_responding_keeps_the_first_response() {
        let trace = Trace::default();
        let errors = recording_errors(Arc::clone(&trace));
        let mut writer = ResponseWriter::new();
        writer.write(Response::status(Status::Created));

        recover_panic(&*errors, &RequestContext::default(), &mut writer);

        assert_eq!(writer.status(), 201);
        assert!(trace.lock().unwrap().is_empty());
    }
}
