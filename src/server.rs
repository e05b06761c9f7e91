//! HTTP server, route dispatch and graceful shutdown.
//!
//! [`Server`] collects controllers and stages, [`Server::into_dispatcher`]
//! freezes them into an immutable route table, and [`Server::serve`] runs
//! that table behind hyper until SIGTERM / Ctrl-C.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()`: no new connections are made.
//! 2. Letting every in-flight connection task run to completion.
//! 3. Returning from [`Server::serve`], which lets `main` exit cleanly.

use std::collections::HashMap;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use http::header::ACCEPT_LANGUAGE;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::context::RequestContext;
use crate::domain::{BoxError, DomainError, LocalizableError, error_chain};
use crate::error::Error;
use crate::handler::Handler;
use crate::locale::Locale;
use crate::mapper::map_to_http;
use crate::method::Method;
use crate::middleware::{self, Chain, CorsStage, ErrorHandler, Middleware, RequestLine, recover_panic};
use crate::request::Request;
use crate::response::Response;
use crate::router::{Controller, Router};
use crate::status::Status;
use crate::translator::Translator;
use crate::writer::ResponseWriter;

// ── Error boundary ────────────────────────────────────────────────────────────

/// The shared error handler: `{"error": <message>}` with the suggested
/// status, the message resolved in the request's locale. Internal and
/// unrecognised errors are logged with their full chain first.
pub struct ErrorResponder {
    translator: Arc<Translator>,
}

impl ErrorResponder {
    pub fn new(translator: Arc<Translator>) -> Self {
        Self { translator }
    }
}

impl ErrorHandler for ErrorResponder {
    fn handle(&self, ctx: &RequestContext, writer: &mut ResponseWriter, error: BoxError, status: Status) {
        let mapped = map_to_http(&*error, ctx.locale(), &self.translator);
        if mapped.must_log() {
            error!(request_id = %ctx.log_id(), error = %error_chain(&*error), "internal error");
        }
        writer.write(Response::error(status.as_u16(), mapped.message));
    }
}

// ── Server ────────────────────────────────────────────────────────────────────

/// The HTTP server.
///
/// ```rust,no_run
/// use keel::{Config, Server, Translator};
///
/// #[tokio::main]
/// async fn main() -> Result<(), keel::Error> {
///     let config = Config::from_env()?;
///     let translator = Translator::load_dir(&config.locales_dir, &config.locales)?;
///     Server::new(config, translator)
///         // .auth(MyAuth)
///         // .controller(NotesController::new())
///         .serve()
///         .await
/// }
/// ```
pub struct Server {
    config: Config,
    translator: Arc<Translator>,
    middlewares: Vec<Arc<dyn Middleware>>,
    auth: Option<Arc<dyn Middleware>>,
    controllers: Vec<Box<dyn Controller>>,
}

impl Server {
    /// A server with the standard stages installed in this order:
    /// request id, locale, logging. With `allow_origins` configured, a
    /// [`CorsStage`] goes in front of them.
    pub fn new(config: Config, translator: Translator) -> Self {
        let mut middlewares = middleware::standard();
        if !config.allow_origins.is_empty() {
            info!(origins = ?config.allow_origins, "cross-origin requests enabled");
            middlewares.insert(0, Arc::new(CorsStage::new(config.allow_origins.clone())));
        }
        Self {
            config,
            translator: Arc::new(translator),
            middlewares,
            auth: None,
            controllers: Vec::new(),
        }
    }

    /// Appends a stage that runs on every route, after the standard ones.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Sets the stage appended to routes marked [`authenticated`](crate::Route::authenticated).
    pub fn auth(mut self, middleware: impl Middleware) -> Self {
        self.auth = Some(Arc::new(middleware));
        self
    }

    pub fn controller(mut self, controller: impl Controller) -> Self {
        self.controllers.push(Box::new(controller));
        self
    }

    /// Composes one chain per declared route and freezes the route table.
    ///
    /// Fails on invalid or conflicting route patterns and on authenticated
    /// routes when no auth stage was configured.
    pub fn into_dispatcher(self) -> Result<Dispatcher, Error> {
        let errors: Arc<dyn ErrorHandler> = Arc::new(ErrorResponder::new(Arc::clone(&self.translator)));
        let mut router = Router::new();

        for controller in &self.controllers {
            for route in controller.routes() {
                let path = format!("{}{}", self.config.api_prefix, route.path);
                let chain = if route.requires_auth {
                    let auth = self.auth.as_ref().ok_or_else(|| Error::AuthStageMissing {
                        method: route.method.to_string(),
                        path: path.clone(),
                    })?;
                    let mut stages = self.middlewares.clone();
                    stages.push(Arc::clone(auth));
                    Chain::new(route.handler, Arc::clone(&errors), &stages)
                } else {
                    Chain::new(route.handler, Arc::clone(&errors), &self.middlewares)
                };
                router.insert(route.method, &path, chain)?;
                info!(method = %route.method, path = %path, auth = route.requires_auth, "route registered");
            }
        }

        let fallback = Chain::new(not_found.into_boxed_handler(), Arc::clone(&errors), &self.middlewares);

        Ok(Dispatcher {
            router,
            fallback,
            errors,
            default_locale: self.config.default_locale,
        })
    }

    /// Binds, then accepts connections and dispatches them until a shutdown
    /// signal arrives and every in-flight connection has finished.
    ///
    /// Bind and accept failures are logged and returned; nothing restarts.
    pub async fn serve(self) -> Result<(), Error> {
        let addr = self.config.listen_addr;
        let dispatcher = Arc::new(self.into_dispatcher()?);

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(addr = %addr, "failed to start server: {e}");
                return Err(e.into());
            }
        };

        info!(addr = %addr, "service running");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM immediately stops
                // accepting new connections, even if more are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            while tasks.join_next().await.is_some() {}
                            return Err(e.into());
                        }
                    };

                    let dispatcher = Arc::clone(&dispatcher);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let dispatcher = Arc::clone(&dispatcher);
                            async move { Ok::<_, Infallible>(dispatcher.handle(req).await) }
                        });

                        // `auto::Builder` handles both HTTP/1.1 and HTTP/2.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain: wait for every in-flight connection to finish before we return.
        while tasks.join_next().await.is_some() {}

        info!("service stopped");
        Ok(())
    }
}

/// Endpoint of the fallback chain.
async fn not_found(req: Request) -> Result<Response, BoxError> {
    let detail = format!("no route for {} {}", req.method(), req.path());
    Err(LocalizableError::new("notfound", DomainError::NotFound.with_context(detail)).into())
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// The frozen route table: turns one HTTP request into one HTTP response.
///
/// Shared read-only by every connection task.
pub struct Dispatcher {
    router: Router,
    fallback: Chain,
    errors: Arc<dyn ErrorHandler>,
    default_locale: Locale,
}

impl Dispatcher {
    /// Core hot path. Never fails: every outcome, including a body that
    /// cannot be read and a panicking handler, becomes a response.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let mut ctx = RequestContext::new(self.default_locale.clone());
        let mut writer = ResponseWriter::new();

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                // No stage has run: answer in the client's language and log
                // the request here.
                let line = RequestLine::new(parts.method.as_str(), parts.uri.path(), &parts.headers, ctx.log_id());
                if let Some(locale) = parts
                    .headers
                    .get(ACCEPT_LANGUAGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(Locale::from_accept_language)
                {
                    ctx.set_locale(locale);
                }
                let cause: BoxError = e.into();
                let err = LocalizableError::new(
                    "invalidbody",
                    DomainError::InvalidInput.with_context(format!("unreadable request body: {cause}")),
                );
                self.errors.handle(&ctx, &mut writer, err.into(), Status::BadRequest);
                line.completed(writer.status());
                return writer.finish();
            }
        };

        let (chain, params) = parts
            .method
            .as_str()
            .parse::<Method>()
            .ok()
            .and_then(|method| self.router.lookup(method, parts.uri.path()))
            .unwrap_or_else(|| (&self.fallback, HashMap::new()));

        let request = Request::new(parts, body, params, ctx.clone());
        let outcome = AssertUnwindSafe(chain.call(request, &mut writer)).catch_unwind().await;

        // Handler panics are contained inside the chain; this catches a
        // panicking stage.
        if outcome.is_err() {
            recover_panic(&*self.errors, &ctx, &mut writer);
        }

        writer.finish()
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM (Kubernetes) or SIGINT (Ctrl-C).
/// On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // `pending()` never resolves: on non-Unix platforms the SIGTERM arm is
    // effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
