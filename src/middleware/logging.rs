//! Request logging stage.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures_util::FutureExt;
use http::HeaderMap;
use http::header::USER_AGENT;
use tracing::info;

use crate::handler::BoxFuture;
use crate::request::Request;
use crate::writer::ResponseWriter;

use super::{Middleware, Next};

/// Times everything behind it and emits one `request completed` event.
///
/// The event carries method, path, user agent, the status the writer
/// actually committed, and the elapsed time in microseconds, tagged with
/// the request id. It is emitted even when a later stage panics; the panic
/// then continues to unwind.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingStage;

impl Middleware for LoggingStage {
    fn execute<'a>(&'a self, req: Request, writer: &'a mut ResponseWriter, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            let line = RequestLine::new(req.method(), req.path(), req.headers(), req.context().log_id());

            let outcome = AssertUnwindSafe(next.run(req, &mut *writer)).catch_unwind().await;

            let status = match outcome {
                // The dispatcher turns an uncommitted panic into a 500.
                Err(_) if !writer.is_committed() => 500,
                _ => writer.status(),
            };
            line.completed(status);

            if let Err(panic) = outcome {
                std::panic::resume_unwind(panic);
            }
        })
    }
}

/// What the completion event reports about a request, captured on entry.
pub(crate) struct RequestLine {
    request_id: String,
    method: String,
    path: String,
    agent: String,
    start: Instant,
}

impl RequestLine {
    pub(crate) fn new(method: &str, path: &str, headers: &HeaderMap, request_id: &str) -> Self {
        let agent = headers.get(USER_AGENT).and_then(|v| v.to_str().ok()).unwrap_or("-");
        Self {
            request_id: request_id.to_owned(),
            method: method.to_owned(),
            path: path.to_owned(),
            agent: agent.to_owned(),
            start: Instant::now(),
        }
    }

    pub(crate) fn completed(&self, status: u16) {
        let duration_us = u64::try_from(self.start.elapsed().as_micros()).unwrap_or(u64::MAX);
        info!(
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            agent = %self.agent,
            status,
            duration_us,
            "request completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::{RequestContext, RequestId};
    use crate::domain::BoxError;
    use crate::handler::Handler;
    use crate::middleware::{Chain, ErrorHandler};
    use crate::request::tests::request;
    use crate::response::Response;
    use crate::status::Status;
    use crate::telemetry::capture::Captured;

    fn errors() -> Arc<dyn ErrorHandler> {
        Arc::new(|_: &RequestContext, w: &mut ResponseWriter, _: BoxError, s: Status| w.write(Response::status(s)))
    }

    fn created() -> crate::handler::BoxedHandler {
        (|_req: Request| async { Ok::<_, BoxError>(Response::status(Status::Created)) }).into_boxed_handler()
    }

    /// Panics on the way in, after the logging stage.
    struct Exploding;

    impl Middleware for Exploding {
        fn execute<'a>(&'a self, _req: Request, _writer: &'a mut ResponseWriter, _next: Next<'a>) -> BoxFuture<'a> {
            Box::pin(async {
                if true {
                    panic!("stage bug");
                }
            })
        }
    }

    #[tokio::test]
    async fn logs_committed_status_and_request_fields() {
        let (captured, _guard) = Captured::install();
        let stages: [Arc<dyn Middleware>; 1] = [Arc::new(LoggingStage)];
        let mut req = request("/api/notes", &[("user-agent", "curl/8.5")], "");
        req.context.set_request_id(RequestId::new("r-7"));

        let mut writer = ResponseWriter::new();
        Chain::new(created(), errors(), &stages).call(req, &mut writer).await;
        assert_eq!(writer.status(), 201);

        let logged = captured.fields_of("request completed");
        assert_eq!(logged.len(), 1);
        let fields = &logged[0];
        assert_eq!(fields["request_id"], "r-7");
        assert_eq!(fields["method"], "POST");
        assert_eq!(fields["path"], "/api/notes");
        assert_eq!(fields["agent"], "curl/8.5");
        assert_eq!(fields["status"], 201);
        assert!(fields["duration_us"].is_u64());
    }

    #[tokio::test]
    async fn missing_agent_and_id_are_dashes() {
        let (captured, _guard) = Captured::install();
        let stages: [Arc<dyn Middleware>; 1] = [Arc::new(LoggingStage)];
        let mut writer = ResponseWriter::new();
        Chain::new(created(), errors(), &stages).call(request("/", &[], ""), &mut writer).await;

        let fields = &captured.fields_of("request completed")[0];
        assert_eq!(fields["request_id"], "-");
        assert_eq!(fields["agent"], "-");
    }

    #[tokio::test]
    async fn panic_behind_the_stage_is_logged_as_500_then_unwinds() {
        let (captured, _guard) = Captured::install();
        let stages: [Arc<dyn Middleware>; 2] = [Arc::new(LoggingStage), Arc::new(Exploding)];
        let chain = Chain::new(created(), errors(), &stages);
        let mut writer = ResponseWriter::new();

        let outcome = AssertUnwindSafe(chain.call(request("/", &[], ""), &mut writer)).catch_unwind().await;
        assert!(outcome.is_err());
        assert!(!writer.is_committed());

        let logged = captured.fields_of("request completed");
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0]["status"], 500);
    }
}
