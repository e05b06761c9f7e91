//! Cross-origin resource sharing stage.

use http::HeaderValue;
use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, VARY,
};
use tracing::debug;

use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;
use crate::writer::ResponseWriter;

use super::{Middleware, Next};

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, PATCH, OPTIONS";
const ALLOWED_HEADERS: [&str; 5] = ["authorization", "content-type", "credentials", "x-request-id", "accept-language"];

/// Answers preflights and marks responses for allowed browser origins.
///
/// Runs outermost: a preflight carries no `X-Request-ID`, so it is answered
/// with 204 before the request-id stage could reject it. A preflight from an
/// origin, method or header outside the allow lists still gets a 204, just
/// without any `Access-Control-*` header, which the browser treats as a
/// refusal. Credentials are always allowed, so the origin is echoed back
/// rather than answered with `*`.
#[derive(Clone, Debug)]
pub struct CorsStage {
    origins: Vec<String>,
}

impl CorsStage {
    /// `"*"` in `origins` allows every origin.
    pub fn new<S: Into<String>>(origins: impl IntoIterator<Item = S>) -> Self {
        Self { origins: origins.into_iter().map(Into::into).collect() }
    }

    fn allows_origin(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == "*" || o.eq_ignore_ascii_case(origin))
    }

    fn allows_preflight(req: &Request) -> bool {
        let method_ok = req
            .header(ACCESS_CONTROL_REQUEST_METHOD.as_str())
            .is_some_and(|m| ALLOWED_METHODS.split(", ").any(|allowed| allowed == m.trim()));
        let headers_ok = req.header(ACCESS_CONTROL_REQUEST_HEADERS.as_str()).is_none_or(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .all(|h| ALLOWED_HEADERS.iter().any(|allowed| allowed.eq_ignore_ascii_case(h)))
        });
        method_ok && headers_ok
    }
}

impl Middleware for CorsStage {
    fn execute<'a>(&'a self, req: Request, writer: &'a mut ResponseWriter, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            let Some(origin) = req.headers().get(ORIGIN).cloned() else {
                return next.run(req, writer).await;
            };
            let allowed = origin.to_str().is_ok_and(|o| self.allows_origin(o));
            let preflight = req.method() == "OPTIONS" && req.header(ACCESS_CONTROL_REQUEST_METHOD.as_str()).is_some();

            writer.set_header(VARY, HeaderValue::from_static("origin"));

            if preflight {
                if allowed && Self::allows_preflight(&req) {
                    writer.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
                    writer.set_header(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
                    writer.set_header(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
                    if let Some(requested) = req.headers().get(ACCESS_CONTROL_REQUEST_HEADERS).cloned() {
                        writer.set_header(ACCESS_CONTROL_ALLOW_HEADERS, requested);
                    }
                } else {
                    debug!(path = %req.path(), "preflight refused");
                }
                return writer.write(Response::status(Status::NoContent));
            }

            if allowed {
                writer.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
                writer.set_header(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
            }
            next.run(req, writer).await
        })
    }
}
