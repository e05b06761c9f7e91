//! Request identification stage.

use crate::context::RequestId;
use crate::domain::{DomainError, LocalizableError};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::status::Status;
use crate::writer::ResponseWriter;

use super::{Middleware, Next};

/// Header carrying the client's correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Requires an `X-Request-ID` header and stores it in the request context.
///
/// A request without one (or with an empty one) is rejected with 400 and
/// the `requestidrequired` message.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestIdStage;

impl Middleware for RequestIdStage {
    fn execute<'a>(&'a self, mut req: Request, writer: &'a mut ResponseWriter, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            let id = req.header(REQUEST_ID_HEADER).filter(|v| !v.trim().is_empty()).map(RequestId::new);
            match id {
                Some(id) => {
                    req.context.set_request_id(id);
                    next.run(req, writer).await;
                }
                None => {
                    let err = LocalizableError::new(
                        "requestidrequired",
                        DomainError::InvalidInput.with_context("X-Request-ID can't be null"),
                    );
                    next.reject(req.context(), writer, err, Status::BadRequest);
                }
            }
        })
    }
}
