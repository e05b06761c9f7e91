//! Outgoing response value and the [`IntoResponse`] conversion trait.
//!
//! A handler builds a [`Response`] and returns it. It never touches the
//! transport: the [`ResponseWriter`](crate::ResponseWriter) emits headers,
//! status and body later, in that order, exactly once.

use serde::Serialize;

use crate::status::Status;

// ── Payload ───────────────────────────────────────────────────────────────────

/// A body waiting to be encoded.
///
/// Encoding is deferred to the writer so a serialization failure is observed
/// where the response is emitted, not where it is built. Implemented for
/// every `Serialize` type; you never implement it yourself.
pub trait Payload: Send {
    fn encode(&self) -> serde_json::Result<Vec<u8>>;
}

impl<T: Serialize + Send> Payload for T {
    fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// The single error body shape: `{"error": <message>}`.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: String,
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response: status, optional JSON payload, extra headers.
///
/// # Shortcuts
///
/// ```rust
/// use keel::{Response, Status};
///
/// Response::json(serde_json::json!({ "id": 1 }));
/// Response::status(Status::NoContent);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use keel::{Response, Status};
///
/// Response::builder()
///     .status(Status::Created)
///     .header("location", "/api/notes/42")
///     .json(serde_json::json!({ "id": 42 }));
/// ```
pub struct Response {
    pub(crate) status: u16,
    pub(crate) content: Option<Box<dyn Payload>>,
    pub(crate) headers: Vec<(String, String)>,
}

impl Response {
    /// `200 OK` with `payload` encoded as JSON.
    pub fn json(payload: impl Serialize + Send + 'static) -> Self {
        Self::builder().json(payload)
    }

    /// Response with no body.
    pub fn status(code: Status) -> Self {
        Self { status: code.into(), content: None, headers: Vec::new() }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: Status::Ok.into() }
    }

    pub(crate) fn error(code: u16, message: String) -> Self {
        Self { status: code, content: Some(Box::new(ErrorBody { error: message })), headers: Vec::new() }
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `Status::Ok` (200).
/// Terminated by a body method: you always know what you're sending.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: u16,
}

impl ResponseBuilder {
    pub fn status(mut self, code: Status) -> Self {
        self.status = code.into();
        self
    }

    /// Adds a header. Set `content-type` here to override the JSON default.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body.
    pub fn json(self, payload: impl Serialize + Send + 'static) -> Response {
        Response { status: self.status, content: Some(Box::new(payload)), headers: self.headers }
    }

    /// Terminate with no body (e.g. `Status::NoContent`).
    pub fn no_body(self) -> Response {
        Response { status: self.status, content: None, headers: self.headers }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into a [`Response`], for the success side of a handler.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

/// Return a [`Status`] directly from a handler: `Ok(Status::NoContent)`
impl IntoResponse for Status {
    fn into_response(self) -> Response { Response::status(self) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn builder_keeps_status_and_headers() {
        let res = Response::builder()
            .status(Status::Created)
            .header("location", "/api/notes/1")
            .json(json!({ "id": 1 }));
        assert_eq!(res.status_code(), 201);
        assert_eq!(res.headers(), &[("location".to_owned(), "/api/notes/1".to_owned())]);
    }

    #[test]
    fn payload_encoding_round_trips_nested_values() {
        let original = json!({
            "list": [1, "two", 3.5, null, true],
            "nested": { "deep": { "empty": [], "obj": {} } },
            "text": "ünïcode \"quoted\"",
        });
        let res = Response::json(original.clone());
        let bytes = res.content.as_ref().unwrap().encode().unwrap();
        let decoded: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn error_body_has_single_error_field() {
        let res = Response::error(404, "not found".to_owned());
        let bytes = res.content.unwrap().encode().unwrap();
        assert_eq!(bytes, br#"{"error":"not found"}"#);
    }
}
