//! Status-recording response writer.
//!
//! Every response, success or error, leaves the service through a
//! [`ResponseWriter`]. It fixes the emission order (custom headers, then
//! status line, then body), remembers the status it actually committed so
//! the logging stage can report it, and refuses a second write.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http_body_util::Full;
use tracing::{error, warn};

use crate::response::{Payload, Response};

/// One per request. Owns the response under construction.
pub struct ResponseWriter {
    headers: HeaderMap,
    status: Option<http::StatusCode>,
    body: Bytes,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self { headers: HeaderMap::new(), status: None, body: Bytes::new() }
    }

    /// Emits `response`. The first call wins; later calls are logged and
    /// dropped because the status line has already gone out.
    pub fn write(&mut self, response: Response) {
        if let Some(sent) = self.status {
            warn!(sent = sent.as_u16(), ignored = response.status, "response already written");
            return;
        }
        let Response { status, content, headers } = response;
        if content.is_some() {
            self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        self.set_custom_headers(headers);
        self.write_status(status);
        if let Some(content) = content {
            self.write_content(&*content);
        }
    }

    /// Sets a header ahead of the response, for stages that decorate every
    /// response behind them. Headers the response itself carries win.
    /// Ignored once the response is written.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.is_committed() {
            warn!(header = %name, "response already written, header dropped");
            return;
        }
        self.headers.insert(name, value);
    }

    /// The status that was committed, or `200` if nothing was written yet
    /// (what an untouched response defaults to on the wire).
    pub fn status(&self) -> u16 {
        self.status.map_or(200, |s| s.as_u16())
    }

    pub fn is_committed(&self) -> bool {
        self.status.is_some()
    }

    pub(crate) fn finish(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status.unwrap_or(http::StatusCode::OK);
        *res.headers_mut() = self.headers;
        res
    }

    fn set_custom_headers(&mut self, headers: Vec<(String, String)>) {
        for (name, value) in headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(name), Ok(value)) => {
                    self.headers.insert(name, value);
                }
                _ => warn!(header = %name, "dropping invalid response header"),
            }
        }
    }

    fn write_status(&mut self, status: u16) {
        let code = http::StatusCode::from_u16(status).unwrap_or_else(|_| {
            error!(status, "invalid status code, sending 500");
            http::StatusCode::INTERNAL_SERVER_ERROR
        });
        self.status = Some(code);
    }

    fn write_content(&mut self, content: &dyn Payload) {
        match content.encode() {
            Ok(bytes) => self.body = Bytes::from(bytes),
            // Status and headers are committed; the body stays empty.
            Err(e) => error!(error = %e, "failed to write response"),
        }
    }
}

impl Default for ResponseWriter {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde::ser::{Error as _, Serialize, Serializer};
    use serde_json::json;

    use crate::status::Status;

    async fn body_of(res: http::Response<Full<Bytes>>) -> Bytes {
        res.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn writes_headers_status_and_body() {
        let mut w = ResponseWriter::new();
        w.write(
            Response::builder()
                .header("X-Custom", "v")
                .json(json!({ "message": "success" })),
        );
        assert_eq!(w.status(), 200);

        let res = w.finish();
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["x-custom"], "v");
        assert_eq!(res.headers()["content-type"], "application/json");
        assert_eq!(body_of(res).await, r#"{"message":"success"}"#);
    }

    #[tokio::test]
    async fn encoding_is_deterministic() {
        let mut bodies = Vec::new();
        for _ in 0..3 {
            let mut w = ResponseWriter::new();
            w.write(Response::json(json!({ "b": [1, 2], "a": { "z": 1, "y": 2 } })));
            bodies.push(body_of(w.finish()).await);
        }
        assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn custom_content_type_overrides_default() {
        let mut w = ResponseWriter::new();
        w.write(
            Response::builder()
                .header("Content-Type", "application/problem+json")
                .json(json!({})),
        );
        let res = w.finish();
        assert_eq!(res.headers()["content-type"], "application/problem+json");
    }

    #[test]
    fn second_write_is_ignored() {
        let mut w = ResponseWriter::new();
        w.write(Response::status(Status::Created));
        w.write(Response::status(Status::InternalServerError));
        assert_eq!(w.status(), 201);
        assert_eq!(w.finish().status(), 201);
    }

    #[test]
    fn empty_response_has_no_content_type() {
        let mut w = ResponseWriter::new();
        w.write(Response::status(Status::NoContent));
        let res = w.finish();
        assert_eq!(res.status(), 204);
        assert!(res.headers().get("content-type").is_none());
    }

    #[test]
    fn preset_headers_survive_the_write_unless_overridden() {
        let mut w = ResponseWriter::new();
        w.set_header(HeaderName::from_static("vary"), HeaderValue::from_static("origin"));
        w.set_header(HeaderName::from_static("x-custom"), HeaderValue::from_static("stage"));
        w.write(Response::builder().header("X-Custom", "handler").json(json!({})));
        w.set_header(HeaderName::from_static("x-late"), HeaderValue::from_static("1"));

        let res = w.finish();
        assert_eq!(res.headers()["vary"], "origin");
        assert_eq!(res.headers()["x-custom"], "handler");
        assert!(res.headers().get("x-late").is_none());
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("boom"))
        }
    }

    #[tokio::test]
    async fn serialization_failure_keeps_status_and_empty_body() {
        let mut w = ResponseWriter::new();
        w.write(Response::builder().status(Status::Created).json(Unencodable));
        assert!(w.is_committed());
        let res = w.finish();
        assert_eq!(res.status(), 201);
        assert!(body_of(res).await.is_empty());
    }
}
