//! HTTP status codes a JSON microservice actually sends.
//!
//! Use [`Status`] anywhere a status code is accepted: `Response::status()`,
//! `Response::builder().status()`, or as a bare handler return value.
//!
//! ```rust
//! use keel::{Response, Status};
//!
//! // status-only, no body
//! Response::status(Status::NoContent);
//!
//! // any `Serialize` payload; keel encodes it when the response is written
//! Response::builder()
//!     .status(Status::Created)
//!     .header("location", "/api/notes/42")
//!     .json(serde_json::json!({ "id": 42 }));
//! ```
//!
//! Error statuses are normally not picked by hand. Return a
//! [`DomainError`](crate::DomainError) and the boundary chooses.

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Status {
    // ── 2xx Success ───────────────────────────────────────────────────────────
    Ok,                  // 200
    Created,             // 201
    NoContent,           // 204

    // ── 4xx Client errors ─────────────────────────────────────────────────────
    BadRequest,          // 400
    Unauthorized,        // 401
    NotFound,            // 404
    Conflict,            // 409

    // ── 5xx Server errors ─────────────────────────────────────────────────────
    InternalServerError, // 500
}

impl Status {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Ok                  => 200,
            Self::Created             => 201,
            Self::NoContent           => 204,
            Self::BadRequest          => 400,
            Self::Unauthorized        => 401,
            Self::NotFound            => 404,
            Self::Conflict            => 409,
            Self::InternalServerError => 500,
        }
    }
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        s.as_u16()
    }
}
