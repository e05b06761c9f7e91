//! # keel
//!
//! The request-processing core of a JSON web service: route dispatch,
//! an ordered middleware chain, a domain error taxonomy and the mapping of
//! those errors to localized HTTP responses.
//!
//! ## The contract
//!
//! A reverse proxy in front of the service handles TLS, rate limiting and
//! body-size limits. keel owns what changes between applications:
//!
//! - Radix-tree routing under one API prefix, via [`matchit`]
//! - An ordered, short-circuiting middleware chain per route
//! - One place where errors become `{"error": "<message>"}` responses
//! - Messages translated per request from `Accept-Language`
//! - Optional CORS for configured browser origins
//! - Graceful shutdown on SIGTERM / Ctrl-C
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use keel::{BoxError, Config, Controller, DomainError, Method, Request, Response, Route, Server, Translator};
//!
//! struct Notes;
//!
//! impl Controller for Notes {
//!     fn routes(&self) -> Vec<Route> {
//!         vec![Route::new(Method::Get, "/notes/{id}", get_note)]
//!     }
//! }
//!
//! async fn get_note(req: Request) -> Result<Response, BoxError> {
//!     let id = req.id_param("id")?;
//!     if id != 1 {
//!         return Err(DomainError::NotFound.with_context(format!("note {id}")).into());
//!     }
//!     Ok(Response::json(serde_json::json!({ "id": id, "text": "hello" })))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), keel::Error> {
//!     let config = Config::from_env()?;
//!     keel::telemetry::init_logging(&config.logging);
//!     let translator = Translator::load_dir(&config.locales_dir, &config.locales)?;
//!     Server::new(config, translator).controller(Notes).serve().await
//! }
//! ```

mod config;
mod context;
mod domain;
mod error;
mod handler;
mod locale;
mod mapper;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;
mod translator;
mod writer;

pub mod middleware;
pub mod telemetry;

pub use config::Config;
pub use context::{Principal, RequestContext, RequestId};
pub use domain::{BoxError, ContextError, DomainError, LocalizableError};
pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use locale::Locale;
pub use mapper::{HttpError, INTERNAL_ERROR_KEY, classify, map_to_http, status_for};
pub use method::Method;
pub use request::Request;
pub use response::{IntoResponse, Payload, Response, ResponseBuilder};
pub use router::{Controller, Route};
pub use server::{Dispatcher, ErrorResponder, Server};
pub use status::Status;
pub use translator::Translator;
pub use writer::ResponseWriter;
