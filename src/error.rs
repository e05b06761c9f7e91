//! Infrastructure error type.

use std::net::AddrParseError;
use std::path::PathBuf;

/// The error type returned by keel's fallible setup and serving operations.
///
/// Request-level failures (400, 404, 500, …) are not `Error`s. Handlers
/// return them as tagged [`BoxError`](crate::BoxError) values and the
/// boundary turns them into responses. This type surfaces failures that
/// stop the service: reading configuration, loading translations, building
/// the route table, binding a port or accepting a connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid listen address `{addr}`: {source}")]
    Address {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    #[error("invalid config value for {key}: {reason}")]
    Config { key: &'static str, reason: String },

    #[error("invalid route `{path}`: {source}")]
    Route {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("route `{method} {path}` requires authentication but no auth stage is configured")]
    AuthStageMissing { method: String, path: String },

    #[error("cannot read translations `{}`: {source}", path.display())]
    TranslationsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed translations `{}`: {source}", path.display())]
    TranslationsFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
