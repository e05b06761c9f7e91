//! Domain error taxonomy.
//!
//! Business code fails with one of five sentinel kinds and nothing else. The
//! kind alone decides the HTTP status at the boundary; the text is only what
//! the client reads.
//!
//! ```rust
//! use keel::{BoxError, DomainError, LocalizableError};
//!
//! fn find_note(id: u32) -> Result<String, BoxError> {
//!     if id == 0 {
//!         // plain kind: message is "resource not found"
//!         return Err(DomainError::NotFound.into());
//!     }
//!     if id > 1000 {
//!         // detail + kind: message is "note 1001: invalid input"
//!         return Err(DomainError::InvalidInput.with_context(format!("note {id}")).into());
//!     }
//!     // localized: message is the `notetaken` entry for the request's locale
//!     Err(LocalizableError::new("notetaken", DomainError::Conflict).into())
//! }
//! ```

/// Type-erased request error, as returned by handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The closed set of failure kinds business logic may report.
///
/// Compared by kind, never by message text.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("invalid input")]
    InvalidInput,
    #[error("resource not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("conflict")]
    Conflict,
    #[error("unexpected internal error")]
    Internal,
}

impl DomainError {
    /// Attaches a human-readable detail while keeping the kind matchable.
    pub fn with_context(self, detail: impl Into<String>) -> ContextError {
        ContextError { detail: detail.into(), kind: self }
    }
}

/// A [`DomainError`] prefixed with call-site detail.
#[derive(Debug, thiserror::Error)]
#[error("{detail}: {kind}")]
pub struct ContextError {
    detail: String,
    #[source]
    kind: DomainError,
}

/// An error whose client-facing message comes from the translation table.
///
/// `key` is looked up under the request's locale at the boundary. The wrapped
/// error still decides the status and is what the server logs.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct LocalizableError {
    key: String,
    #[source]
    source: BoxError,
}

impl LocalizableError {
    pub fn new(key: impl Into<String>, err: impl Into<BoxError>) -> Self {
        Self { key: key.into(), source: err.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Walks `err` and its `source()` chain looking for a `T`.
pub(crate) fn find_cause<'e, T>(err: &'e (dyn std::error::Error + 'static)) -> Option<&'e T>
where
    T: std::error::Error + 'static,
{
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<T>() {
            return Some(found);
        }
        current = e.source();
    }
    None
}

/// Renders `err` and every source as `outer: inner: root`, skipping sources
/// whose text the outer message already contains.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        current = e.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_error_keeps_kind_reachable() {
        let err: BoxError = DomainError::NotFound.with_context("note 7").into();
        assert_eq!(err.to_string(), "note 7: resource not found");
        assert_eq!(find_cause::<DomainError>(&*err), Some(&DomainError::NotFound));
    }

    #[test]
    fn localizable_error_shows_wrapped_text() {
        let err = LocalizableError::new("notetaken", DomainError::Conflict);
        assert_eq!(err.key(), "notetaken");
        assert_eq!(err.to_string(), "conflict");
    }

    #[test]
    fn find_cause_looks_through_localizable_wrapper() {
        let inner = DomainError::Unauthorized.with_context("token expired");
        let err: BoxError = LocalizableError::new("sessionexpired", inner).into();
        assert_eq!(find_cause::<DomainError>(&*err), Some(&DomainError::Unauthorized));
        assert!(find_cause::<LocalizableError>(&*err).is_some());
    }

    #[test]
    fn find_cause_misses_untagged_errors() {
        let err: BoxError = "disk on fire".into();
        assert!(find_cause::<DomainError>(&*err).is_none());
    }

    #[test]
    fn error_chain_does_not_repeat_wrapped_text() {
        let err: BoxError = LocalizableError::new("k", DomainError::Internal.with_context("db down")).into();
        assert_eq!(error_chain(&*err), "db down: unexpected internal error");
    }
}
