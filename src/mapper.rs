//! Domain error → HTTP translation.
//!
//! The one place status codes for failures are chosen. Pure: no I/O, no
//! logging, never fails. The caller decides what to log using
//! [`HttpError::must_log`].

use crate::domain::{DomainError, LocalizableError, find_cause};
use crate::locale::Locale;
use crate::status::Status;
use crate::translator::Translator;

/// Key of the generic message sent for 500s from unrecognised errors.
pub const INTERNAL_ERROR_KEY: &str = "internalerror";

/// Resolved status and client-facing message for one error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpError {
    pub status: Status,
    pub message: String,
    /// The taxonomy kind that matched, `None` for unrecognised errors.
    pub kind: Option<DomainError>,
}

impl HttpError {
    /// Internal and unrecognised errors must reach the server log before
    /// they are discarded; everything else is the client's business.
    pub fn must_log(&self) -> bool {
        matches!(self.kind, None | Some(DomainError::Internal))
    }
}

/// Status for a taxonomy kind.
pub fn status_for(kind: DomainError) -> Status {
    match kind {
        DomainError::InvalidInput => Status::BadRequest,
        DomainError::Unauthorized => Status::Unauthorized,
        DomainError::NotFound     => Status::NotFound,
        DomainError::Conflict     => Status::Conflict,
        DomainError::Internal     => Status::InternalServerError,
    }
}

/// Status alone, without resolving a message.
pub fn classify(err: &(dyn std::error::Error + 'static)) -> Status {
    find_cause::<DomainError>(err).map_or(Status::InternalServerError, |kind| status_for(*kind))
}

/// Maps `err` to a status and a message in `locale`.
///
/// A [`LocalizableError`] anywhere in the chain supplies the message through
/// `translator`; otherwise the message is the error's own text. Errors with
/// no taxonomy kind become a 500 with the localized generic message, never
/// their own text.
pub fn map_to_http(err: &(dyn std::error::Error + 'static), locale: &Locale, translator: &Translator) -> HttpError {
    let (message, inner): (String, &(dyn std::error::Error + 'static)) = match find_cause::<LocalizableError>(err) {
        Some(localizable) => {
            let inner = std::error::Error::source(localizable).unwrap_or(err);
            (translator.translate(locale, localizable.key()).to_owned(), inner)
        }
        None => (err.to_string(), err),
    };

    match find_cause::<DomainError>(inner) {
        Some(&kind) => HttpError { status: status_for(kind), message, kind: Some(kind) },
        None => HttpError {
            status: Status::InternalServerError,
            message: translator.translate(locale, INTERNAL_ERROR_KEY).to_owned(),
            kind: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BoxError;

    fn translator() -> Translator {
        Translator::from_tables([
            ("en", vec![("internalerror", "internal error"), ("notetaken", "that note exists")]),
            ("es", vec![("internalerror", "error interno"), ("notetaken", "esa nota ya existe")]),
        ])
    }

    fn map(err: BoxError, locale: &str) -> HttpError {
        map_to_http(&*err, &Locale::from(locale), &translator())
    }

    #[test]
    fn each_kind_maps_to_its_status() {
        let cases = [
            (DomainError::InvalidInput, 400),
            (DomainError::Unauthorized, 401),
            (DomainError::NotFound, 404),
            (DomainError::Conflict, 409),
            (DomainError::Internal, 500),
        ];
        for (kind, code) in cases {
            let mapped = map(kind.into(), "en");
            assert_eq!(mapped.status.as_u16(), code, "{kind:?}");
            assert_eq!(mapped.kind, Some(kind));
            assert_eq!(mapped.message, kind.to_string());
        }
    }

    #[test]
    fn context_detail_is_part_of_the_message() {
        let mapped = map(DomainError::NotFound.with_context("note 9").into(), "en");
        assert_eq!(mapped.status, Status::NotFound);
        assert_eq!(mapped.message, "note 9: resource not found");
    }

    #[test]
    fn unrecognised_error_never_leaks_its_text() {
        let mapped = map("password=hunter2 in connection string".into(), "es");
        assert_eq!(mapped.status, Status::InternalServerError);
        assert_eq!(mapped.message, "error interno");
        assert_eq!(mapped.kind, None);
        assert!(mapped.must_log());
    }

    #[test]
    fn localizable_error_uses_table_entry() {
        let err = LocalizableError::new("notetaken", DomainError::Conflict);
        let mapped = map(err.into(), "es");
        assert_eq!(mapped.status, Status::Conflict);
        assert_eq!(mapped.message, "esa nota ya existe");
        assert!(!mapped.must_log());
    }

    #[test]
    fn localizable_error_falls_back_to_key() {
        let mapped = map(LocalizableError::new("notetaken", DomainError::Conflict).into(), "de");
        assert_eq!(mapped.message, "notetaken");
        let mapped = map(LocalizableError::new("nokey", DomainError::Conflict).into(), "en");
        assert_eq!(mapped.message, "nokey");
    }

    #[test]
    fn localizable_wrapper_around_untagged_error_is_generic_500() {
        let mapped = map(LocalizableError::new("notetaken", "socket closed").into(), "en");
        assert_eq!(mapped.status, Status::InternalServerError);
        assert_eq!(mapped.message, "internal error");
    }

    #[test]
    fn internal_errors_must_be_logged() {
        assert!(map(DomainError::Internal.into(), "en").must_log());
        assert!(!map(DomainError::InvalidInput.into(), "en").must_log());
    }

    #[test]
    fn classify_matches_mapped_status() {
        let err: BoxError = DomainError::Unauthorized.with_context("expired").into();
        assert_eq!(classify(&*err), Status::Unauthorized);
        let err: BoxError = "plain".into();
        assert_eq!(classify(&*err), Status::InternalServerError);
    }
}
