//! Request-scoped state.
//!
//! One [`RequestContext`] is created per request and travels inside the
//! [`Request`](crate::Request) through every stage. It is never shared
//! between requests. Each field has one writer: the request-id stage, the
//! locale stage, and the auth stage respectively.

use std::fmt;

use crate::locale::Locale;

/// Client-supplied correlation identifier (`X-Request-ID`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity established by an authentication stage.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Principal(String);

impl Principal {
    pub fn new(subject: impl Into<String>) -> Self {
        Self(subject.into())
    }

    pub fn subject(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    request_id: Option<RequestId>,
    locale: Locale,
    principal: Option<Principal>,
}

impl RequestContext {
    /// Fresh context resolved to `default_locale` until the locale stage runs.
    pub fn new(default_locale: Locale) -> Self {
        Self { request_id: None, locale: default_locale, principal: None }
    }

    /// Set once the request-id stage has accepted the request.
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Correlation id for log fields; `-` before identification.
    pub(crate) fn log_id(&self) -> &str {
        self.request_id.as_ref().map_or("-", RequestId::as_str)
    }

    pub(crate) fn set_request_id(&mut self, id: RequestId) {
        self.request_id = Some(id);
    }

    pub(crate) fn set_locale(&mut self, locale: Locale) {
        self.locale = locale;
    }

    /// Records the authenticated caller. Intended for auth stages only.
    pub fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }
}
