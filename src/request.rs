//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::HeaderMap;
use serde::de::DeserializeOwned;

use crate::context::RequestContext;
use crate::domain::{BoxError, DomainError, LocalizableError};

/// An incoming HTTP request with its body fully read, its path parameters
/// resolved, and the request-scoped [`RequestContext`] attached.
pub struct Request {
    pub(crate) method: http::Method,
    pub(crate) path: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) context: RequestContext,
}

impl Request {
    pub(crate) fn new(
        parts: http::request::Parts,
        body: Bytes,
        params: HashMap<String, String>,
        context: RequestContext,
    ) -> Self {
        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            headers: parts.headers,
            body,
            params,
            context,
        }
    }

    pub fn method(&self) -> &str { self.method.as_str() }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn context(&self) -> &RequestContext { &self.context }

    /// Mutable access for stages that own a context field (auth stages set
    /// the principal here before calling `next`).
    pub fn context_mut(&mut self) -> &mut RequestContext { &mut self.context }

    /// Case-insensitive header lookup. Values that are not visible ASCII are
    /// treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header(http::header::USER_AGENT.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/notes/{id}`, `req.param("id")` on `/notes/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Reads a path parameter as an unsigned id.
    ///
    /// Missing or non-numeric values are reported as localizable
    /// [`DomainError::InvalidInput`] under the `invalidid` key.
    pub fn id_param(&self, key: &str) -> Result<u32, BoxError> {
        let raw = self.param(key).ok_or_else(|| {
            LocalizableError::new("invalidid", DomainError::InvalidInput.with_context(format!("no {key} provided at path")))
        })?;
        raw.parse::<u32>().map_err(|_| {
            LocalizableError::new("invalidid", DomainError::InvalidInput.with_context(format!("{key} is not an unsigned integer")))
                .into()
        })
    }

    /// Decodes the body as JSON.
    ///
    /// Decoding failures are reported as localizable
    /// [`DomainError::InvalidInput`] under the `invalidbody` key.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, BoxError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            LocalizableError::new("invalidbody", DomainError::InvalidInput.with_context(e.to_string())).into()
        })
    }
}
