//! Locale identifiers and the `Accept-Language` reduction.

use std::fmt;

/// A language tag such as `en` or `es-AR`.
///
/// Kept verbatim: no case folding, no region fallback. An empty locale is
/// valid and simply matches no translation table.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Locale(String);

impl Locale {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Reduces an `Accept-Language` value to its first entry.
    ///
    /// `"es-ES,en;q=0.8"` becomes `es-ES`. Weights are not compared; the
    /// client's first choice wins. Returns `None` when nothing usable is left.
    pub fn from_accept_language(value: &str) -> Option<Self> {
        let first = value.split(',').next()?;
        let tag = first.split(';').next()?.trim();
        if tag.is_empty() {
            return None;
        }
        Some(Self(tag.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locale {
    fn from(tag: &str) -> Self {
        Self(tag.to_owned())
    }
}
