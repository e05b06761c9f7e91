//! Read-only translation table.
//!
//! Built once at startup and shared behind an `Arc`. Every lookup succeeds:
//! a missing locale or key yields the key itself, so an untranslated message
//! degrades to something readable instead of failing the request.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::Error;
use crate::locale::Locale;

/// `locale → key → text`.
#[derive(Debug, Default)]
pub struct Translator {
    tables: HashMap<String, HashMap<String, String>>,
}

impl Translator {
    /// An empty table. Every lookup returns its key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from in-memory `(locale, [(key, text)])` entries.
    ///
    /// ```rust
    /// use keel::{Locale, Translator};
    ///
    /// let t = Translator::from_tables([
    ///     ("en", vec![("notfound", "not found")]),
    ///     ("es", vec![("notfound", "no encontrado")]),
    /// ]);
    /// assert_eq!(t.translate(&Locale::from("es"), "notfound"), "no encontrado");
    /// assert_eq!(t.translate(&Locale::from("de"), "notfound"), "notfound");
    /// ```
    pub fn from_tables<L, K, V, I>(tables: impl IntoIterator<Item = (L, I)>) -> Self
    where
        L: Into<String>,
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let tables = tables
            .into_iter()
            .map(|(locale, entries)| {
                let entries = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
                (locale.into(), entries)
            })
            .collect();
        Self { tables }
    }

    /// Loads `<dir>/<locale>.json` for every requested locale.
    ///
    /// Each file is a flat JSON object of `"key": "text"` pairs. A missing or
    /// malformed file is an error: translations are part of the deployment.
    pub fn load_dir<S: AsRef<str>>(dir: impl AsRef<Path>, locales: &[S]) -> Result<Self, Error> {
        let mut tables = HashMap::with_capacity(locales.len());
        for locale in locales {
            let locale = locale.as_ref();
            let path = dir.as_ref().join(format!("{locale}.json"));
            let raw = std::fs::read(&path)
                .map_err(|source| Error::TranslationsIo { path: path.clone(), source })?;
            let table: HashMap<String, String> = serde_json::from_slice(&raw)
                .map_err(|source| Error::TranslationsFormat { path: path.clone(), source })?;
            info!(locale, keys = table.len(), "translations loaded");
            tables.insert(locale.to_owned(), table);
        }
        Ok(Self { tables })
    }

    /// Looks `key` up under `locale`, falling back to `key`.
    pub fn translate<'a>(&'a self, locale: &Locale, key: &'a str) -> &'a str {
        self.tables
            .get(locale.as_str())
            .and_then(|table| table.get(key))
            .map_or(key, String::as_str)
    }
}
