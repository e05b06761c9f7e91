//! Service configuration from the environment.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `KEEL_LISTEN_ADDR` | `0.0.0.0:8080` | socket to bind |
//! | `KEEL_API_PREFIX` | `/api` | prefix every controller route is mounted under |
//! | `KEEL_DEFAULT_LOCALE` | `en` | locale when `Accept-Language` is absent |
//! | `KEEL_LOCALES_DIR` | `locales` | directory holding `<locale>.json` files |
//! | `KEEL_LOCALES` | `en,es` | locales to load, comma separated |
//! | `KEEL_ALLOW_ORIGINS` | empty | browser origins allowed cross-origin, comma separated; `*` for any, empty for none |
//! | `LOG_FORMAT` | `json` | `json` or `text` |
//! | `RUST_LOG` | `info` | log filter |

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::Error;
use crate::locale::Locale;
use crate::telemetry::{LogFormat, LoggingConfig};

#[derive(Clone, Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub api_prefix: String,
    pub default_locale: Locale,
    pub locales_dir: PathBuf,
    pub locales: Vec<String>,
    pub allow_origins: Vec<String>,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            api_prefix: "/api".to_owned(),
            default_locale: Locale::from("en"),
            locales_dir: PathBuf::from("locales"),
            locales: vec!["en".to_owned(), "es".to_owned()],
            allow_origins: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same parse as [`Config::from_env`] against any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(addr) = lookup("KEEL_LISTEN_ADDR") {
            config.listen_addr = addr
                .parse()
                .map_err(|source| Error::Address { addr: addr.clone(), source })?;
        }
        if let Some(prefix) = lookup("KEEL_API_PREFIX") {
            config.api_prefix = normalize_prefix(&prefix)?;
        }
        if let Some(locale) = lookup("KEEL_DEFAULT_LOCALE") {
            config.default_locale = Locale::new(locale.trim());
        }
        if let Some(dir) = lookup("KEEL_LOCALES_DIR") {
            config.locales_dir = PathBuf::from(dir);
        }
        if let Some(list) = lookup("KEEL_LOCALES") {
            config.locales = split_list(&list);
        }
        if let Some(list) = lookup("KEEL_ALLOW_ORIGINS") {
            config.allow_origins = split_list(&list);
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            config.logging.format = LogFormat::parse(&format);
        }
        if let Some(level) = lookup("RUST_LOG") {
            config.logging.level = level;
        }

        Ok(config)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect()
}

/// `""` and `"/"` mean "no prefix"; otherwise a leading `/` is required and a
/// trailing one is dropped.
fn normalize_prefix(raw: &str) -> Result<String, Error> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if !trimmed.starts_with('/') {
        return Err(Error::Config { key: "KEEL_API_PREFIX", reason: format!("`{raw}` must start with `/`") });
    }
    Ok(trimmed.to_owned())
}
