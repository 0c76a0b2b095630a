//! Service configuration from the environment

use crate::locale::Locale;
use crate::runtime::SessionSettings;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_REPLY_DELAY_MS: u64 = 1000;
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub reply_delay: Duration,
    pub default_locale: Locale,
    /// Directory whose `<locale>.json` files replace the embedded dialogues
    pub content_dir: Option<PathBuf>,
    pub session_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            reply_delay: Duration::from_millis(DEFAULT_REPLY_DELAY_MS),
            default_locale: Locale::En,
            content_dir: None,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parse_or("MESSAGE_US_PORT", &lookup, defaults.port),
            reply_delay: Duration::from_millis(parse_or(
                "MESSAGE_US_REPLY_DELAY_MS",
                &lookup,
                DEFAULT_REPLY_DELAY_MS,
            )),
            default_locale: parse_or("MESSAGE_US_DEFAULT_LOCALE", &lookup, defaults.default_locale),
            content_dir: lookup("MESSAGE_US_CONTENT_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            session_ttl: Duration::from_secs(parse_or(
                "MESSAGE_US_SESSION_TTL_SECS",
                &lookup,
                DEFAULT_SESSION_TTL_SECS,
            )),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            reply_delay: self.reply_delay,
            default_locale: self.default_locale,
            idle_ttl: self.session_ttl,
        }
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T
where
    T: FromStr + Copy,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "Ignoring invalid setting");
            default
        }
    }
}
