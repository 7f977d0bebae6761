//! Environment-driven configuration and credential handling

use crate::TravelError;
use reqwest::Client;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_TRIPADVISOR_API_URL: &str = "https://api.content.tripadvisor.com/api/v1";
pub const DEFAULT_AVIASALES_API_URL: &str = "https://api.travelpayouts.com";
pub const DEFAULT_AVIASALES_PARTNER_ID: &str = "592431";
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HOTEL_FANOUT: usize = 8;
pub const DEFAULT_DETAIL_CACHE_SIZE: usize = 256;

/// Values shipped in sample `.env` files that must never reach a provider
pub const PLACEHOLDER_KEYS: &[&str] = &[
    "YOUR_TRIPADVISOR_API_KEY",
    "YOUR_AVIASALES_API_KEY",
    "YOUR_GEMINI_API_KEY",
    "YOUR_API_KEY",
    "placeholder",
    "changeme",
];

/// An optional provider credential. Empty and placeholder values count as absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKey(Option<String>);

impl ApiKey {
    pub fn new(value: Option<String>) -> Self {
        Self(value.map(|v| v.trim().to_string()))
    }

    pub fn missing() -> Self {
        Self(None)
    }

    /// The key, if it is worth sending to a provider
    pub fn usable(&self) -> Option<&str> {
        self.0
            .as_deref()
            .filter(|k| !k.is_empty())
            .filter(|k| !PLACEHOLDER_KEYS.iter().any(|p| p.eq_ignore_ascii_case(k)))
    }

    pub fn is_usable(&self) -> bool {
        self.usable().is_some()
    }
}

impl From<&str> for ApiKey {
    fn from(value: &str) -> Self {
        Self::new(Some(value.to_string()))
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.0, self.is_usable()) {
            (None, _) => f.write_str("ApiKey(missing)"),
            (Some(_), true) => f.write_str("ApiKey(***)"),
            (Some(_), false) => f.write_str("ApiKey(placeholder)"),
        }
    }
}

/// What to do with a hotel whose detail fetch failed during fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialItemPolicy {
    /// Drop the hotel from the batch
    Omit,
    /// Keep a minimal hotel built from the search summary
    #[default]
    Placeholder,
}

impl FromStr for PartialItemPolicy {
    type Err = TravelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "omit" | "skip" => Ok(PartialItemPolicy::Omit),
            "placeholder" | "partial" => Ok(PartialItemPolicy::Placeholder),
            _ => Err(TravelError::ConfigError(format!("Invalid partial item policy: {}", s))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub tripadvisor_api_key: ApiKey,
    pub tripadvisor_api_url: String,
    pub aviasales_api_key: ApiKey,
    pub aviasales_api_url: String,
    pub aviasales_partner_id: String,
    pub gemini_api_key: ApiKey,
    pub gemini_api_url: String,
    pub gemini_model: String,
    pub http_timeout: Duration,
    pub hotel_fanout: usize,
    pub partial_items: PartialItemPolicy,
    pub detail_cache_size: NonZeroUsize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tripadvisor_api_key: ApiKey::missing(),
            tripadvisor_api_url: DEFAULT_TRIPADVISOR_API_URL.to_string(),
            aviasales_api_key: ApiKey::missing(),
            aviasales_api_url: DEFAULT_AVIASALES_API_URL.to_string(),
            aviasales_partner_id: DEFAULT_AVIASALES_PARTNER_ID.to_string(),
            gemini_api_key: ApiKey::missing(),
            gemini_api_url: DEFAULT_GEMINI_API_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            hotel_fanout: DEFAULT_HOTEL_FANOUT,
            partial_items: PartialItemPolicy::default(),
            detail_cache_size: NonZeroUsize::new(DEFAULT_DETAIL_CACHE_SIZE)
                .unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl Config {
    /// Load configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |name: &str, default: String| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let gemini_key = lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY"));

        let http_timeout_secs = parse_or(
            "WAYFARE_HTTP_TIMEOUT_SECS",
            lookup("WAYFARE_HTTP_TIMEOUT_SECS"),
            DEFAULT_HTTP_TIMEOUT_SECS,
        );
        let hotel_fanout = parse_or(
            "WAYFARE_HOTEL_FANOUT",
            lookup("WAYFARE_HOTEL_FANOUT"),
            DEFAULT_HOTEL_FANOUT,
        )
        .max(1);
        let detail_cache_size = parse_or(
            "WAYFARE_DETAIL_CACHE_SIZE",
            lookup("WAYFARE_DETAIL_CACHE_SIZE"),
            DEFAULT_DETAIL_CACHE_SIZE,
        );
        let partial_items = parse_or(
            "WAYFARE_PARTIAL_ITEMS",
            lookup("WAYFARE_PARTIAL_ITEMS"),
            PartialItemPolicy::default(),
        );

        let config = Self {
            tripadvisor_api_key: ApiKey::new(lookup("TRIPADVISOR_API_KEY")),
            tripadvisor_api_url: text("TRIPADVISOR_API_URL", defaults.tripadvisor_api_url),
            aviasales_api_key: ApiKey::new(lookup("AVIASALES_API_KEY")),
            aviasales_api_url: text("AVIASALES_API_URL", defaults.aviasales_api_url),
            aviasales_partner_id: text("AVIASALES_PARTNER_ID", defaults.aviasales_partner_id),
            gemini_api_key: ApiKey::new(gemini_key),
            gemini_api_url: text("GEMINI_API_URL", defaults.gemini_api_url),
            gemini_model: text("GEMINI_MODEL", defaults.gemini_model),
            http_timeout: Duration::from_secs(http_timeout_secs.max(1)),
            hotel_fanout,
            partial_items,
            detail_cache_size: NonZeroUsize::new(detail_cache_size)
                .unwrap_or(defaults.detail_cache_size),
        };

        debug!(
            tripadvisor = config.tripadvisor_api_key.is_usable(),
            aviasales = config.aviasales_api_key.is_usable(),
            gemini = config.gemini_api_key.is_usable(),
            hotel_fanout = config.hotel_fanout,
            "Configuration loaded"
        );
        config
    }

    pub fn with_tripadvisor(mut self, base_url: impl Into<String>, key: ApiKey) -> Self {
        self.tripadvisor_api_url = base_url.into();
        self.tripadvisor_api_key = key;
        self
    }

    pub fn with_aviasales(mut self, base_url: impl Into<String>, key: ApiKey) -> Self {
        self.aviasales_api_url = base_url.into();
        self.aviasales_api_key = key;
        self
    }

    pub fn with_gemini(mut self, base_url: impl Into<String>, key: ApiKey) -> Self {
        self.gemini_api_url = base_url.into();
        self.gemini_api_key = key;
        self
    }

    pub fn with_partial_items(mut self, policy: PartialItemPolicy) -> Self {
        self.partial_items = policy;
        self
    }

    /// Shared HTTP client; every outbound call gets the configured timeout
    pub fn http_client(&self) -> Result<Client, TravelError> {
        Ok(Client::builder()
            .timeout(self.http_timeout)
            .user_agent(concat!("wayfare/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }
}

fn parse_or<T: FromStr>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(variable = name, value = %value, "Ignoring unparsable configuration value");
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_placeholder_keys_are_not_usable() {
        assert!(!ApiKey::from("YOUR_TRIPADVISOR_API_KEY").is_usable());
        assert!(!ApiKey::from("   ").is_usable());
        assert!(!ApiKey::missing().is_usable());
        assert_eq!(ApiKey::from(" real-key ").usable(), Some("real-key"));
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let debug = format!("{:?}", ApiKey::from("secret-value"));
        assert!(!debug.contains("secret-value"));
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.aviasales_partner_id, "592431");
        assert_eq!(config.hotel_fanout, DEFAULT_HOTEL_FANOUT);
        assert_eq!(config.partial_items, PartialItemPolicy::Placeholder);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert!(!config.tripadvisor_api_key.is_usable());
    }

    #[test]
    fn test_values_read_from_lookup() {
        let config = Config::from_lookup(lookup_from(&[
            ("TRIPADVISOR_API_KEY", "ta-key"),
            ("GOOGLE_API_KEY", "g-key"),
            ("WAYFARE_HOTEL_FANOUT", "4"),
            ("WAYFARE_PARTIAL_ITEMS", "omit"),
            ("WAYFARE_HTTP_TIMEOUT_SECS", "not-a-number"),
        ]));
        assert_eq!(config.tripadvisor_api_key.usable(), Some("ta-key"));
        assert_eq!(config.gemini_api_key.usable(), Some("g-key"));
        assert_eq!(config.hotel_fanout, 4);
        assert_eq!(config.partial_items, PartialItemPolicy::Omit);
        assert_eq!(config.http_timeout, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
    }

    #[test]
    fn test_partial_item_policy_parsing() {
        assert!(matches!("omit".parse::<PartialItemPolicy>(), Ok(PartialItemPolicy::Omit)));
        assert!(matches!(
            "Placeholder".parse::<PartialItemPolicy>(),
            Ok(PartialItemPolicy::Placeholder)
        ));
        assert!("invalid".parse::<PartialItemPolicy>().is_err());
    }
}
