//! Runtime settings read from the environment (and `.env` via dotenvy).

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::fetch::{FetchConfig, RetryPolicy};
use crate::normalize::{DEFAULT_CONNECTOR_WORDS, TextNormalizer};

const DEFAULT_POOL_SIZE: u32 = 2;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Required unless the run writes to the in-memory store.
    pub database_url: Option<String>,
    pub pool_size: u32,
    pub fetch: FetchConfig,
    pub connector_words: Vec<String>,
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = FetchConfig::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let fetch = FetchConfig {
            search_url: get("OFF_SEARCH_URL").unwrap_or(defaults.search_url),
            user_agent: get("OFF_USER_AGENT").unwrap_or(defaults.user_agent),
            page_size: parse_positive(&get, "OFF_PAGE_SIZE", defaults.page_size)?,
            request_timeout: Duration::from_secs(parse(
                &get,
                "OFF_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            rate_limit: millis(&get, "OFF_RATE_LIMIT_MS", defaults.rate_limit)?,
            retry: RetryPolicy {
                max_retries: parse(&get, "OFF_MAX_RETRIES", defaults.retry.max_retries)?,
                base_delay: millis(&get, "OFF_BACKOFF_BASE_MS", defaults.retry.base_delay)?,
                max_delay: millis(&get, "OFF_BACKOFF_MAX_MS", defaults.retry.max_delay)?,
            },
        };

        let connector_words = match get("NORMALIZE_CONNECTOR_WORDS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_CONNECTOR_WORDS.iter().map(|w| w.to_string()).collect(),
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            pool_size: parse_positive(&get, "DB_POOL_SIZE", DEFAULT_POOL_SIZE)?,
            fetch,
            connector_words,
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))
    }

    pub fn normalizer(&self) -> TextNormalizer {
        TextNormalizer::new(&self.connector_words)
    }
}

fn parse<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_positive<G>(get: &G, key: &'static str, default: u32) -> Result<u32, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = parse(get, key, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn millis<G>(get: &G, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse(get, key, default_ms).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<IngestConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        IngestConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.fetch.search_url, crate::fetch::DEFAULT_SEARCH_URL);
        assert_eq!(config.fetch.page_size, 250);
        assert_eq!(config.fetch.rate_limit, Duration::from_millis(600));
        assert_eq!(config.fetch.retry, RetryPolicy::default());
        assert!(config.connector_words.iter().any(|w| w == "of"));
        assert_eq!(config.require_database_url(), Err(ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/food"),
            ("OFF_PAGE_SIZE", "50"),
            ("OFF_RATE_LIMIT_MS", "0"),
            ("OFF_MAX_RETRIES", "1"),
            ("OFF_BACKOFF_BASE_MS", "10"),
            ("NORMALIZE_CONNECTOR_WORDS", "et, du ,,"),
        ])
        .unwrap();

        assert_eq!(config.require_database_url(), Ok("postgres://localhost/food"));
        assert_eq!(config.fetch.page_size, 50);
        assert_eq!(config.fetch.rate_limit, Duration::ZERO);
        assert_eq!(config.fetch.retry.max_retries, 1);
        assert_eq!(config.fetch.retry.base_delay, Duration::from_millis(10));
        assert_eq!(config.connector_words, vec!["et", "du"]);
        assert_eq!(
            config.normalizer().normalize(Some("pain du jour")),
            Some("Pain du Jour".to_string())
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[("OFF_MAX_RETRIES", "many")]),
            Err(ConfigError::Invalid { key: "OFF_MAX_RETRIES", .. })
        ));
        assert!(matches!(
            config(&[("OFF_PAGE_SIZE", "0")]),
            Err(ConfigError::Invalid { key: "OFF_PAGE_SIZE", .. })
        ));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = config(&[("DATABASE_URL", "  "), ("OFF_PAGE_SIZE", "")]).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.fetch.page_size, 250);
    }
}
