use std::str::FromStr;
use std::time::Duration;

use crate::{cache::DEFAULT_CACHE_TTL, RateLimitConfig, RetryConfig};

/// Base address used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

/// Per-attempt deadline used when a request does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Client-wide defaults for caching, rate limiting, retries and timeouts.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientOptions {
    /// Address every endpoint is resolved against.
    pub base_url: String,
    /// TTL for cached GET responses.
    pub cache_ttl: Duration,
    /// Sliding window shared by all requests of one client.
    pub rate_limit: RateLimitConfig,
    /// Default retry behavior.
    pub retry: RetryConfig,
    /// Default per-attempt timeout.
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            cache_ttl: DEFAULT_CACHE_TTL,
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientOptions {
    /// Builds options from environment variables layered over the defaults.
    ///
    /// Reads:
    /// - `API_BASE_URL` — backend address (default [`DEFAULT_BASE_URL`])
    /// - `API_CACHE_TTL_MS`
    /// - `API_RATE_LIMIT_MAX`, `API_RATE_LIMIT_WINDOW_MS`
    /// - `API_TIMEOUT_MS`
    /// - `API_MAX_RETRIES`
    ///
    /// Returns an error if a variable is set but empty or unparsable.
    pub fn from_env() -> std::result::Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> std::result::Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(url) = lookup("API_BASE_URL") {
            if url.trim().is_empty() {
                return Err("API_BASE_URL is set but empty".to_owned());
            }
            options.base_url = url.trim().to_owned();
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "API_CACHE_TTL_MS")? {
            options.cache_ttl = Duration::from_millis(ms);
        }
        if let Some(max) = parse_var::<usize, _>(&lookup, "API_RATE_LIMIT_MAX")? {
            options.rate_limit.max_requests = max;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "API_RATE_LIMIT_WINDOW_MS")? {
            options.rate_limit.window = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "API_TIMEOUT_MS")? {
            options.timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = parse_var::<u32, _>(&lookup, "API_MAX_RETRIES")? {
            options.retry.max_retries = retries;
        }

        Ok(options)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> std::result::Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Err(format!("{name} is set but empty"));
    }
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|err| format!("{name} must be a number: {err}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{ClientOptions, DEFAULT_BASE_URL};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let options = ClientOptions::default();
        assert_eq!(options.base_url, DEFAULT_BASE_URL);
        assert_eq!(options.cache_ttl, Duration::from_secs(300));
        assert_eq!(options.rate_limit.max_requests, 100);
        assert_eq!(options.retry.max_retries, 3);
        assert_eq!(options.timeout, Duration::from_secs(30));
    }

    #[test]
    fn env_overrides_are_applied() {
        let options = ClientOptions::from_lookup(lookup(&[
            ("API_BASE_URL", " https://cms.example.com/api "),
            ("API_CACHE_TTL_MS", "1000"),
            ("API_RATE_LIMIT_MAX", "5"),
            ("API_RATE_LIMIT_WINDOW_MS", "2000"),
            ("API_TIMEOUT_MS", "250"),
            ("API_MAX_RETRIES", "0"),
        ]))
        .expect("valid env must parse");

        assert_eq!(options.base_url, "https://cms.example.com/api");
        assert_eq!(options.cache_ttl, Duration::from_secs(1));
        assert_eq!(options.rate_limit.max_requests, 5);
        assert_eq!(options.rate_limit.window, Duration::from_secs(2));
        assert_eq!(options.timeout, Duration::from_millis(250));
        assert_eq!(options.retry.max_retries, 0);
    }

    #[test]
    fn missing_env_keeps_defaults() {
        let options = ClientOptions::from_lookup(lookup(&[])).expect("empty env must parse");
        assert_eq!(options, ClientOptions::default());
    }

    #[test]
    fn empty_or_invalid_values_are_rejected() {
        let err = ClientOptions::from_lookup(lookup(&[("API_BASE_URL", "  ")]))
            .expect_err("empty url must fail");
        assert!(err.contains("API_BASE_URL"));

        let err = ClientOptions::from_lookup(lookup(&[("API_TIMEOUT_MS", "soon")]))
            .expect_err("non-numeric timeout must fail");
        assert!(err.contains("API_TIMEOUT_MS"));
    }
}
