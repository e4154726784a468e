use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::{ClientError, RetryConfig};

/// Per-request caching behavior.
///
/// Only GET responses are ever cached; for other methods every variant
/// behaves like [`CachePolicy::Disabled`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Cache GET responses with the client's TTL.
    #[default]
    Default,
    /// Neither read from nor write to the cache.
    Disabled,
    /// Cache with the client's TTL.
    Enabled,
    /// Cache with a request-specific TTL.
    Ttl(Duration),
}

impl CachePolicy {
    /// Returns the TTL to cache with, or `None` when the request is not cacheable.
    pub(crate) fn ttl_for(self, method: &Method, default_ttl: Duration) -> Option<Duration> {
        if *method != Method::GET {
            return None;
        }
        match self {
            Self::Default | Self::Enabled => Some(default_ttl),
            Self::Disabled => None,
            Self::Ttl(ttl) => Some(ttl),
        }
    }
}

impl From<bool> for CachePolicy {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }
}

impl From<Duration> for CachePolicy {
    fn from(ttl: Duration) -> Self {
        Self::Ttl(ttl)
    }
}

/// Partial override of the client's [`RetryConfig`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RetryOverride {
    pub max_retries: Option<u32>,
    pub base_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub backoff_multiplier: Option<f64>,
}

impl RetryOverride {
    /// Layers the set fields over `base`.
    pub fn apply(&self, base: &RetryConfig) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            base_delay: self.base_delay.unwrap_or(base.base_delay),
            max_delay: self.max_delay.unwrap_or(base.max_delay),
            backoff_multiplier: self.backoff_multiplier.unwrap_or(base.backoff_multiplier),
        }
    }
}

impl From<RetryConfig> for RetryOverride {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_retries: Some(config.max_retries),
            base_delay: Some(config.base_delay),
            max_delay: Some(config.max_delay),
            backoff_multiplier: Some(config.backoff_multiplier),
        }
    }
}

/// Options for a single request.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Query parameters, appended in order.
    pub params: Vec<(String, String)>,
    /// JSON payload; ignored for GET.
    pub body: Option<Value>,
    /// Extra headers, merged over `Content-Type: application/json`.
    pub headers: HeaderMap,
    pub cache: CachePolicy,
    pub retry: RetryOverride,
    /// Per-attempt deadline; the client default applies when unset.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn params<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.params.extend(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.to_string())),
        );
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serializes `body` as the JSON payload.
    pub fn json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, ClientError> {
        let value = serde_json::to_value(body).map_err(|err| {
            ClientError::invalid_request(format!("failed to serialize request body: {err}"))
        })?;
        Ok(self.body(value))
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn cache(mut self, cache: impl Into<CachePolicy>) -> Self {
        self.cache = cache.into();
        self
    }

    pub fn no_cache(self) -> Self {
        self.cache(CachePolicy::Disabled)
    }

    pub fn retry(mut self, retry: impl Into<RetryOverride>) -> Self {
        self.retry = retry.into();
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = Some(max_retries);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
