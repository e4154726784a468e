//! `content-api-client` is a resilient async JSON client for REST backends.
//!
//! Every call made through [`ApiClient`] goes through the same pipeline:
//! - GET responses are served from an in-memory [`ResponseCache`] while fresh
//! - a sliding-window [`RateLimiter`] rejects calls over budget with `429`
//! - transient failures (5xx, timeouts, network errors) are retried with
//!   exponential backoff from [`RetryConfig`]
//! - failures surface as a single [`ClientError`] shape and are reported to
//!   an injected [`MetricsSink`]

mod cache;
mod client;
mod error;
pub mod metrics;
mod options;
mod rate_limit;
mod request;
mod response;
mod retry;
mod util;

pub use cache::{CacheEntry, ResponseCache, DEFAULT_CACHE_TTL};
pub use client::ApiClient;
pub use error::{ClientError, ErrorCode};
pub use metrics::MetricsSink;
pub use options::{ClientOptions, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use request::{CachePolicy, RequestOptions, RetryOverride};
pub use response::{ApiResponse, ResponseMeta};
pub use retry::{delay_for, RetryConfig};

pub use reqwest::Method;

pub type Result<T> = std::result::Result<T, ClientError>;
