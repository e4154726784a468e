use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Method, Url,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::{sleep, Instant};

use crate::{
    metrics::{report_duration, report_error, MetricsSink},
    response::{CachedResponse, Pagination},
    util::{cache_key, resolve_url},
    ApiResponse, ClientError, ClientOptions, RateLimiter, RequestOptions, ResponseCache, Result,
};

/// Resilient JSON client for a REST backend.
///
/// Each client owns one response cache and one rate limiter; clones share
/// them. Calls may be issued concurrently from many tasks.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    options: ClientOptions,
    cache: Arc<ResponseCache<CachedResponse>>,
    limiter: Arc<RateLimiter>,
    metrics: Arc<dyn MetricsSink>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("options", &self.options)
            .field("cached_entries", &self.cache.len())
            .field("rate_limit_remaining", &self.limiter.remaining())
            .finish()
    }
}

/// Progress of one call, used to describe terminal failures.
#[derive(Default)]
struct CallState {
    url: Option<String>,
    attempts: u32,
}

impl ApiClient {
    /// Creates a client for `base_url` with default options.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_options(ClientOptions {
            base_url: base_url.into(),
            ..ClientOptions::default()
        })
    }

    /// Creates a client from explicit options.
    pub fn from_options(options: ClientOptions) -> Self {
        Self {
            http: reqwest::Client::new(),
            cache: Arc::new(ResponseCache::new(options.cache_ttl)),
            limiter: Arc::new(RateLimiter::new(options.rate_limit)),
            metrics: default_metrics(),
            options,
        }
    }

    /// Creates a client from environment variables.
    ///
    /// See [`ClientOptions::from_env`] for the variables read.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use content_api_client::ApiClient;
    ///
    /// let api = ApiClient::from_env().expect("invalid API_* env vars");
    /// ```
    pub fn from_env() -> std::result::Result<Self, String> {
        ClientOptions::from_env().map(Self::from_options)
    }

    /// Replaces the options. The cache and rate limiter are rebuilt empty.
    pub fn with_options(self, options: ClientOptions) -> Self {
        Self {
            cache: Arc::new(ResponseCache::new(options.cache_ttl)),
            limiter: Arc::new(RateLimiter::new(options.rate_limit)),
            options,
            ..self
        }
    }

    /// Sets the collaborator that receives timing and error events.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Requests still available in the current rate-limit window.
    pub fn rate_limit_remaining(&self) -> usize {
        self.limiter.remaining()
    }

    /// Drops cached responses and returns how many were removed.
    ///
    /// `None` clears the cache; otherwise `pattern` is a regular expression
    /// matched against cache keys of the form `METHOD:URL:BODY`.
    pub fn invalidate_cache(&self, pattern: Option<&str>) -> Result<usize> {
        let pattern = pattern
            .map(Regex::new)
            .transpose()
            .map_err(|err| ClientError::invalid_request(format!("invalid cache pattern: {err}")))?;
        Ok(self.cache.invalidate(pattern.as_ref()))
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>> {
        self.request(Method::GET, endpoint, options).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>> {
        self.request(Method::DELETE, endpoint, options).await
    }

    pub async fn post<T, B>(
        &self,
        endpoint: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request_json(Method::POST, endpoint, body, options).await
    }

    pub async fn put<T, B>(
        &self,
        endpoint: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request_json(Method::PUT, endpoint, body, options).await
    }

    pub async fn patch<T, B>(
        &self,
        endpoint: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request_json(Method::PATCH, endpoint, body, options).await
    }

    /// Issues a request and decodes the JSON response into `T`.
    ///
    /// Cacheable GETs are answered from the cache when possible, without
    /// touching the rate limiter. Otherwise the call must be admitted by the
    /// rate limiter, then runs up to `1 + max_retries` attempts, each bounded
    /// by the timeout. Client errors (4xx) end the call immediately.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>> {
        let started = Instant::now();
        let mut state = CallState::default();

        match self.run(&method, endpoint, options, &mut state).await {
            Ok(response) => {
                report_duration(
                    self.metrics.as_ref(),
                    &format!("api.request:{method} {endpoint}"),
                    started.elapsed(),
                );
                Ok(response)
            }
            Err(err) => Err(self.report_failure(&method, endpoint, err, &state)),
        }
    }

    async fn request_json<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        match options.json(body) {
            Ok(options) => self.request(method, endpoint, options).await,
            Err(err) => Err(self.report_failure(&method, endpoint, err, &CallState::default())),
        }
    }

    async fn run<T: DeserializeOwned>(
        &self,
        method: &Method,
        endpoint: &str,
        options: RequestOptions,
        state: &mut CallState,
    ) -> Result<ApiResponse<T>> {
        let url = resolve_url(&self.options.base_url, endpoint, &options.params)?;
        state.url = Some(url.to_string());

        let body = if *method == Method::GET {
            None
        } else {
            options.body
        };
        let key = cache_key(method, &url, body.as_ref());
        let cache_ttl = options.cache.ttl_for(method, self.cache.default_ttl());

        if cache_ttl.is_some() {
            if let Some(hit) = self.cache.get(&key) {
                #[cfg(feature = "tracing")]
                tracing::debug!(%url, "serving response from cache");

                let data = decode::<T>(&hit)?;
                return Ok(ApiResponse {
                    data,
                    meta: hit.pagination.into_meta(true),
                });
            }
        }

        if !self.limiter.try_acquire() {
            let limit = self.limiter.config();

            #[cfg(feature = "tracing")]
            tracing::debug!(%url, "rate limit exceeded, request rejected");

            return Err(ClientError::rate_limit_exceeded(
                limit.max_requests,
                limit.window,
            ));
        }

        let retry = options.retry.apply(&self.options.retry);
        let timeout = options.timeout.unwrap_or(self.options.timeout);
        let headers = merge_headers(&options.headers);
        let mut attempt = 0u32;

        loop {
            // The admission above already counted the first attempt.
            if attempt > 0 {
                self.limiter.record();
            }
            state.attempts = attempt + 1;

            let attempt_started = Instant::now();
            let outcome = self
                .send_once(method, &url, &headers, body.as_ref(), timeout)
                .await;
            report_duration(
                self.metrics.as_ref(),
                &format!("api.attempt:{method} {endpoint}"),
                attempt_started.elapsed(),
            );

            match outcome {
                Ok(response) => {
                    let data = decode::<T>(&response)?;
                    let meta = response.pagination.into_meta(false);
                    if let Some(ttl) = cache_ttl {
                        self.cache.set(key, response, Some(ttl));
                    }
                    return Ok(ApiResponse { data, meta });
                }
                Err(err) if err.is_retryable() && attempt < retry.max_retries => {
                    let delay = retry.delay_for(attempt);

                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        %url,
                        code = %err.code,
                        attempt,
                        "retrying request after {} ms",
                        delay.as_millis()
                    );

                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Performs a single network exchange bounded by `timeout`.
    ///
    /// The deadline covers sending the request and reading the whole body.
    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<CachedResponse> {
        let mut builder = self
            .http
            .request(method.clone(), url.clone())
            .headers(headers.clone());
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let exchange = async move {
            let response = builder
                .send()
                .await
                .map_err(|err| classify_transport(&err, timeout))?;
            let status = response.status();
            let pagination = Pagination::from_headers(response.headers());
            let text = response
                .text()
                .await
                .map_err(|err| classify_transport(&err, timeout))?;

            if !status.is_success() {
                return Err(ClientError::from_response(status, &text));
            }

            let body = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text)
                    .map_err(|err| ClientError::parse(status.as_u16(), &err))?
            };
            Ok(CachedResponse {
                status: status.as_u16(),
                body,
                pagination,
            })
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::timeout(timeout)),
        }
    }

    fn report_failure(
        &self,
        method: &Method,
        endpoint: &str,
        err: ClientError,
        state: &CallState,
    ) -> ClientError {
        let mut context = Map::new();
        context.insert("method".to_owned(), Value::from(method.as_str()));
        context.insert("endpoint".to_owned(), Value::from(endpoint));
        if let Some(url) = &state.url {
            context.insert("url".to_owned(), Value::from(url.as_str()));
        }
        context.insert("attempts".to_owned(), Value::from(state.attempts));

        #[cfg(feature = "tracing")]
        tracing::warn!(
            %method,
            endpoint,
            attempts = state.attempts,
            "request failed: {err}"
        );

        report_error(self.metrics.as_ref(), &err, &context);
        err
    }
}

fn decode<T: DeserializeOwned>(response: &CachedResponse) -> Result<T> {
    <T as Deserialize<'_>>::deserialize(&response.body)
        .map_err(|err| ClientError::parse(response.status, &err))
}

fn classify_transport(err: &reqwest::Error, timeout: Duration) -> ClientError {
    if err.is_timeout() {
        ClientError::timeout(timeout)
    } else {
        ClientError::network(err)
    }
}

/// `Content-Type: application/json` with caller headers taking precedence.
fn merge_headers(request_headers: &HeaderMap) -> HeaderMap {
    let mut merged = request_headers.clone();
    merged
        .entry(header::CONTENT_TYPE)
        .or_insert(HeaderValue::from_static("application/json"));
    merged
}

#[cfg(feature = "tracing")]
fn default_metrics() -> Arc<dyn MetricsSink> {
    Arc::new(crate::metrics::TracingMetrics)
}

#[cfg(not(feature = "tracing"))]
fn default_metrics() -> Arc<dyn MetricsSink> {
    Arc::new(crate::metrics::NoopMetrics)
}

#[cfg(test)]
mod tests {
    use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};

    use super::{merge_headers, ApiClient};
    use crate::ClientOptions;

    #[test]
    fn caller_headers_override_json_content_type() {
        let mut custom = HeaderMap::new();
        custom.insert(CONTENT_TYPE, HeaderValue::from_static("application/merge-patch+json"));
        custom.insert(ACCEPT, HeaderValue::from_static("application/json"));
        custom.append("x-tag", HeaderValue::from_static("a"));
        custom.append("x-tag", HeaderValue::from_static("b"));

        let merged = merge_headers(&custom);
        assert_eq!(merged[CONTENT_TYPE], "application/merge-patch+json");
        assert_eq!(merged[ACCEPT], "application/json");
        let tags: Vec<&str> = merged
            .get_all("x-tag")
            .iter()
            .map(|value| value.to_str().expect("ascii header"))
            .collect();
        assert_eq!(tags, vec!["a", "b"]);
        assert_eq!(merge_headers(&HeaderMap::new())[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn invalid_invalidation_pattern_is_rejected() {
        let client = ApiClient::new("http://localhost:3000/api");
        let err = client
            .invalidate_cache(Some("(unclosed"))
            .expect_err("pattern must be rejected");
        assert_eq!(err.code, "INVALID_REQUEST");
        assert_eq!(client.invalidate_cache(None), Ok(0));
    }

    #[test]
    fn with_options_resets_limiter_state() {
        let mut options = ClientOptions::default();
        options.rate_limit.max_requests = 2;
        let client = ApiClient::new("http://localhost:3000/api").with_options(options);
        assert_eq!(client.rate_limit_remaining(), 2);
        assert!(format!("{client:?}").contains("rate_limit_remaining"));
    }
}
