use std::sync::{Mutex, MutexGuard};

use reqwest::{Method, Url};
use serde_json::Value;

use crate::ClientError;

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Joins `endpoint` onto `base_url` and appends query parameters in order.
///
/// Example: `("http://h/api/", "/articles", [("page", "2")])` →
/// `"http://h/api/articles?page=2"`
pub(crate) fn resolve_url(
    base_url: &str,
    endpoint: &str,
    params: &[(String, String)],
) -> Result<Url, ClientError> {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    let joined = if endpoint.is_empty() {
        base.to_owned()
    } else {
        format!("{base}/{endpoint}")
    };

    let mut url = Url::parse(&joined)
        .map_err(|err| ClientError::invalid_request(format!("invalid url '{joined}': {err}")))?;
    if !params.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(key, value)| (key.as_str(), value.as_str())));
    }
    Ok(url)
}

/// Derives the cache key for a request shape.
///
/// Identical method, URL (query included) and body always yield the same key.
pub(crate) fn cache_key(method: &Method, url: &Url, body: Option<&Value>) -> String {
    match body {
        Some(body) => format!("{method}:{url}:{body}"),
        None => format!("{method}:{url}:"),
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use serde_json::json;

    use super::{cache_key, resolve_url};

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn resolve_joins_slashes_once() {
        let url = resolve_url("http://localhost:3000/api/", "/articles", &[]).expect("must resolve");
        assert_eq!(url.as_str(), "http://localhost:3000/api/articles");
    }

    #[test]
    fn resolve_appends_and_encodes_params() {
        let url = resolve_url(
            "http://localhost:3000/api",
            "search",
            &params(&[("q", "rust & tokio"), ("page", "2")]),
        )
        .expect("must resolve");
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/api/search?q=rust+%26+tokio&page=2"
        );
    }

    #[test]
    fn resolve_rejects_relative_base() {
        let err = resolve_url("/api", "articles", &[]).expect_err("relative base must fail");
        assert_eq!(err.code, "INVALID_REQUEST");
    }

    #[test]
    fn cache_key_is_deterministic_and_shape_sensitive() {
        let url = resolve_url("http://h/api", "a", &params(&[("x", "1")])).expect("must resolve");
        let other = resolve_url("http://h/api", "a", &params(&[("x", "2")])).expect("must resolve");
        let body = json!({ "title": "t" });

        assert_eq!(
            cache_key(&Method::GET, &url, None),
            cache_key(&Method::GET, &url, None)
        );
        assert_ne!(
            cache_key(&Method::GET, &url, None),
            cache_key(&Method::GET, &other, None)
        );
        assert_ne!(
            cache_key(&Method::GET, &url, None),
            cache_key(&Method::POST, &url, None)
        );
        assert_ne!(
            cache_key(&Method::POST, &url, None),
            cache_key(&Method::POST, &url, Some(&body))
        );
    }
}
