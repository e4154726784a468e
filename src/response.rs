use std::time::SystemTime;

use reqwest::header::HeaderMap;
use serde_json::Value;

/// Response headers carrying pagination metadata.
const TOTAL_COUNT_HEADER: &str = "x-total-count";
const PAGE_HEADER: &str = "x-page";
const PAGE_SIZE_HEADER: &str = "x-page-size";

/// A decoded payload with delivery metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse<T> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseMeta {
    /// `true` when served from the cache without a network call.
    pub cached: bool,
    /// When this response was produced for the caller.
    pub timestamp: SystemTime,
    pub total: Option<u64>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl<T> ApiResponse<T> {
    /// Transforms the payload, keeping the metadata.
    pub fn map<U, F>(self, f: F) -> ApiResponse<U>
    where
        F: FnOnce(T) -> U,
    {
        ApiResponse {
            data: f(self.data),
            meta: self.meta,
        }
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Pagination {
    pub total: Option<u64>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl Pagination {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        let number = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
        };
        Self {
            total: number(TOTAL_COUNT_HEADER),
            page: number(PAGE_HEADER),
            page_size: number(PAGE_SIZE_HEADER),
        }
    }

    pub(crate) fn into_meta(self, cached: bool) -> ResponseMeta {
        ResponseMeta {
            cached,
            timestamp: SystemTime::now(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// What the client keeps in its cache: the raw body, decoded per caller.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CachedResponse {
    pub status: u16,
    pub body: Value,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use reqwest::header::{HeaderMap, HeaderValue};

    use super::Pagination;

    #[test]
    fn pagination_reads_known_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Total-Count", HeaderValue::from_static("42"));
        headers.insert("X-Page", HeaderValue::from_static("2"));
        headers.insert("X-Page-Size", HeaderValue::from_static("not-a-number"));

        let pagination = Pagination::from_headers(&headers);
        assert_eq!(pagination.total, Some(42));
        assert_eq!(pagination.page, Some(2));
        assert_eq!(pagination.page_size, None);

        let meta = pagination.into_meta(true);
        assert!(meta.cached);
        assert_eq!(meta.total, Some(42));
    }
}
