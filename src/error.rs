use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};

/// Well-known machine-readable error codes produced by the client itself.
///
/// Codes reported by the backend in an error body are carried through
/// verbatim and need not match any of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Local sliding window is full; no network attempt was made.
    RateLimitExceeded,
    /// Non-2xx response without a backend-supplied code.
    ApiError,
    /// An attempt did not complete before its deadline.
    Timeout,
    /// Transport failure (connect, DNS, reset, body read).
    NetworkError,
    /// Fallback classification.
    UnknownError,
    /// The request could not be built (bad URL, body, header or pattern).
    InvalidRequest,
    /// A successful (or cached) body could not be decoded.
    ParseError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::ApiError => "API_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::NetworkError => "NETWORK_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::ParseError => "PARSE_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type returned by this crate.
///
/// Every failure the client can produce is flattened into this shape: a
/// code, a human message, an HTTP-like status (`0` when no response was
/// received) and optional structured details from the backend.
#[derive(Clone, Debug, PartialEq, Serialize, thiserror::Error)]
#[error("{code} ({status}): {message}")]
pub struct ClientError {
    pub code: String,
    pub message: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    #[serde(skip)]
    retryable: bool,
}

/// Error body shape the backend is expected to return on non-2xx responses.
#[derive(Debug, Default)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<Map<String, Value>>,
}

impl ErrorBody {
    /// Picks each field independently so one malformed field does not
    /// discard the others.
    fn parse(body: &str) -> Self {
        let Ok(Value::Object(mut fields)) = serde_json::from_str::<Value>(body) else {
            return Self::default();
        };
        let code = match fields.remove("code") {
            Some(Value::String(code)) => Some(code),
            Some(Value::Number(code)) => Some(code.to_string()),
            _ => None,
        };
        let message = match fields.remove("message") {
            Some(Value::String(message)) => Some(message),
            _ => None,
        };
        let details = match fields.remove("details") {
            Some(Value::Object(details)) => Some(details),
            _ => None,
        };
        Self {
            code,
            message,
            details,
        }
    }
}

impl ClientError {
    /// Creates a terminal (non-retryable) error.
    pub fn new(code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = Some(details);
        self
    }

    pub(crate) fn rate_limit_exceeded(max_requests: usize, window: Duration) -> Self {
        Self::new(
            ErrorCode::RateLimitExceeded.as_str(),
            format!(
                "rate limit exceeded: {max_requests} requests per {} ms",
                window.as_millis()
            ),
            429,
        )
    }

    pub(crate) fn timeout(after: Duration) -> Self {
        Self {
            retryable: true,
            ..Self::new(
                ErrorCode::Timeout.as_str(),
                format!("request timed out after {} ms", after.as_millis()),
                408,
            )
        }
    }

    pub(crate) fn network(err: &reqwest::Error) -> Self {
        Self {
            retryable: true,
            ..Self::new(ErrorCode::NetworkError.as_str(), format!("network error: {err}"), 0)
        }
    }

    pub(crate) fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest.as_str(), message, 0)
    }

    pub(crate) fn parse(status: u16, err: &serde_json::Error) -> Self {
        Self::new(
            ErrorCode::ParseError.as_str(),
            format!("invalid response JSON: {err}"),
            status,
        )
    }

    /// Classifies a non-2xx response.
    ///
    /// `code`, `message` and `details` are taken from a JSON error body when
    /// present; missing fields fall back to `API_ERROR` and the status line.
    /// Client errors (4xx) are terminal, everything else may be retried.
    pub(crate) fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed = ErrorBody::parse(body);
        let code = parsed
            .code
            .filter(|code| !code.is_empty())
            .unwrap_or_else(|| ErrorCode::ApiError.as_str().to_owned());
        let message = parsed
            .message
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| status.to_string());

        Self {
            code,
            message,
            status: status.as_u16(),
            details: parsed.details,
            retryable: !status.is_client_error(),
        }
    }

    /// Returns whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Returns whether this error carries the given well-known code.
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code.as_str()
    }
}

impl Default for ClientError {
    fn default() -> Self {
        Self::new(
            ErrorCode::UnknownError.as_str(),
            "an unknown error occurred",
            500,
        )
    }
}
