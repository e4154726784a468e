//! Observability collaborator the client reports to.
//!
//! The client emits one duration event per network attempt, one more for a
//! successful request as a whole, and one error event per terminal failure.
//! Sinks are called synchronously on the request path and must return
//! quickly; a panicking sink is contained and never reaches the caller.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::ClientError;

/// Receives performance and error events from [`crate::ApiClient`].
pub trait MetricsSink: Send + Sync {
    fn record_duration(&self, _operation: &str, _elapsed: Duration) {}

    fn record_error(&self, _error: &ClientError, _context: &Map<String, Value>) {}
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

/// Forwards events to `tracing`.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingMetrics;

#[cfg(feature = "tracing")]
impl MetricsSink for TracingMetrics {
    fn record_duration(&self, operation: &str, elapsed: Duration) {
        tracing::debug!(
            operation,
            elapsed_ms = elapsed.as_millis() as u64,
            "api request timing"
        );
    }

    fn record_error(&self, error: &ClientError, context: &Map<String, Value>) {
        let context = Value::Object(context.clone());
        tracing::warn!(
            code = %error.code,
            status = error.status,
            context = %context,
            "api request failed: {}",
            error.message
        );
    }
}

pub(crate) fn report_duration(sink: &dyn MetricsSink, operation: &str, elapsed: Duration) {
    let _ = catch_unwind(AssertUnwindSafe(|| sink.record_duration(operation, elapsed)));
}

pub(crate) fn report_error(sink: &dyn MetricsSink, error: &ClientError, context: &Map<String, Value>) {
    let _ = catch_unwind(AssertUnwindSafe(|| sink.record_error(error, context)));
}
