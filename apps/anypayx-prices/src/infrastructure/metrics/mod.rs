//! Client Metrics
//!
//! Instrumentation recorded through the `metrics` facade. Without an
//! installed recorder every call is a no-op, so library users pay nothing
//! unless they opt in.
//!
//! # Metrics
//!
//! - `anypayx_prices_frames_received_total{topic}`
//! - `anypayx_prices_decode_errors_total`
//! - `anypayx_prices_reconnects_total`
//! - `anypayx_prices_stream_connections`
//! - `anypayx_prices_rest_requests_total{operation, outcome}`
//! - `anypayx_prices_rest_request_seconds{operation}`

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Install a Prometheus exporter listening on `addr`.
///
/// Subsequent calls are no-ops. Must be called from within a Tokio runtime.
pub fn init_prometheus(addr: SocketAddr) -> Result<(), BuildError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    let _ = INSTALLED.set(());
    register_metrics();
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

fn register_metrics() {
    describe_counter!(
        "anypayx_prices_frames_received_total",
        "Frames decoded from the price stream, by topic"
    );
    describe_counter!(
        "anypayx_prices_decode_errors_total",
        "Inbound frames that failed to decode"
    );
    describe_counter!(
        "anypayx_prices_reconnects_total",
        "Scheduled price stream reconnection attempts"
    );
    describe_gauge!(
        "anypayx_prices_stream_connections",
        "Open price stream connections (0 or 1 per client)"
    );
    describe_counter!(
        "anypayx_prices_rest_requests_total",
        "REST requests by operation and outcome"
    );
    describe_histogram!(
        "anypayx_prices_rest_request_seconds",
        "REST request latency"
    );
}

/// REST operation labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestOperation {
    /// `GET /api/prices`.
    ListPrices,
    /// `GET /api/prices/{base}/{quote}/{source}`.
    GetPrice,
    /// `POST /api/conversions`.
    ConvertPrice,
}

impl RestOperation {
    /// Metric label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListPrices => "list_prices",
            Self::GetPrice => "get_price",
            Self::ConvertPrice => "convert_price",
        }
    }
}

/// Record a decoded frame.
pub fn record_frame_received(topic: &str) {
    counter!(
        "anypayx_prices_frames_received_total",
        "topic" => topic.to_string()
    )
    .increment(1);
}

/// Record a frame that failed to decode.
pub fn record_decode_error() {
    counter!("anypayx_prices_decode_errors_total").increment(1);
}

/// Record a scheduled reconnection attempt.
pub fn record_reconnect() {
    counter!("anypayx_prices_reconnects_total").increment(1);
}

/// Mark the stream connection open (`true`) or closed (`false`).
pub fn set_stream_connected(connected: bool) {
    gauge!("anypayx_prices_stream_connections").set(if connected { 1.0 } else { 0.0 });
}

/// Record a completed REST request.
pub fn record_rest_request(operation: RestOperation, success: bool, elapsed: Duration) {
    counter!(
        "anypayx_prices_rest_requests_total",
        "operation" => operation.as_str(),
        "outcome" => if success { "ok" } else { "error" }
    )
    .increment(1);
    histogram!(
        "anypayx_prices_rest_request_seconds",
        "operation" => operation.as_str()
    )
    .record(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_labels() {
        assert_eq!(RestOperation::ListPrices.as_str(), "list_prices");
        assert_eq!(RestOperation::GetPrice.as_str(), "get_price");
        assert_eq!(RestOperation::ConvertPrice.as_str(), "convert_price");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_frame_received("price/updated");
        record_decode_error();
        record_reconnect();
        set_stream_connected(true);
        record_rest_request(RestOperation::ListPrices, true, Duration::from_millis(3));
    }
}
