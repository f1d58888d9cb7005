//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports plus the ambient
//! plumbing (configuration, metrics, tracing) they rely on.

/// Client configuration and environment loading.
pub mod config;

/// REST adapter for the price service.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// WebSocket price stream.
pub mod stream;

/// Tracing subscriber and OpenTelemetry export.
pub mod telemetry;
