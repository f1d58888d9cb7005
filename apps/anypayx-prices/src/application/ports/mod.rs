//! Port Interfaces
//!
//! Contracts that infrastructure adapters implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `PriceService`: Request/response operations of the price service REST API
//! - `StreamError`: Failures the streaming adapter reports as events

use std::time::Duration;

use async_trait::async_trait;

use crate::application::services::EventKind;
use crate::domain::pricing::{Conversion, ConversionRequest, InvalidConversion, Price, PriceQuery};

/// Adapter-specific error carried as a source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from a REST operation. Always returned to the caller, never retried.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// Transport failure before a response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// Response status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured base URL could not be turned into an endpoint.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The request was rejected before it was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<InvalidConversion> for RestError {
    fn from(err: InvalidConversion) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

/// Request/response operations against the price service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceService: Send + Sync {
    /// `GET /api/prices`.
    async fn list_prices(&self) -> Result<Vec<Price>, RestError>;

    /// `GET /api/prices/{base}/{quote}/{source}`.
    async fn get_price(&self, query: &PriceQuery) -> Result<Price, RestError>;

    /// `POST /api/conversions` with the request as JSON body.
    async fn convert_price(&self, request: &ConversionRequest) -> Result<Conversion, RestError>;
}

/// Errors on the streaming channel. Delivered only as `websocket.error` events.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Transport failure (handshake, I/O, protocol).
    #[error("WebSocket error: {0}")]
    WebSocket(#[source] BoxError),

    /// The connect handshake did not finish in time.
    #[error("connect handshake timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The token cannot be sent as a header value.
    #[error("invalid Authorization header: {0}")]
    InvalidHeader(String),

    /// An inbound frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[source] BoxError),

    /// An outbound frame could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[source] BoxError),

    /// A frame decoded but its payload did not match the topic schema.
    #[error("invalid {topic} payload: {source}")]
    Payload {
        /// Topic of the offending frame.
        topic: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Reconnection attempts are exhausted.
    #[error("maximum reconnection attempts ({0}) exceeded")]
    MaxReconnectAttemptsExceeded(u32),

    /// An event handler panicked. The remaining handlers still ran.
    #[error("{event} handler panicked: {message}")]
    HandlerPanicked {
        /// Kind of the event being delivered.
        event: EventKind,
        /// Panic payload, if it was a string.
        message: String,
    },
}

impl StreamError {
    /// Whether this error came from decoding a single frame.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Payload { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn stream_error_keeps_boxed_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = StreamError::WebSocket(Box::new(io));

        assert_eq!(err.to_string(), "WebSocket error: reset by peer");
        let source = err.source().unwrap();
        assert!(source.downcast_ref::<std::io::Error>().is_some());
        assert!(!err.is_decode());
    }

    #[test]
    fn handler_panic_names_the_event() {
        let err = StreamError::HandlerPanicked {
            event: EventKind::PriceUpdated,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "price/updated handler panicked: boom");
    }
}
