#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! AnyPayX Prices - Price Quotation Client
//!
//! Client library for the AnyPayX price service. It keeps a single
//! reconnecting WebSocket subscription to price updates and wraps the REST
//! API for listing prices, fetching one price, and converting amounts.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Data types with no I/O
//!   - `pricing`: Prices, conversions, conversion requests
//!   - `streaming`: Wire envelope and price update payload
//!
//! - **Application**: Ports and in-process services
//!   - `ports`: `PriceService` (REST operations), `RestError`, `StreamError`
//!   - `services`: Client events and the event bus
//!
//! - **Infrastructure**: Adapters and ambient plumbing
//!   - `config`: Options, defaults, environment loading
//!   - `http`: `reqwest` adapter for `PriceService`
//!   - `stream`: WebSocket subscription with reconnection
//!   - `metrics`, `telemetry`: Prometheus and tracing setup
//!
//! # Data Flow
//!
//! ```text
//!                         ┌──────────────┐   events   ┌──────────┐
//! price service WS ──────►│ PriceStream  │───────────►│ EventBus │──► handlers
//!                         └──────────────┘            └──────────┘
//! price service REST ◄───── HttpPriceClient ◄──────── PricesClient ◄── caller
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Data types with no I/O.
pub mod domain;

/// Application layer - Ports and in-process services.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Client facade.
pub mod client;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{PricesClient, create_client};

// Domain types
pub use domain::pricing::{
    Conversion, ConversionAmount, ConversionRequest, CurrencyCode, InvalidConversion, Price,
    PriceQuery,
};
pub use domain::streaming::{PriceUpdate, WireMessage};

// Ports and events
pub use application::ports::{PriceService, RestError, StreamError};
pub use application::services::{ClientEvent, EventBus, EventKind, HandlerId};

// Infrastructure config
pub use infrastructure::config::{
    AuthToken, ClientConfig, ClientOptions, ConfigError, WebSocketSettings,
};

// Adapters
pub use infrastructure::http::HttpPriceClient;
pub use infrastructure::stream::{
    ConnectionState, PriceStreamClient, PriceStreamConfig, ReconnectConfig,
};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
