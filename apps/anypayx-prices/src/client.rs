//! Prices Client
//!
//! One object that owns the configuration, the REST adapter, the price
//! stream, and the event bus they report through.
//!
//! ```no_run
//! use anypayx_prices::{ClientOptions, EventKind, PricesClient};
//!
//! # async fn run() -> Result<(), anypayx_prices::RestError> {
//! let client = PricesClient::new(ClientOptions::default().with_token("secret"))?;
//!
//! client.on(EventKind::PriceUpdated, |event| println!("{event:?}"));
//! client.subscribe_to_prices_updates();
//!
//! let prices = client.list_prices().await?;
//! println!("{} prices", prices.len());
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::application::ports::{PriceService, RestError};
use crate::application::services::{ClientEvent, EventBus, EventKind, HandlerId};
use crate::domain::pricing::{Conversion, ConversionRequest, Price, PriceQuery};
use crate::infrastructure::config::{ClientConfig, ClientOptions};
use crate::infrastructure::http::HttpPriceClient;
use crate::infrastructure::stream::{ConnectionState, PriceStreamClient, PriceStreamConfig};

/// Client for the AnyPayX price service.
pub struct PricesClient {
    config: ClientConfig,
    events: Arc<EventBus>,
    stream: PriceStreamClient,
    prices: Arc<dyn PriceService>,
}

impl std::fmt::Debug for PricesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PricesClient")
            .field("config", &self.config)
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

/// Create a client, filling unset options with defaults.
pub fn create_client(options: ClientOptions) -> Result<PricesClient, RestError> {
    PricesClient::new(options)
}

impl PricesClient {
    /// Create a client from caller overrides.
    pub fn new(options: ClientOptions) -> Result<Self, RestError> {
        Self::from_config(ClientConfig::from_options(options))
    }

    /// Create a client from a complete configuration.
    pub fn from_config(config: ClientConfig) -> Result<Self, RestError> {
        let prices = Arc::new(HttpPriceClient::new(&config)?);
        Ok(Self::with_price_service(config, prices))
    }

    /// Create a client backed by a custom `PriceService`.
    #[must_use]
    pub fn with_price_service(config: ClientConfig, prices: Arc<dyn PriceService>) -> Self {
        let events = Arc::new(EventBus::new());
        let stream = PriceStreamClient::new(
            PriceStreamConfig::from_client_config(&config),
            Arc::clone(&events),
        );
        Self {
            config,
            events,
            stream,
            prices,
        }
    }

    /// Effective configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Register a handler. Handlers for one kind run in registration order.
    ///
    /// Streaming failures are reported only through [`EventKind::Error`].
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, handler)
    }

    /// Unregister a handler.
    pub fn off(&self, id: HandlerId) -> bool {
        self.events.off(id)
    }

    // -------------------------------------------------------------------------
    // Streaming
    // -------------------------------------------------------------------------

    /// Open the price stream and keep it open until unsubscribed.
    ///
    /// Must be called within a Tokio runtime.
    pub fn subscribe_to_prices_updates(&self) {
        self.stream.subscribe();
    }

    /// Close the price stream and cancel any pending reconnect.
    pub fn unsubscribe_from_prices_updates(&self) {
        self.stream.unsubscribe();
    }

    /// Unsubscribe and wait until the connection is closed.
    pub async fn close(&self) {
        self.stream.shutdown().await;
    }

    /// Whether the caller currently wants price updates.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.stream.is_subscribed()
    }

    /// Current stream connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.stream.connection_state()
    }

    // -------------------------------------------------------------------------
    // REST
    // -------------------------------------------------------------------------

    /// List all prices.
    pub async fn list_prices(&self) -> Result<Vec<Price>, RestError> {
        self.prices.list_prices().await
    }

    /// Fetch the price of one pair, optionally from one source.
    pub async fn get_price(&self, query: &PriceQuery) -> Result<Price, RestError> {
        self.prices.get_price(query).await
    }

    /// Convert an amount between currencies. `value` must be positive.
    pub async fn convert_price(
        &self,
        request: &ConversionRequest,
    ) -> Result<Conversion, RestError> {
        request.validate()?;
        self.prices.convert_price(request).await
    }
}
