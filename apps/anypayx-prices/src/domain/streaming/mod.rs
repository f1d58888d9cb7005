//! Streaming Wire Types
//!
//! The `{topic, payload}` envelope exchanged on the price service WebSocket,
//! plus the typed payloads for the topics this client understands.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::pricing::Price;

/// Topic names used on the streaming channel.
pub mod topics {
    /// Outbound subscription request.
    pub const SUBSCRIBE: &str = "subscribe";
    /// Inbound price notification.
    pub const PRICE_UPDATED: &str = "price/updated";
}

/// Transport envelope; `topic` decides how `payload` is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Message discriminator.
    pub topic: String,
    /// Topic-specific body.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl WireMessage {
    /// Build a message from a serializable payload.
    pub fn new<T: Serialize>(topic: impl Into<String>, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            topic: topic.into(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// The subscription request sent right after the connection opens.
    #[must_use]
    pub fn subscribe(topics: &[&str]) -> Self {
        let wanted: Vec<String> = topics.iter().map(ToString::to_string).collect();
        Self {
            topic: topics::SUBSCRIBE.to_string(),
            payload: serde_json::json!({ "topics": wanted }),
        }
    }

    /// Check the topic.
    #[must_use]
    pub fn is(&self, topic: &str) -> bool {
        self.topic == topic
    }

    /// Decode the payload into a typed body.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.payload)
    }
}

/// Payload of a `subscribe` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribePayload {
    /// Topics to receive.
    pub topics: Vec<String>,
}

/// Payload of a `price/updated` message.
///
/// All five fields are required; `updated_at` is an RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    /// Base currency.
    pub base: String,
    /// Quote currency.
    pub quote: String,
    /// New rate.
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    /// Where the rate came from.
    pub source: String,
    /// When the service observed the rate.
    pub updated_at: DateTime<Utc>,
}

impl PriceUpdate {
    /// The rate as a plain price snapshot.
    #[must_use]
    pub fn price(&self) -> Price {
        Price::new(self.base.clone(), self.quote.clone(), self.value)
    }
}

impl From<PriceUpdate> for Price {
    fn from(update: PriceUpdate) -> Self {
        Self {
            base: update.base,
            quote: update.quote,
            value: update.value,
        }
    }
}
