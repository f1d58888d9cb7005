//! Price Stream Infrastructure
//!
//! WebSocket subscription to the price service: frame codec, reconnection
//! policy, and the client that supervises the connection.

mod client;
pub mod codec;
pub mod reconnect;

pub use client::{ConnectionState, PriceStreamClient, PriceStreamConfig};
pub use codec::{CodecError, JsonCodec};
pub use crate::application::ports::StreamError;
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
