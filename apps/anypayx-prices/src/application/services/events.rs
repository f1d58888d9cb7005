//! Client Events
//!
//! Notifications delivered to application code. Streaming failures are only
//! ever reported here; a caller that does not listen for
//! [`EventKind::Error`] will not see them.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::application::ports::StreamError;
use crate::domain::streaming::{PriceUpdate, WireMessage};

/// Named event types a handler can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A `price/updated` frame was received and decoded.
    PriceUpdated,
    /// The streaming connection opened.
    Open,
    /// A streaming connection attempt ended.
    Close,
    /// Any frame that decoded as a wire message.
    Message,
    /// Transport or decode failure on the streaming channel.
    Error,
}

impl EventKind {
    /// Every event kind.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::PriceUpdated,
            Self::Open,
            Self::Close,
            Self::Message,
            Self::Error,
        ]
    }

    /// Wire-compatible event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PriceUpdated => "price/updated",
            Self::Open => "websocket.open",
            Self::Close => "websocket.close",
            Self::Message => "websocket.message",
            Self::Error => "websocket.error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown event name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event name: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// An event emitted by the client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Decoded price update.
    PriceUpdated(PriceUpdate),
    /// Connection opened.
    Open,
    /// Connection attempt ended.
    Close,
    /// Raw decoded frame, emitted before topic dispatch.
    Message(WireMessage),
    /// Streaming failure.
    Error(Arc<StreamError>),
}

impl ClientEvent {
    /// The kind used to route this event to handlers.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::PriceUpdated(_) => EventKind::PriceUpdated,
            Self::Open => EventKind::Open,
            Self::Close => EventKind::Close,
            Self::Message(_) => EventKind::Message,
            Self::Error(_) => EventKind::Error,
        }
    }

    /// Wrap a stream error.
    #[must_use]
    pub fn error(error: StreamError) -> Self {
        Self::Error(Arc::new(error))
    }
}
