//! Stream Codec
//!
//! JSON encoding and decoding of `WireMessage` frames. The price service
//! sends one JSON object per text frame; binary frames carrying UTF-8 JSON
//! are accepted as well.

use serde::Serialize;

use crate::domain::streaming::WireMessage;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame was not a JSON object.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    /// A binary frame was not valid UTF-8.
    #[error("binary frame is not valid UTF-8")]
    InvalidUtf8,
}

/// JSON codec for the price stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame.
    pub fn decode(&self, text: &str) -> Result<WireMessage, CodecError> {
        let trimmed = text.trim();
        if !trimmed.starts_with('{') {
            let preview: String = trimmed.chars().take(50).collect();
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {preview}"
            )));
        }
        Ok(serde_json::from_str(trimmed)?)
    }

    /// Decode a binary frame holding UTF-8 JSON.
    pub fn decode_binary(&self, data: &[u8]) -> Result<WireMessage, CodecError> {
        let text = std::str::from_utf8(data).map_err(|_| CodecError::InvalidUtf8)?;
        self.decode(text)
    }

    /// Encode a value to a JSON string.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }
}
