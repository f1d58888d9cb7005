//! Configuration Module
//!
//! Client options, defaults and environment loading.

mod settings;

pub use settings::{
    AuthToken, ClientConfig, ClientOptions, ConfigError, DEFAULT_HTTP_API_URL,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_WEBSOCKET_API_URL, WebSocketSettings,
};
