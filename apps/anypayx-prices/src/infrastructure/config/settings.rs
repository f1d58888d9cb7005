//! Client Configuration Settings
//!
//! `ClientOptions` carries caller overrides; `ClientConfig` is the immutable,
//! fully-defaulted configuration shared by the REST adapter and the streaming
//! subscription manager.

use std::time::Duration;

/// Default REST API base URL.
pub const DEFAULT_HTTP_API_URL: &str = "https://prices.anypayx.com";

/// Default WebSocket base URL.
pub const DEFAULT_WEBSOCKET_API_URL: &str = "wss://prices.anypayx.com";

/// Default REST request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bearer token for the price service.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the raw token.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

/// WebSocket connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WebSocketSettings {
    /// Maximum time allowed for the connect handshake.
    pub connect_timeout: Duration,
    /// Delay before the first reconnection attempt.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier (1.0 = fixed delay).
    pub reconnect_delay_multiplier: f64,
    /// Jitter as a fraction of the delay (0.0 = none).
    pub reconnect_jitter: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            reconnect_delay_initial: Duration::from_millis(1000),
            reconnect_delay_max: Duration::from_millis(1000),
            reconnect_delay_multiplier: 1.0,
            reconnect_jitter: 0.0,
            max_reconnect_attempts: 0, // Unlimited
        }
    }
}

impl WebSocketSettings {
    /// Fixed-delay reconnection with the given delay.
    #[must_use]
    pub fn with_fixed_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_initial = delay;
        self.reconnect_delay_max = delay;
        self.reconnect_delay_multiplier = 1.0;
        self
    }
}

/// Caller overrides. Unset fields fall back to defaults independently.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// REST API base URL.
    pub http_api_url: Option<String>,
    /// WebSocket base URL.
    pub websocket_api_url: Option<String>,
    /// Bearer token.
    pub token: Option<String>,
    /// REST request timeout.
    pub request_timeout: Option<Duration>,
    /// WebSocket settings.
    pub websocket: Option<WebSocketSettings>,
}

impl ClientOptions {
    /// Override the REST API base URL.
    #[must_use]
    pub fn with_http_api_url(mut self, url: impl Into<String>) -> Self {
        self.http_api_url = Some(url.into());
        self
    }

    /// Override the WebSocket base URL.
    #[must_use]
    pub fn with_websocket_api_url(mut self, url: impl Into<String>) -> Self {
        self.websocket_api_url = Some(url.into());
        self
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Override the REST request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Override the WebSocket settings.
    #[must_use]
    pub fn with_websocket_settings(mut self, settings: WebSocketSettings) -> Self {
        self.websocket = Some(settings);
        self
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// REST API base URL.
    pub http_api_url: String,
    /// WebSocket base URL.
    pub websocket_api_url: String,
    /// Bearer token, if any. Without one no `Authorization` header is sent.
    pub token: Option<AuthToken>,
    /// REST request timeout.
    pub request_timeout: Duration,
    /// WebSocket settings.
    pub websocket: WebSocketSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_options(ClientOptions::default())
    }
}

impl ClientConfig {
    /// Apply defaults to caller overrides.
    ///
    /// Blank strings count as unset and values are trimmed. URLs are not
    /// validated here.
    #[must_use]
    pub fn from_options(options: ClientOptions) -> Self {
        Self {
            http_api_url: non_empty(options.http_api_url)
                .unwrap_or_else(|| DEFAULT_HTTP_API_URL.to_string()),
            websocket_api_url: non_empty(options.websocket_api_url)
                .unwrap_or_else(|| DEFAULT_WEBSOCKET_API_URL.to_string()),
            token: non_empty(options.token).map(AuthToken::new),
            request_timeout: options.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            websocket: options.websocket.unwrap_or_default(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `ANYPAYX_TOKEN` is present but blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `ANYPAYX_TOKEN` is present but blank.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("ANYPAYX_TOKEN");
        if token.as_deref().map(str::trim) == Some("") {
            return Err(ConfigError::EmptyValue("ANYPAYX_TOKEN".to_string()));
        }

        let defaults = WebSocketSettings::default();
        let websocket = WebSocketSettings {
            connect_timeout: parse_duration_secs(
                &lookup,
                "ANYPAYX_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout,
            ),
            reconnect_delay_initial: parse_duration_millis(
                &lookup,
                "ANYPAYX_RECONNECT_DELAY_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_duration_millis(
                &lookup,
                "ANYPAYX_RECONNECT_DELAY_MAX_MS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_factor(
                &lookup,
                "ANYPAYX_RECONNECT_DELAY_MULTIPLIER",
                defaults.reconnect_delay_multiplier,
            ),
            reconnect_jitter: parse_factor(
                &lookup,
                "ANYPAYX_RECONNECT_JITTER",
                defaults.reconnect_jitter,
            ),
            max_reconnect_attempts: parse_or(
                &lookup,
                "ANYPAYX_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
        };

        let options = ClientOptions {
            http_api_url: lookup("ANYPAYX_HTTP_API_URL"),
            websocket_api_url: lookup("ANYPAYX_WEBSOCKET_API_URL"),
            token,
            request_timeout: Some(parse_duration_secs(
                &lookup,
                "ANYPAYX_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT,
            )),
            websocket: Some(websocket),
        };

        Ok(Self::from_options(options))
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Finite, non-negative float or the default.
fn parse_factor<F>(lookup: &F, key: &str, default: f64) -> f64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(default)
}

fn parse_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
