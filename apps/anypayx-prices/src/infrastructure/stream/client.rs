//! Price Stream Client
//!
//! Owns the single WebSocket connection to the price service and keeps it
//! alive while the caller wants price updates.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──subscribe──► Connecting ──► Open ──► Closed ──(still wanted)──► Reconnecting ──► Connecting
//!   ▲                                                                                        │
//!   └──────────────────────────────── unsubscribe (cancels any stage) ◄──────────────────────┘
//! ```
//!
//! Each subscription runs as one supervisor task. Unsubscribing cancels its
//! token, which closes the open socket, aborts an in-flight handshake, or
//! drops a pending reconnect timer, so no connection is opened afterwards.
//!
//! # Protocol
//!
//! After the socket opens the client sends
//! `{"topic":"subscribe","payload":{"topics":["price/updated"]}}`. Every
//! inbound frame is decoded as a `WireMessage` and emitted as
//! `websocket.message`; `price/updated` frames are additionally emitted as
//! `price/updated` events. Other topics are ignored.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::codec::{CodecError, JsonCodec};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::StreamError;
use crate::application::services::{ClientEvent, EventBus};
use crate::domain::streaming::{PriceUpdate, WireMessage, topics};
use crate::infrastructure::config::{AuthToken, ClientConfig};
use crate::infrastructure::metrics;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

// =============================================================================
// Error Conversions
// =============================================================================

impl From<tungstenite::Error> for StreamError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

impl From<CodecError> for StreamError {
    fn from(err: CodecError) -> Self {
        Self::Decode(Box::new(err))
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Observable state of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not subscribed.
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Connected and subscribed.
    Open,
    /// A connection attempt just ended.
    Closed,
    /// Waiting to reconnect.
    Reconnecting {
        /// Attempt number since the last successful open.
        attempt: u32,
    },
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the price stream client.
#[derive(Debug, Clone)]
pub struct PriceStreamConfig {
    /// WebSocket URL.
    pub url: String,
    /// Bearer token; no `Authorization` header is sent without one.
    pub token: Option<AuthToken>,
    /// Handshake timeout.
    pub connect_timeout: Duration,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
    /// Topics requested in the subscribe frame.
    pub topics: Vec<String>,
}

impl PriceStreamConfig {
    /// Create a configuration with default timeouts and reconnection.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_client_config(&ClientConfig::default()).with_url(url)
    }

    /// Derive the stream configuration from the client configuration.
    #[must_use]
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            url: config.websocket_api_url.clone(),
            token: config.token.clone(),
            connect_timeout: config.websocket.connect_timeout,
            reconnect: ReconnectConfig::from_websocket_settings(&config.websocket),
            topics: vec![topics::PRICE_UPDATED.to_string()],
        }
    }

    /// Replace the URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn connect_request(&self) -> Result<Request, StreamError> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&token.bearer())
                .map_err(|e| StreamError::InvalidHeader(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(request)
    }

    fn subscribe_message(&self) -> WireMessage {
        let wanted: Vec<&str> = self.topics.iter().map(String::as_str).collect();
        WireMessage::subscribe(&wanted)
    }
}

// =============================================================================
// Price Stream Client
// =============================================================================

struct Session {
    cancel: CancellationToken,
    state: Arc<RwLock<ConnectionState>>,
    task: JoinHandle<()>,
}

impl Session {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }
}

#[derive(Default)]
struct SubscriptionIntent {
    desired: bool,
    session: Option<Session>,
}

/// Reconnecting subscription to price updates.
///
/// At most one connection exists per instance. Calling
/// [`subscribe`](Self::subscribe) while a session is live is a no-op. A new
/// session started after [`unsubscribe`](Self::unsubscribe) waits for the
/// previous one to finish, so its `websocket.close` is delivered before the
/// new session connects.
pub struct PriceStreamClient {
    config: PriceStreamConfig,
    events: Arc<EventBus>,
    intent: Mutex<SubscriptionIntent>,
}

impl std::fmt::Debug for PriceStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceStreamClient")
            .field("url", &self.config.url)
            .field("subscribed", &self.is_subscribed())
            .field("state", &self.connection_state())
            .finish_non_exhaustive()
    }
}

impl PriceStreamClient {
    /// Create a client that reports through `events`.
    #[must_use]
    pub fn new(config: PriceStreamConfig, events: Arc<EventBus>) -> Self {
        Self {
            config,
            events,
            intent: Mutex::new(SubscriptionIntent::default()),
        }
    }

    /// Start receiving price updates.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn subscribe(&self) {
        let mut intent = self.intent.lock();
        intent.desired = true;

        if intent.session.as_ref().is_some_and(Session::is_live) {
            tracing::debug!("Price stream already subscribed");
            return;
        }

        let previous = intent.session.take().map(|session| {
            session.cancel.cancel();
            session.task
        });

        let cancel = CancellationToken::new();
        let state = Arc::new(RwLock::new(ConnectionState::Connecting));
        let worker = StreamWorker {
            config: self.config.clone(),
            codec: JsonCodec::new(),
            events: Arc::clone(&self.events),
            state: Arc::clone(&state),
            cancel: cancel.clone(),
            previous,
        };

        let task = tokio::spawn(worker.run());
        intent.session = Some(Session {
            cancel,
            state,
            task,
        });
    }

    /// Stop receiving price updates and close the connection.
    ///
    /// Cancels a pending reconnect. Returns immediately; the close handshake
    /// finishes in the background (see [`shutdown`](Self::shutdown)).
    pub fn unsubscribe(&self) {
        let mut intent = self.intent.lock();
        intent.desired = false;
        if let Some(session) = &intent.session {
            session.cancel.cancel();
        }
    }

    /// Unsubscribe and wait for the connection to close.
    pub async fn shutdown(&self) {
        let session = {
            let mut intent = self.intent.lock();
            intent.desired = false;
            intent.session.take()
        };

        if let Some(session) = session {
            session.cancel.cancel();
            if let Err(e) = session.task.await {
                tracing::warn!(error = %e, "Price stream task ended abnormally");
            }
        }
    }

    /// The caller's latest intent.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.intent.lock().desired
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.intent
            .lock()
            .session
            .as_ref()
            .map_or(ConnectionState::Idle, |session| *session.state.read())
    }

    /// Stream configuration.
    #[must_use]
    pub const fn config(&self) -> &PriceStreamConfig {
        &self.config
    }
}

impl Drop for PriceStreamClient {
    fn drop(&mut self) {
        if let Some(session) = &self.intent.get_mut().session {
            session.cancel.cancel();
        }
    }
}

// =============================================================================
// Supervisor Task
// =============================================================================

struct StreamWorker {
    config: PriceStreamConfig,
    codec: JsonCodec,
    events: Arc<EventBus>,
    state: Arc<RwLock<ConnectionState>>,
    cancel: CancellationToken,
    /// Session being replaced; awaited before the first connect.
    previous: Option<JoinHandle<()>>,
}

impl StreamWorker {
    async fn run(mut self) {
        if let Some(previous) = self.previous.take() {
            tracing::debug!("Waiting for previous price stream session to close");
            if let Err(e) = previous.await {
                tracing::warn!(error = %e, "Previous price stream task ended abnormally");
            }
        }

        let mut reconnect_policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            let result = self.connect_and_run(&mut reconnect_policy).await;
            metrics::set_stream_connected(false);

            if let Err(e) = result {
                tracing::warn!(error = %e, "Price stream connection error");
                self.events.emit(&ClientEvent::error(e));
            }

            self.set_state(ConnectionState::Closed);
            self.events.emit(&ClientEvent::Close);

            if self.cancel.is_cancelled() {
                tracing::info!("Price stream unsubscribed");
                break;
            }

            let Some(delay) = reconnect_policy.next_delay() else {
                let attempts = reconnect_policy.attempt_count();
                tracing::error!(attempts, "Giving up on price stream");
                self.events.emit(&ClientEvent::error(
                    StreamError::MaxReconnectAttemptsExceeded(attempts),
                ));
                break;
            };

            let attempt = reconnect_policy.attempt_count();
            tracing::info!(
                attempt,
                delay_ms = delay.as_millis(),
                "Reconnecting to price stream"
            );
            metrics::record_reconnect();
            self.set_state(ConnectionState::Reconnecting { attempt });

            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Price stream unsubscribed during reconnect delay");
                    break;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Idle);
    }

    /// Connect, subscribe, and pump frames until the connection ends.
    ///
    /// `Ok(())` means the connection closed cleanly or was cancelled.
    async fn connect_and_run(
        &self,
        reconnect_policy: &mut ReconnectPolicy,
    ) -> Result<(), StreamError> {
        let request = self.config.connect_request()?;
        tracing::info!(url = %self.config.url, "Connecting to price stream");

        let timeout = self.config.connect_timeout;
        let handshake = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request));

        let (ws_stream, _response) = tokio::select! {
            () = self.cancel.cancelled() => return Ok(()),
            result = handshake => result.map_err(|_| StreamError::ConnectTimeout(timeout))??,
        };

        reconnect_policy.reset();
        let (mut write, mut read) = ws_stream.split();

        self.set_state(ConnectionState::Open);
        metrics::set_stream_connected(true);
        tracing::info!("Price stream open");
        self.events.emit(&ClientEvent::Open);

        self.send_subscribe(&mut write).await?;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("Closing price stream");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        tracing::debug!(error = %e, "Close frame not delivered");
                    }
                    return Ok(());
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_frame(self.codec.decode(&text));
                        }
                        Some(Ok(Message::Binary(data))) => {
                            self.handle_frame(self.codec.decode_binary(&data));
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "Server sent close frame");
                            return Ok(());
                        }
                        Some(Ok(_)) => {
                            // Pong and raw frames
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            tracing::info!("Price stream ended");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    async fn send_subscribe(&self, write: &mut WsSink) -> Result<(), StreamError> {
        let message = self.config.subscribe_message();
        let json = self.codec.encode(&message).map_err(|e| StreamError::Encode(Box::new(e)))?;

        tracing::debug!(topics = ?self.config.topics, "Sending subscribe request");
        write.send(Message::Text(json.into())).await?;
        Ok(())
    }

    fn handle_frame(&self, decoded: Result<WireMessage, CodecError>) {
        let message = match decoded {
            Ok(message) => message,
            Err(e) => {
                metrics::record_decode_error();
                tracing::warn!(error = %e, "Failed to decode price stream frame");
                self.events.emit(&ClientEvent::error(e.into()));
                return;
            }
        };

        metrics::record_frame_received(&message.topic);
        self.events.emit(&ClientEvent::Message(message.clone()));
        self.dispatch(&message);
    }

    fn dispatch(&self, message: &WireMessage) {
        match message.topic.as_str() {
            topics::PRICE_UPDATED => match message.decode_payload::<PriceUpdate>() {
                Ok(update) => {
                    tracing::debug!(
                        base = %update.base,
                        quote = %update.quote,
                        value = %update.value,
                        "Price updated"
                    );
                    self.events.emit(&ClientEvent::PriceUpdated(update));
                }
                Err(e) => {
                    metrics::record_decode_error();
                    tracing::warn!(error = %e, "Malformed price update payload");
                    self.events.emit(&ClientEvent::error(StreamError::Payload {
                        topic: message.topic.clone(),
                        source: e,
                    }));
                }
            },
            other => {
                tracing::trace!(topic = other, "Ignoring unhandled topic");
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::EventKind;
    use crate::infrastructure::config::{ClientOptions, WebSocketSettings};
    use serde_json::json;

    fn worker(events: Arc<EventBus>) -> StreamWorker {
        StreamWorker {
            config: PriceStreamConfig::new("ws://127.0.0.1:1"),
            codec: JsonCodec::new(),
            events,
            state: Arc::new(RwLock::new(ConnectionState::Idle)),
            cancel: CancellationToken::new(),
            previous: None,
        }
    }

    fn record(events: &EventBus) -> Arc<Mutex<Vec<ClientEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in EventKind::all() {
            let seen = Arc::clone(&seen);
            events.on(*kind, move |event| seen.lock().push(event.clone()));
        }
        seen
    }

    #[test]
    fn config_from_client_config() {
        let client_config = ClientConfig::from_options(
            ClientOptions::default()
                .with_websocket_api_url("ws://localhost:4000")
                .with_token("tok")
                .with_websocket_settings(
                    WebSocketSettings::default()
                        .with_fixed_reconnect_delay(Duration::from_millis(25)),
                ),
        );
        let config = PriceStreamConfig::from_client_config(&client_config);

        assert_eq!(config.url, "ws://localhost:4000");
        assert_eq!(config.topics, vec!["price/updated"]);
        assert_eq!(config.reconnect, ReconnectConfig::fixed(Duration::from_millis(25)));
        assert_eq!(config.token, Some(AuthToken::new("tok")));
    }

    #[test]
    fn connect_request_carries_bearer_token() {
        let mut config = PriceStreamConfig::new("ws://localhost:4000");
        config.token = Some(AuthToken::new("secret"));

        let request = config.connect_request().unwrap();
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer secret"
        );
    }

    #[test]
    fn connect_request_without_token_has_no_header() {
        let config = PriceStreamConfig::new("ws://localhost:4000");
        let request = config.connect_request().unwrap();
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn connect_request_rejects_malformed_url() {
        let config = PriceStreamConfig::new("not a url");
        assert!(matches!(
            config.connect_request(),
            Err(StreamError::WebSocket(_))
        ));
    }

    #[test]
    fn price_frame_emits_message_then_price_update() {
        let events = Arc::new(EventBus::new());
        let seen = record(&events);
        let worker = worker(Arc::clone(&events));

        let frame = json!({
            "topic": "price/updated",
            "payload": {
                "base": "USD",
                "quote": "BTC",
                "value": 42000,
                "source": "x",
                "updated_at": "2024-01-01T00:00:00Z"
            }
        })
        .to_string();
        worker.handle_frame(worker.codec.decode(&frame));

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(matches!(&seen[0], ClientEvent::Message(m) if m.is("price/updated")));
        let ClientEvent::PriceUpdated(update) = &seen[1] else {
            panic!("expected price update, got {:?}", seen[1]);
        };
        assert_eq!(update.value, rust_decimal::Decimal::from(42000));
    }

    #[test]
    fn unknown_topic_emits_only_raw_message() {
        let events = Arc::new(EventBus::new());
        let seen = record(&events);
        let worker = worker(Arc::clone(&events));

        worker.handle_frame(worker.codec.decode(r#"{"topic":"news","payload":{}}"#));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind(), EventKind::Message);
    }

    #[test]
    fn undecodable_frame_emits_error() {
        let events = Arc::new(EventBus::new());
        let seen = record(&events);
        let worker = worker(Arc::clone(&events));

        worker.handle_frame(worker.codec.decode("{not json"));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        let ClientEvent::Error(error) = &seen[0] else {
            panic!("expected error event");
        };
        assert!(matches!(**error, StreamError::Decode(_)));
        assert!(error.is_decode());
    }

    #[test]
    fn malformed_price_payload_emits_message_and_error() {
        let events = Arc::new(EventBus::new());
        let seen = record(&events);
        let worker = worker(Arc::clone(&events));

        worker.handle_frame(
            worker
                .codec
                .decode(r#"{"topic":"price/updated","payload":{"base":"USD"}}"#),
        );

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind(), EventKind::Message);
        assert!(matches!(
            &seen[1],
            ClientEvent::Error(e) if matches!(**e, StreamError::Payload { .. })
        ));
    }

    #[test]
    fn adapter_errors_convert_into_stream_errors() {
        let transport: StreamError = tungstenite::Error::ConnectionClosed.into();
        assert!(matches!(transport, StreamError::WebSocket(_)));

        let codec_error = JsonCodec::new().decode("{not json").unwrap_err();
        let decode: StreamError = codec_error.into();
        assert!(decode.is_decode());
        assert!(std::error::Error::source(&decode).is_some());
    }

    #[tokio::test]
    async fn unsubscribe_before_connect_leaves_client_idle() {
        let events = Arc::new(EventBus::new());
        let client = PriceStreamClient::new(
            PriceStreamConfig::new("ws://127.0.0.1:9"),
            events,
        );

        assert_eq!(client.connection_state(), ConnectionState::Idle);
        client.subscribe();
        assert!(client.is_subscribed());
        client.unsubscribe();
        assert!(!client.is_subscribed());

        client.shutdown().await;
        assert_eq!(client.connection_state(), ConnectionState::Idle);
    }
}
