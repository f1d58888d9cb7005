//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anypayx_prices::{ClientEvent, EventKind, PricesClient};
use futures_util::{SinkExt as _, StreamExt as _};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// How long helpers wait for something that should happen.
pub const WAIT: Duration = Duration::from_secs(3);

/// Instruction broadcast to every open server-side connection.
#[derive(Debug, Clone)]
pub enum ServerCommand {
    /// Send a text frame.
    Text(String),
    /// Send a close frame and drop the connection.
    Close,
}

/// One accepted WebSocket connection.
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    /// `Authorization` header sent with the handshake.
    pub authorization: Option<String>,
    /// When the handshake completed.
    pub accepted_at: Instant,
}

/// Mock price service WebSocket endpoint.
pub struct MockPriceServer {
    addr: SocketAddr,
    commands: broadcast::Sender<ServerCommand>,
    inbound_rx: mpsc::UnboundedReceiver<String>,
    connections: Arc<Mutex<Vec<ConnectionRecord>>>,
}

impl MockPriceServer {
    /// Start the server on a random port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (commands, _) = broadcast::channel::<ServerCommand>(64);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
        let connections = Arc::new(Mutex::new(Vec::new()));

        let command_tx = commands.clone();
        let records = Arc::clone(&connections);

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                let authorization = Arc::new(Mutex::new(None::<String>));
                let captured = Arc::clone(&authorization);
                let callback = move |request: &Request, response: Response| {
                    *captured.lock().unwrap() = request
                        .headers()
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    Ok::<Response, ErrorResponse>(response)
                };

                let Ok(ws_stream) = tokio_tungstenite::accept_hdr_async(stream, callback).await
                else {
                    continue;
                };

                records.lock().unwrap().push(ConnectionRecord {
                    authorization: authorization.lock().unwrap().take(),
                    accepted_at: Instant::now(),
                });

                let (mut write, mut read) = ws_stream.split();
                let inbound_tx = inbound_tx.clone();
                let mut command_rx = command_tx.subscribe();

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        drop(inbound_tx.send(text.to_string()));
                                    }
                                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                                    Some(Ok(_)) => {}
                                }
                            }
                            command = command_rx.recv() => {
                                match command {
                                    Ok(ServerCommand::Text(text)) => {
                                        if write.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Ok(ServerCommand::Close) | Err(_) => {
                                        drop(write.send(Message::Close(None)).await);
                                        break;
                                    }
                                }
                            }
                        }
                    }
                });
            }
        });

        Self {
            addr,
            commands,
            inbound_rx,
            connections,
        }
    }

    /// WebSocket URL of the server.
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Send a text frame to every connected client.
    pub fn send(&self, text: &str) {
        drop(self.commands.send(ServerCommand::Text(text.to_owned())));
    }

    /// Close every connected client.
    pub fn close_all(&self) {
        drop(self.commands.send(ServerCommand::Close));
    }

    /// Next text frame sent by a client.
    pub async fn recv(&mut self) -> Option<String> {
        timeout(WAIT, self.inbound_rx.recv()).await.ok().flatten()
    }

    /// Next text frame, waiting at most `wait`.
    pub async fn recv_within(&mut self, wait: Duration) -> Option<String> {
        timeout(wait, self.inbound_rx.recv()).await.ok().flatten()
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> Vec<ConnectionRecord> {
        self.connections.lock().unwrap().clone()
    }

    /// Number of connections accepted so far.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }
}

/// Collects every event a client emits.
pub struct EventRecorder {
    rx: mpsc::UnboundedReceiver<ClientEvent>,
}

impl EventRecorder {
    /// Register handlers for every event kind on `client`.
    pub fn attach(client: &PricesClient) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for kind in EventKind::all() {
            let tx = tx.clone();
            client.on(*kind, move |event| drop(tx.send(event.clone())));
        }
        Self { rx }
    }

    /// Wait for the next event of `kind`, skipping others.
    pub async fn next_of(&mut self, kind: EventKind) -> Option<ClientEvent> {
        timeout(WAIT, async {
            while let Some(event) = self.rx.recv().await {
                if event.kind() == kind {
                    return Some(event);
                }
            }
            None
        })
        .await
        .ok()
        .flatten()
    }

    /// Every event up to and including the next one of `kind`.
    pub async fn collect_until(&mut self, kind: EventKind) -> Vec<ClientEvent> {
        let mut seen = Vec::new();
        let _ = timeout(WAIT, async {
            while let Some(event) = self.rx.recv().await {
                let done = event.kind() == kind;
                seen.push(event);
                if done {
                    break;
                }
            }
        })
        .await;
        seen
    }

    /// Every event received so far without waiting.
    pub fn drain(&mut self) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// `price/updated` frame as the service sends it.
pub fn price_frame(base: &str, quote: &str, value: serde_json::Value) -> String {
    serde_json::json!({
        "topic": "price/updated",
        "payload": {
            "base": base,
            "quote": quote,
            "value": value,
            "source": "x",
            "updated_at": "2024-01-01T00:00:00Z"
        }
    })
    .to_string()
}
