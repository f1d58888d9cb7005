//! AnyPayX Prices Watcher
//!
//! Subscribes to price updates and logs them until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin anypayx-prices
//! ```
//!
//! # Environment Variables
//!
//! - `ANYPAYX_HTTP_API_URL`: REST base URL (default: <https://prices.anypayx.com>)
//! - `ANYPAYX_WEBSOCKET_API_URL`: WebSocket URL (default: <wss://prices.anypayx.com>)
//! - `ANYPAYX_TOKEN`: Bearer token (optional)
//! - `ANYPAYX_RECONNECT_DELAY_MS` and friends: see `ClientConfig::from_env`
//! - `ANYPAYX_METRICS_PORT`: Serve Prometheus metrics on this port (optional)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: anypayx_prices=info)

use std::net::SocketAddr;

use anyhow::Context;
use anypayx_prices::infrastructure::{metrics, telemetry};
use anypayx_prices::{ClientConfig, ClientEvent, EventKind, PricesClient};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!("Starting AnyPayX price watcher");

    if let Some(port) = metrics_port()? {
        metrics::init_prometheus(SocketAddr::from(([0, 0, 0, 0], port)))
            .context("failed to start Prometheus exporter")?;
    }

    let config = ClientConfig::from_env()?;
    log_config(&config);

    let client = PricesClient::from_config(config)?;
    register_handlers(&client);

    match client.list_prices().await {
        Ok(prices) => tracing::info!(count = prices.len(), "Fetched price snapshot"),
        Err(e) => tracing::warn!(error = %e, "Price snapshot unavailable"),
    }

    client.subscribe_to_prices_updates();

    await_shutdown().await?;

    client.close().await;
    tracing::info!("Price watcher stopped");
    Ok(())
}

fn register_handlers(client: &PricesClient) {
    client.on(EventKind::PriceUpdated, |event| {
        if let ClientEvent::PriceUpdated(update) = event {
            tracing::info!(
                pair = %update.price().pair(),
                value = %update.value,
                source = %update.source,
                updated_at = %update.updated_at,
                "Price update"
            );
        }
    });
    client.on(EventKind::Open, |_| tracing::info!("Price stream connected"));
    client.on(EventKind::Close, |_| tracing::warn!("Price stream disconnected"));
    client.on(EventKind::Error, |event| {
        if let ClientEvent::Error(e) = event {
            tracing::error!(error = %e, "Price stream error");
        }
    });
}

fn metrics_port() -> anyhow::Result<Option<u16>> {
    match std::env::var("ANYPAYX_METRICS_PORT") {
        Ok(value) if !value.trim().is_empty() => {
            let port = value
                .trim()
                .parse()
                .with_context(|| format!("invalid ANYPAYX_METRICS_PORT: {value}"))?;
            Ok(Some(port))
        }
        _ => Ok(None),
    }
}

fn log_config(config: &ClientConfig) {
    tracing::info!(
        http_api_url = %config.http_api_url,
        websocket_api_url = %config.websocket_api_url,
        authenticated = config.token.is_some(),
        "Configuration loaded"
    );
    tracing::debug!(
        request_timeout_secs = config.request_timeout.as_secs(),
        connect_timeout_secs = config.websocket.connect_timeout.as_secs(),
        reconnect_delay_ms = config.websocket.reconnect_delay_initial.as_millis(),
        max_reconnect_attempts = config.websocket.max_reconnect_attempts,
        "Stream settings"
    );
}

/// Load .env from the current directory or the nearest ancestor that has one.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn await_shutdown() -> anyhow::Result<()> {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("failed to install SIGTERM handler")?;

    #[cfg(unix)]
    let terminate = terminate.recv();

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        result = ctrl_c => {
            result.context("failed to listen for Ctrl+C")?;
            tracing::info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }

    Ok(())
}
