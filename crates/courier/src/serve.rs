// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Starts the full bridge: SQLite-backed bridge store, single-writer bridge
//! engine, chat.db poller, and the HTTP/WebSocket gateway. Supports graceful
//! shutdown via signal handlers.

use std::sync::Arc;
use std::time::Duration;

use courier_bridge::shutdown;
use courier_bridge::{BridgeEngine, BridgeHealth, EventHub, Poller, PollerConfig};
use courier_config::CourierConfig;
use courier_core::{CourierError, HealthStatus, NativeStore};
use courier_gateway::{start_server, GatewayState, ServerConfig};
use courier_imessage::{IMessageStore, IMessageStoreConfig};
use courier_store::Database;
use tracing::{info, warn};

/// Runs the `courier serve` command.
///
/// Opens the bridge store, initializes the iMessage adapter, wires the
/// bridge engine and poller, and serves the gateway in the foreground
/// until a shutdown signal arrives.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.bridge.log_level);

    info!("starting courier serve");

    let db = Database::open(&config.storage.database_path, config.storage.wal_mode).await?;

    let hub = Arc::new(EventHub::new(config.bridge.subscriber_queue_size));
    let health = Arc::new(BridgeHealth::new());

    let adapter: Arc<dyn NativeStore> = Arc::new(IMessageStore::new(IMessageStoreConfig {
        chat_db_path: config.imessage.chat_db_path.clone(),
        send_retry_count: config.imessage.send_retry_count,
        send_retry_delay_secs: config.imessage.send_retry_delay_secs,
    }));

    // The service starts even when chat.db is not readable yet; the poller
    // backs off until the adapter recovers.
    match adapter.health_check().await? {
        HealthStatus::Healthy => {
            info!(adapter = adapter.name(), "native store reachable");
        }
        HealthStatus::Degraded(reason) => {
            warn!(adapter = adapter.name(), reason, "native store degraded");
        }
        HealthStatus::Unhealthy(reason) => {
            warn!(
                adapter = adapter.name(),
                reason, "native store unreachable, polls will fail until it recovers"
            );
        }
    }

    let engine = BridgeEngine::new(
        db.clone(),
        hub.clone(),
        health.clone(),
        adapter.name(),
        config.bridge.dedup_window_secs,
    )
    .await?;
    let bridge = engine.handle();
    let watermark = engine.watermark();

    let cancel = shutdown::install_signal_handler();

    let engine_task = tokio::spawn(engine.run(cancel.clone()));

    let poller = Poller::new(
        adapter.clone(),
        bridge.clone(),
        PollerConfig {
            poll_interval_secs: config.bridge.poll_interval_secs,
            fetch_timeout_secs: config.bridge.fetch_timeout_secs,
            error_backoff_secs: config.bridge.error_backoff_secs,
        },
        watermark,
    );
    let poller_task = tokio::spawn(poller.run(cancel.clone()));

    let state = GatewayState {
        db: db.clone(),
        hub: hub.clone(),
        bridge,
        adapter: adapter.clone(),
        health,
        cancel: cancel.clone(),
        start_time: std::time::Instant::now(),
        history_page_limit: config.server.history_page_limit,
        replay_backlog: config.bridge.replay_backlog,
        send_timeout_secs: config.bridge.send_timeout_secs,
    };

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    // Serves in the foreground; returns after the cancel token fires or on
    // a bind/serve error.
    let serve_result = start_server(&server_config, state).await;

    // On a serve error the signal handler never fired; stop the workers.
    cancel.cancel();

    hub.close_all("server shutting down");

    if let Err(e) = adapter.shutdown().await {
        warn!(error = %e, "adapter shutdown reported an error");
    }

    for (name, task) in [("poller", poller_task), ("bridge engine", engine_task)] {
        if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
            warn!(task = name, "task did not stop within 5s, abandoning");
        }
    }

    if let Err(e) = db.close().await {
        warn!(error = %e, "bridge store close reported an error");
    }

    info!("courier serve shutdown complete");
    serve_result
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
