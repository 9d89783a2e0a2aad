//! Muddy Server
//!
//! A multi-user dungeon server accepting length-framed TCP clients and
//! browser WebSocket clients, with a small REST API for login.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use muddy_server::api;
use muddy_server::config::ServerConfig;
use muddy_server::net::handler::ConnectionHandler;
use muddy_server::net::session::run_pending_reaper;
use muddy_server::state::AppState;
use muddy_server::VERSION;

/// How long to wait for connection tasks to finish after shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
enum ListenerKind {
    Tcp,
    WebSocket,
}

impl ListenerKind {
    fn name(self) -> &'static str {
        match self {
            ListenerKind::Tcp => "game",
            ListenerKind::WebSocket => "WebSocket",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Loaded before the subscriber exists, since `debug` picks the default filter
    let config = ServerConfig::load().await?;
    init_logging(config.log_filter());

    info!(version = VERSION, debug = config.debug, "Muddy server starting");
    if config.config_path.exists() {
        info!(
            "Configuration loaded from: {}",
            config.config_path.display()
        );
    } else {
        warn!(
            "Config file not found at {}, using defaults",
            config.config_path.display()
        );
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let state = Arc::new(
        AppState::load(config.clone(), shutdown_tx.clone())
            .await
            .with_context(|| format!("Failed to load world from {}", config.world_path.display()))?,
    );

    if let Some(ttl) = config.pending_ttl() {
        tokio::spawn(run_pending_reaper(
            Arc::clone(&state.registry),
            ttl,
            config.reap_interval(),
            shutdown_tx.subscribe(),
        ));
    }

    let game_addr: SocketAddr = config.game_addr().parse()?;
    let game_listener = TcpListener::bind(game_addr)
        .await
        .with_context(|| format!("Failed to bind game port {}", game_addr))?;
    info!("Game server listening on: {}", game_addr);

    let ws_addr: SocketAddr = config.websocket_addr().parse()?;
    let ws_listener = TcpListener::bind(ws_addr)
        .await
        .with_context(|| format!("Failed to bind WebSocket port {}", ws_addr))?;
    info!("WebSocket server listening on: {}", ws_addr);

    let api_addr: SocketAddr = config.api_addr().parse()?;
    let api_listener = TcpListener::bind(api_addr)
        .await
        .with_context(|| format!("Failed to bind API port {}", api_addr))?;
    info!("REST API server listening on: {}", api_addr);

    let game_handle = tokio::spawn(accept_connections(
        game_listener,
        Arc::clone(&state),
        shutdown_tx.subscribe(),
        ListenerKind::Tcp,
    ));
    let ws_handle = tokio::spawn(accept_connections(
        ws_listener,
        Arc::clone(&state),
        shutdown_tx.subscribe(),
        ListenerKind::WebSocket,
    ));
    let api_handle = tokio::spawn(run_api_server(
        api_listener,
        Arc::clone(&state),
        shutdown_tx.subscribe(),
    ));

    info!(
        server = %config.server_name,
        capacity = config.max_players,
        "Server startup complete"
    );

    wait_for_shutdown(shutdown_tx.clone()).await;

    info!("Shutting down server...");

    for (name, handle) in [("game", game_handle), ("websocket", ws_handle), ("api", api_handle)] {
        if let Err(e) = handle.await {
            error!(task = name, error = %e, "Server task failed");
        }
    }

    info!(
        remaining = state.registry.active_count(),
        "Server shutdown complete. Goodbye!"
    );
    Ok(())
}

/// Initialize the logging/tracing system. `RUST_LOG` wins over the default.
fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();
}

/// Accept connections until shutdown, then wait a bounded time for the
/// spawned connection tasks to tear down their sessions.
async fn accept_connections(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown_rx: broadcast::Receiver<()>,
    kind: ListenerKind,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!(listener = kind.name(), "Connection acceptor shutting down");
                break;
            }
            result = listener.accept() => match result {
                Ok((stream, addr)) => {
                    info!(listener = kind.name(), address = %addr, "New connection");
                    let handler = ConnectionHandler::new(Arc::clone(&state));
                    // Subscribe here so a shutdown sent before the task runs is still seen
                    let conn_shutdown_rx = state.shutdown_tx.subscribe();
                    connections.spawn(async move {
                        let result = match kind {
                            ListenerKind::Tcp => {
                                handler.handle_tcp(stream, addr, conn_shutdown_rx).await
                            }
                            ListenerKind::WebSocket => {
                                handler.handle_websocket(stream, addr, conn_shutdown_rx).await
                            }
                        };
                        if let Err(e) = result {
                            warn!(address = %addr, error = %e, "Connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(listener = kind.name(), error = %e, "Failed to accept connection");
                }
            },
            Some(finished) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = finished {
                    error!(listener = kind.name(), error = %e, "Connection task panicked");
                }
            }
        }
    }

    drain_connections(connections, kind).await;
}

async fn drain_connections(mut connections: JoinSet<()>, kind: ListenerKind) {
    if connections.is_empty() {
        return;
    }

    info!(
        listener = kind.name(),
        open = connections.len(),
        "Waiting for connections to close"
    );
    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while connections.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        warn!(
            listener = kind.name(),
            remaining = connections.len(),
            "Connections did not close in time, aborting"
        );
        connections.abort_all();
    }
}

/// Run the HTTP API server
async fn run_api_server(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let router = api::create_router(state);

    let shutdown_signal = async move {
        let _ = shutdown_rx.recv().await;
        info!("REST API server shutting down");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .unwrap_or_else(|e| error!("API server error: {}", e));
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    let _ = shutdown_tx.send(());
}
