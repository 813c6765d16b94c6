//! HTTP server lifecycle.

use std::net::SocketAddr;
use std::time::Duration;

use axum::middleware;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use crate::http::{
    middleware::{create_middleware_stack, request_logger},
    routes::create_router,
    AppState,
};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

pub async fn start_server(
    config: ServerConfig,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!(
        target: "txscope.http",
        session_id = %state.session_id,
        backend = state.backend.name(),
        "HTTP server listening on http://{}",
        listener.local_addr()?
    );
    serve(listener, state).await
}

/// Serves until Ctrl-C, SIGTERM, or the root token is cancelled. In-flight
/// runs are cancelled first so their streams can finish.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let timeout = Duration::from_secs(state.cfg.http_server.request_timeout_secs);
    let root = state.root_cancel.clone();

    let app = create_router(state)
        .layer(middleware::from_fn(request_logger))
        .layer(create_middleware_stack(timeout));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!(target: "txscope.http", "Received Ctrl+C signal");
                }
                _ = wait_for_sigterm() => {
                    info!(target: "txscope.http", "Received SIGTERM signal");
                }
                _ = root.cancelled() => {}
            }
            info!(target: "txscope.http", "Starting graceful shutdown, cancelling active runs");
            root.cancel();
        })
        .await?;

    info!(target: "txscope.http", "Server shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(target: "txscope.http", error = %e, "cannot listen for SIGTERM");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}
