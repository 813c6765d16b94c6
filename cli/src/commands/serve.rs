//! `txscope serve`

use uuid::Uuid;

use crate::commands::cli::ServeArgs;
use crate::http::{server, AppState};
use txscope_core::api::{AppConfig, CliError};

pub async fn handle_serve(args: ServeArgs, mut cfg: AppConfig) -> Result<i32, CliError> {
    if let Some(host) = args.host {
        cfg.http_server.host = host;
    }
    if let Some(port) = args.port {
        cfg.http_server.port = port;
    }
    let session_id = args
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let backend = txscope_plugins::factory::build_backend(&cfg)?;
    let server_config = server::ServerConfig {
        host: cfg.http_server.host.clone(),
        port: cfg.http_server.port,
    };
    let state = AppState::new(session_id, backend, cfg);

    server::start_server(server_config, state)
        .await
        .map_err(|e| CliError::Command(format!("HTTP server error: {e}")))?;
    Ok(0)
}
