use std::net::SocketAddr;
use std::sync::Arc;

use app::build_router;
use ui_callback::{CallbackConfig, SessionRegistry};

pub mod app;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub callbacks: CallbackConfig,
}

pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let sessions = Arc::new(SessionRegistry::new(config.callbacks));
    run_server_with_sessions(config.host, config.port, sessions).await
}

pub async fn run_server_with_sessions(
    host: String,
    port: u16,
    sessions: Arc<SessionRegistry>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = build_router(sessions.clone());
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %addr,
        check_interval_ms = u64::try_from(sessions.config().check_interval.as_millis()).unwrap_or(u64::MAX),
        "ui-callback-http listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sessions))
        .await?;
    Ok(())
}

async fn shutdown_signal(sessions: Arc<SessionRegistry>) {
    let _ = tokio::signal::ctrl_c().await;
    // blocked polls would otherwise hold the shutdown for a full check interval
    sessions.destroy_all();
}
