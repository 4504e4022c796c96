use std::time::Duration;

use clap::Parser;
use ui_callback::{CallbackConfig, DEFAULT_CHECK_INTERVAL};
use ui_callback_http::{run_server, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "ui-callback-http")]
#[command(about = "Long-poll server for per-session UI callbacks", version)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 7592)]
    port: u16,

    /// How often a blocked poll re-checks its connection.
    #[arg(long)]
    check_interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!(error = %err, "ui-callback-http failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    run_server(ServerConfig {
        host: cli.host,
        port: cli.port,
        callbacks: CallbackConfig::with_check_interval(
            cli.check_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_CHECK_INTERVAL),
        ),
    })
    .await
}
