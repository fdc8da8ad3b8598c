use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use strategy_lens::{
    config::Config, create_router, llm::GeminiClient, queue::JobQueue, utils::init_tracing,
    AppState,
};

/// Strategic text analysis server.
#[derive(Debug, Parser)]
#[command(name = "strategy-lens", version, about)]
struct Cli {
    /// Interface to bind (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Also write daily log files here (overrides LOG_DIR)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Directory for uploaded documents (overrides UPLOAD_DIR)
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Run in development mode, exposing error details (overrides APP_ENV)
    #[arg(long)]
    development: bool,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(log_dir) = self.log_dir {
            config.server.log_dir = Some(log_dir);
        }
        if let Some(upload_dir) = self.upload_dir {
            config.server.upload_dir = upload_dir;
        }
        if self.development {
            config.server.environment = DEVELOPMENT.to_string();
        }
    }
}

const DEVELOPMENT: &str = "development";

/// Panics are fatal: log through tracing and exit instead of serving in a broken state.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic| {
        let message = panic
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        let location = panic
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();

        error!(%message, %location, "Fatal panic, terminating process");
        std::process::exit(1);
    }));
}

async fn shutdown_signal(queue: JobQueue) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!(stats = ?queue.stats(), "Shutdown requested, closing generation queue");
    queue.close();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    cli.apply(&mut config);

    let _log_guard = init_tracing(config.server.log_dir.as_deref())
        .context("Failed to initialise logging")?;
    install_panic_hook();

    info!("Configuration loaded: {:?}", config);
    if config.llm.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; analysis requests will fail until it is configured");
    }
    if config.auth.api_key.is_none() {
        warn!("FRONTEND_API_KEY is not set; API key checks are disabled");
    }

    let generator = Arc::new(GeminiClient::with_base_url(
        config.llm.api_key.clone(),
        config.llm.model.clone(),
        config.llm.base_url.clone(),
    ));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    let state = AppState::new(config, generator);
    let queue = state.queue.clone();
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(queue))
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Server stopped");
    Ok(())
}
