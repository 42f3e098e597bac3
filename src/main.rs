use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use health_profiler::{
    clients::GeminiClient,
    config::Config,
    http::start_http_server,
    profiler::Profiler,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Survey risk profiler HTTP service
#[derive(Debug, Parser)]
#[command(name = "health-profiler", version, about)]
struct Cli {
    /// Address to bind, overriding config and PROFILER_HTTP_BIND
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,

    /// Load and validate configuration, then exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("health_profiler=info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Missing GEMINI_API_KEY is fatal here, before the server binds
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    if cli.check_config {
        info!("Configuration OK: {:?}", config);
        return Ok(());
    }

    info!("Starting health profiler with model {}", config.model.name);

    let client = GeminiClient::from_config(&config);
    let profiler = Profiler::from_config(&config, Arc::new(client));

    start_http_server(&config, profiler).await
}
