//! Tavola server binary.
//!
//! Usage:
//!   tavola [--config <tavola.toml>] [--bind <host:port>]
//!
//! Configuration comes from the TOML file plus environment overrides
//! (DATABASE_URL, CACHE_ENABLED, RATE_LIMIT_PER_MINUTE, BIND_ADDR, ...);
//! command-line flags win over both.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tavola::config::Settings;
use tavola::db::PgExecutor;
use tavola::http::{self, AppState};

#[derive(Parser)]
#[command(name = "tavola")]
#[command(about = "Restaurant sales analytics API")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    };
    if let Some(bind) = cli.bind {
        settings.server.bind = bind;
    }

    tracing::info!(
        bind = %settings.server.bind,
        cache = settings.cache.enabled,
        rate_limit = settings.rate_limit.enabled,
        "starting"
    );

    let executor = PgExecutor::connect(
        &settings.database.url,
        settings.database.max_connections,
        Duration::from_secs(settings.database.acquire_timeout_secs),
    )
    .await?;

    let state = Arc::new(AppState::new(settings, Arc::new(executor)));
    http::serve(state).await
}
