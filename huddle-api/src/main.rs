use anyhow::{Context, Result};
use clap::Parser;
use huddle_core::conference::{ConferenceSqlStore, ConferenceStore, MembershipResolver};
use huddle_core::config::Config;
use huddle_core::logging::{init_logging_with_config, LogConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "huddle-api")]
#[command(about = "Conference resolution HTTP server", long_about = None)]
struct Args {
    /// Bind address (overrides HUDDLE_SERVER_BIND_ADDRESS)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// SQLite database path (overrides HUDDLE_STORE_DB_PATH)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(db_path) = args.db_path {
        config.store.db_path = db_path;
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    let level = config
        .logging
        .level
        .parse()
        .context("invalid log level")?;
    init_logging_with_config(
        LogConfig::new(level)
            .with_target(true)
            .json_format(config.logging.json_format),
    )
    .context("failed to initialize logging")?;

    if let Some(parent) = config.store.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let store: Arc<dyn ConferenceStore> = Arc::new(
        ConferenceSqlStore::open(&config.store.db_path)
            .with_context(|| format!("failed to open {}", config.store.db_path.display()))?,
    );
    let resolver = Arc::new(MembershipResolver::new(store));
    let app = huddle_api::app::router(resolver);

    let listener = tokio::net::TcpListener::bind(config.server.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_address))?;
    info!(
        address = %config.server.bind_address,
        db = %config.store.db_path.display(),
        "huddle API server listening"
    );

    axum::serve(listener, app).await?;

    Ok(())
}
