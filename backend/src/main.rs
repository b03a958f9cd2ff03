//! sluice server binary.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sluice_backend::api::{build_router, AppState};
use sluice_backend::config::Config;

/// Artifact store promotion service.
#[derive(Debug, Parser)]
#[command(name = "sluice", version, about)]
struct Cli {
    /// Listen address, e.g. 0.0.0.0:8080.
    #[arg(long, env = "SLUICE_BIND")]
    bind: Option<String>,

    /// Directory for store definitions and promote rule files.
    #[arg(long, env = "SLUICE_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Root of the content storage tree.
    #[arg(long, env = "SLUICE_STORAGE_DIR")]
    storage_dir: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sluice_backend=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(storage_dir) = cli.storage_dir {
        config.storage_dir = storage_dir;
    }

    tracing::info!(
        bind = %config.bind_addr,
        data_dir = %config.data_dir.display(),
        storage_dir = %config.storage_dir.display(),
        workers = config.promote_workers,
        "starting sluice"
    );

    let state = Arc::new(AppState::from_config(config).await?);
    let router = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}
