//! Serve command - run the daemon's HTTP/WebSocket transport.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use tracing::info;

use crate::core::embedder::HashingEmbedder;
use crate::core::manager::IndexManager;
use crate::daemon_config::DaemonConfig;
use crate::transport::http::{self, AppState};

pub struct ServeOptions {
    pub daemon_config_path: PathBuf,
}

pub async fn run(options: ServeOptions) -> Result<()> {
    let daemon_config = Arc::new(DaemonConfig::load(&options.daemon_config_path)?);

    let embedder = Arc::new(HashingEmbedder::default());
    let manager = Arc::new(IndexManager::new(embedder));
    for (name, path) in daemon_config.index_paths() {
        manager.register(&name, path);
    }

    let state = AppState {
        manager: manager.clone(),
        config: daemon_config.clone(),
    };
    http::warmup(&state).await;

    let addr = format!("{}:{}", daemon_config.host, daemon_config.port);
    println!(
        "{} listening on {}",
        "semadex".cyan().bold(),
        addr.green()
    );
    info!(%addr, "daemon starting");

    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
