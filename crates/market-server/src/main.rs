//! Market Server - plugin listing and download over HTTP.
//!
//! Polls the configured artifacts endpoint for validated plugin bundles and
//! serves the extracted plugins.

use anyhow::{Context, Result};
use clap::Parser;
use market_core::{GitHubArtifactSource, PluginStore, SyncScheduler, Syncer};
use market_server::{start_server, AppState, Args};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.debug);

    info!("Starting plugin market server");

    let store = Arc::new(PluginStore::new(&args.store_dir));
    store
        .ensure_root()
        .await
        .context("failed to create plugin store directory")?;
    tokio::fs::create_dir_all(&args.scratch_dir)
        .await
        .with_context(|| format!("failed to create {}", args.scratch_dir.display()))?;
    info!("Plugin store: {}", store.root().display());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let syncer = match &args.artifacts_url {
        Some(url) => {
            let source = GitHubArtifactSource::new(url.clone(), args.token.clone())
                .context("failed to create artifact client")?;
            let syncer = Arc::new(Syncer::new(
                Arc::new(source),
                store.clone(),
                args.sync_settings(),
            ));
            info!(
                "Syncing '{}' artifacts ({} mode) from {}",
                args.artifact_name, args.sync_mode, url
            );
            SyncScheduler::new(syncer.clone(), args.sync_interval()).spawn(shutdown_rx);
            Some(syncer)
        }
        None => {
            warn!("GITHUB_API_URL is not set; plugin sync is disabled");
            None
        }
    };

    let state = Arc::new(AppState {
        store,
        syncer,
        scratch_dir: args.scratch_dir.clone(),
    });

    let addr = start_server(state, &args.host, args.port).await?;
    info!("Server is running on port {}", addr.port());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");
    let _ = shutdown_tx.send(true);

    Ok(())
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();
}
