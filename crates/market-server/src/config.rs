//! Command line and environment configuration.

use clap::Parser;
use market_core::config::{StoreConfig, SyncConfig};
use market_core::{SyncMode, SyncSettings};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "market-server")]
#[command(about = "Plugin market: syncs validated plugin bundles and serves them over HTTP")]
pub struct Args {
    /// Host to bind to
    #[arg(long, env = "MARKET_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, env = "PORT", default_value_t = 3002)]
    pub port: u16,

    /// GitHub Actions artifacts endpoint; sync is disabled when unset
    #[arg(long, env = "GITHUB_API_URL", value_parser = parse_artifacts_url)]
    pub artifacts_url: Option<String>,

    /// Bearer token for the artifacts API
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Name of the artifact that carries the plugin bundle
    #[arg(long, env = "MARKET_ARTIFACT_NAME", default_value = SyncConfig::DEFAULT_ARTIFACT_NAME)]
    pub artifact_name: String,

    /// Which matching artifacts a sync applies: `latest` or `all`
    #[arg(long, env = "MARKET_SYNC_MODE", default_value = "latest", value_parser = parse_sync_mode)]
    pub sync_mode: SyncMode,

    /// Seconds between sync cycles
    #[arg(long, env = "MARKET_SYNC_INTERVAL_SECS", default_value_t = SyncConfig::DEFAULT_INTERVAL.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    pub sync_interval_secs: u64,

    /// Directory holding the extracted plugins
    #[arg(long, env = "MARKET_STORE_DIR", default_value = StoreConfig::DEFAULT_STORE_DIR)]
    pub store_dir: PathBuf,

    /// Directory for downloaded bundles and on-demand ZIPs
    #[arg(long, env = "MARKET_SCRATCH_DIR", default_value = StoreConfig::DEFAULT_SCRATCH_DIR)]
    pub scratch_dir: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

impl Args {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings::new(&self.scratch_dir)
            .with_artifact_name(&self.artifact_name)
            .with_mode(self.sync_mode)
    }
}

fn parse_artifacts_url(value: &str) -> Result<String, String> {
    let url = url::Url::parse(value).map_err(|e| format!("invalid URL '{}': {}", value, e))?;
    match url.scheme() {
        "http" | "https" => Ok(value.to_string()),
        other => Err(format!("unsupported URL scheme '{}'", other)),
    }
}

fn parse_sync_mode(value: &str) -> Result<SyncMode, String> {
    SyncMode::parse(value).ok_or_else(|| format!("expected 'latest' or 'all', got '{}'", value))
}
