//! Market Core - headless library behind the plugin market service.
//!
//! This crate keeps a local plugin store in sync with the newest validated
//! plugin bundle published as a GitHub Actions artifact, and exposes the store
//! for listing and download. It has no HTTP server of its own; see the
//! `market-server` crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use market_core::{GitHubArtifactSource, PluginStore, SyncSettings, Syncer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> market_core::Result<()> {
//!     let source = GitHubArtifactSource::new(
//!         "https://api.github.com/repos/acme/plugins/actions/artifacts",
//!         std::env::var("GITHUB_TOKEN").ok(),
//!     )?;
//!     let store = Arc::new(PluginStore::new("validated_plugins"));
//!     let syncer = Syncer::new(Arc::new(source), store.clone(), SyncSettings::new("temp_zip"));
//!
//!     syncer.run_once().await;
//!     for plugin in store.list().await? {
//!         println!("{} {}", plugin.id, plugin.version);
//!     }
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use config::SyncMode;
pub use error::{MarketError, Result};
pub use models::{PluginEntry, PluginListResponse, PluginSummary};
pub use network::{ArtifactSource, GitHubArtifactSource};
pub use store::{PluginExport, PluginStore};
pub use sync::{SyncOutcome, SyncScheduler, SyncSettings, SyncStatus, Syncer};
