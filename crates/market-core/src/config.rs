//! Centralized configuration constants for the plugin market.
//!
//! Runtime options (URLs, directories, interval) come from the server's CLI;
//! the values here are fixed tuning parameters and defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    /// Longest a payload download may wait for its headers or its next chunk.
    pub const READ_TIMEOUT: Duration = Duration::from_secs(30);
    pub const USER_AGENT: &'static str = concat!("plugin-market/", env!("CARGO_PKG_VERSION"));
    pub const GITHUB_ACCEPT: &'static str = "application/vnd.github+json";
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
}

/// Artifact sync configuration.
pub struct SyncConfig;

impl SyncConfig {
    pub const DEFAULT_ARTIFACT_NAME: &'static str = "validated-plugins";
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);
    pub const BUNDLE_EXTENSION: &'static str = "zip";
}

/// Plugin store layout and descriptor defaults.
pub struct StoreConfig;

impl StoreConfig {
    pub const DEFAULT_STORE_DIR: &'static str = "validated_plugins";
    pub const DEFAULT_SCRATCH_DIR: &'static str = "temp_zip";
    pub const DESCRIPTOR_FILE_NAME: &'static str = "plugin.json";
    pub const DEFAULT_VERSION: &'static str = "none";
    pub const DEFAULT_DESCRIPTION: &'static str = "No description available";
    pub const DOWNLOAD_ROUTE_PREFIX: &'static str = "/download/";
}

/// Which matching artifacts a sync cycle applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Only the most recently created artifact.
    #[default]
    Latest,
    /// Every matching artifact, oldest first.
    All,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Latest => "latest",
            SyncMode::All => "all",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "latest" => Some(SyncMode::Latest),
            "all" => Some(SyncMode::All),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
