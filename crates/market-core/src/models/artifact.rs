//! GitHub Actions artifact types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single workflow artifact as listed by the artifacts API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub archive_download_url: String,
    #[serde(default)]
    pub size_in_bytes: Option<u64>,
    #[serde(default)]
    pub expired: bool,
}

/// Response envelope of `GET /repos/{owner}/{repo}/actions/artifacts`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactList {
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}
