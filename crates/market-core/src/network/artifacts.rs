//! Artifact listing, selection and download.

use crate::config::SyncMode;
use crate::models::{Artifact, ArtifactList};
use crate::network::client::HttpClient;
use crate::network::download::DownloadManager;
use crate::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Remote source of plugin bundles.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// List every artifact the source currently offers.
    async fn list_artifacts(&self) -> Result<Vec<Artifact>>;

    /// Download the payload of `artifact` to `destination`.
    async fn download_artifact(&self, artifact: &Artifact, destination: &Path) -> Result<u64>;
}

/// [`ArtifactSource`] backed by the GitHub Actions artifacts API.
pub struct GitHubArtifactSource {
    artifacts_url: String,
    http: Arc<HttpClient>,
    downloads: DownloadManager,
}

impl GitHubArtifactSource {
    /// `artifacts_url` is the full `.../actions/artifacts` endpoint.
    pub fn new(artifacts_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let http = Arc::new(HttpClient::new(token)?);
        if !http.has_token() {
            warn!("No artifact API token configured; requests will be unauthenticated");
        }
        Ok(Self {
            artifacts_url: artifacts_url.into(),
            downloads: DownloadManager::new(http.clone()),
            http,
        })
    }
}

#[async_trait]
impl ArtifactSource for GitHubArtifactSource {
    async fn list_artifacts(&self) -> Result<Vec<Artifact>> {
        let list: ArtifactList = self.http.get_json(&self.artifacts_url).await?;
        debug!(
            "Artifact API listed {} artifacts (total_count: {:?})",
            list.artifacts.len(),
            list.total_count
        );
        Ok(list.artifacts)
    }

    async fn download_artifact(&self, artifact: &Artifact, destination: &Path) -> Result<u64> {
        self.downloads
            .download(&artifact.archive_download_url, destination)
            .await
    }
}

/// Pick the artifacts a sync cycle should apply, in application order.
///
/// Only non-expired artifacts named `name` are considered. They are ordered
/// newest first by `created_at` (stable for ties, missing timestamps last).
/// `Latest` keeps the first; `All` returns every match oldest first so newer
/// bundles overwrite older ones when extracted in sequence.
pub fn select_artifacts(artifacts: Vec<Artifact>, name: &str, mode: SyncMode) -> Vec<Artifact> {
    let mut matching: Vec<Artifact> = artifacts
        .into_iter()
        .filter(|a| a.name == name && !a.expired)
        .collect();

    // `None` sorts below every `Some`, so reversing the comparison puts
    // undated artifacts at the end.
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    match mode {
        SyncMode::Latest => matching.into_iter().take(1).collect(),
        SyncMode::All => {
            matching.reverse();
            matching
        }
    }
}
