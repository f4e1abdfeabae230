//! The sync cycle: list artifacts, download the selected bundle(s), extract
//! into a staging directory and swap it into the plugin store.
//!
//! A cycle never returns an error to its caller. Failures are logged and
//! recorded in [`SyncStatus`]; the next scheduled cycle starts from scratch.

mod scheduler;

pub use scheduler::SyncScheduler;

use crate::archive::extract_bundle;
use crate::config::{SyncConfig, SyncMode};
use crate::network::{select_artifacts, ArtifactSource};
use crate::store::PluginStore;
use crate::{MarketError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

/// Parameters of a sync cycle.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Artifact name to look for.
    pub artifact_name: String,
    pub mode: SyncMode,
    /// Where downloaded bundles are kept until extracted.
    pub scratch_dir: PathBuf,
}

impl SyncSettings {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_name: SyncConfig::DEFAULT_ARTIFACT_NAME.to_string(),
            mode: SyncMode::default(),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn with_artifact_name(mut self, name: impl Into<String>) -> Self {
        self.artifact_name = name.into();
        self
    }

    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    fn bundle_path(&self, artifact_id: u64) -> PathBuf {
        self.scratch_dir
            .join(format!("{}.{}", artifact_id, SyncConfig::BUNDLE_EXTENSION))
    }
}

/// Result of one sync cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum SyncOutcome {
    /// The store now holds the content of the applied artifacts.
    #[serde(rename_all = "camelCase")]
    Completed {
        artifact_ids: Vec<u64>,
        plugin_count: usize,
        duration_ms: u64,
    },
    /// No artifact matched; the store was left as is.
    NoArtifacts,
    /// Another cycle was still running.
    Skipped,
    /// The cycle aborted; the store was left as is.
    Failed { message: String },
}

/// Snapshot of sync activity for health reporting.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub running: bool,
    pub last_outcome: Option<SyncOutcome>,
    pub last_finished_at: Option<DateTime<Utc>>,
}

/// Runs sync cycles against one artifact source and one store.
pub struct Syncer {
    source: Arc<dyn ArtifactSource>,
    store: Arc<PluginStore>,
    settings: SyncSettings,
    /// Single slot: a cycle that cannot take it is skipped.
    slot: Mutex<()>,
    status: RwLock<SyncStatus>,
}

impl Syncer {
    pub fn new(
        source: Arc<dyn ArtifactSource>,
        store: Arc<PluginStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            store,
            settings,
            slot: Mutex::new(()),
            status: RwLock::new(SyncStatus::default()),
        }
    }

    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    /// Run one cycle unless another is in progress.
    pub async fn run_once(&self) -> SyncOutcome {
        let Ok(_slot) = self.slot.try_lock() else {
            info!("Previous sync still running, skipping this cycle");
            return SyncOutcome::Skipped;
        };

        self.status.write().await.running = true;
        let started = Instant::now();

        let outcome = match self.sync().await {
            Ok(Some((artifact_ids, plugin_count))) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    "Plugins synced: {} plugins from artifact(s) {:?} in {} ms",
                    plugin_count, artifact_ids, duration_ms
                );
                SyncOutcome::Completed {
                    artifact_ids,
                    plugin_count,
                    duration_ms,
                }
            }
            Ok(None) => SyncOutcome::NoArtifacts,
            Err(e) => {
                error!("Error downloading or extracting plugins: {}", e);
                SyncOutcome::Failed {
                    message: e.to_string(),
                }
            }
        };

        let mut status = self.status.write().await;
        status.running = false;
        status.last_outcome = Some(outcome.clone());
        status.last_finished_at = Some(Utc::now());
        outcome
    }

    /// Returns the applied artifact ids and resulting plugin count, or `None`
    /// when nothing matched.
    async fn sync(&self) -> Result<Option<(Vec<u64>, usize)>> {
        info!("Fetching artifacts...");
        let artifacts = self.source.list_artifacts().await?;
        let selected = select_artifacts(artifacts, &self.settings.artifact_name, self.settings.mode);

        if selected.is_empty() {
            info!("No '{}' artifacts found", self.settings.artifact_name);
            return Ok(None);
        }

        let staging = self.store.create_staging()?;
        let mut applied = Vec::with_capacity(selected.len());

        for artifact in &selected {
            let bundle = self.settings.bundle_path(artifact.id);
            info!("Downloading artifact {} ({})", artifact.name, artifact.id);
            self.source.download_artifact(artifact, &bundle).await?;

            info!("Extracting plugins from artifact {}", artifact.id);
            let files = extract_blocking(&bundle, staging.path()).await?;
            info!("Extracted {} files from artifact {}", files, artifact.id);

            if let Err(e) = tokio::fs::remove_file(&bundle).await {
                warn!("Failed to remove bundle {}: {}", bundle.display(), e);
            }
            applied.push(artifact.id);
        }

        let plugin_count = count_entries(staging.path()).await?;
        self.store.replace_with(staging.path()).await?;

        Ok(Some((applied, plugin_count)))
    }
}

async fn extract_blocking(bundle: &Path, dest: &Path) -> Result<usize> {
    let bundle = bundle.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || extract_bundle(&bundle, &dest))
        .await
        .map_err(|e| MarketError::Other(format!("Extraction task failed: {}", e)))?
}

async fn count_entries(dir: &Path) -> Result<usize> {
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| MarketError::io_with_path(e, dir))?;
    let mut count = 0;
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| MarketError::io_with_path(e, dir))?
    {
        if !entry.file_name().to_string_lossy().starts_with('.') {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::Artifact;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use zip::write::SimpleFileOptions;

    pub fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, contents) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    pub fn artifact(id: u64, day: u32) -> Artifact {
        Artifact {
            id,
            name: "validated-plugins".to_string(),
            created_at: Some(Utc.with_ymd_and_hms(2024, 6, day, 8, 0, 0).unwrap()),
            archive_download_url: format!("https://example.test/{}/zip", id),
            size_in_bytes: None,
            expired: false,
        }
    }

    /// In-memory artifact source.
    #[derive(Default)]
    pub struct FakeSource {
        pub artifacts: std::sync::Mutex<Vec<Artifact>>,
        pub payloads: std::sync::Mutex<HashMap<u64, Vec<u8>>>,
        pub fail_listing: std::sync::atomic::AtomicBool,
        pub list_calls: AtomicUsize,
        /// When set, listing waits on `release` after signalling `entered`.
        pub gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl FakeSource {
        pub fn publish(&self, artifact: Artifact, bundle: Vec<u8>) {
            self.payloads.lock().unwrap().insert(artifact.id, bundle);
            self.artifacts.lock().unwrap().push(artifact);
        }
    }

    #[async_trait]
    impl ArtifactSource for FakeSource {
        async fn list_artifacts(&self) -> Result<Vec<Artifact>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            if self.fail_listing.load(Ordering::SeqCst) {
                return Err(MarketError::ArtifactApi {
                    message: "Bad credentials".to_string(),
                    status_code: Some(401),
                });
            }
            Ok(self.artifacts.lock().unwrap().clone())
        }

        async fn download_artifact(&self, artifact: &Artifact, destination: &Path) -> Result<u64> {
            let bytes = self
                .payloads
                .lock()
                .unwrap()
                .get(&artifact.id)
                .cloned()
                .unwrap_or_default();
            if let Some(parent) = destination.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(destination, &bytes)?;
            Ok(bytes.len() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    fn setup(source: Arc<FakeSource>, mode: SyncMode) -> (Syncer, Arc<PluginStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(PluginStore::new(temp_dir.path().join("validated_plugins")));
        let settings = SyncSettings::new(temp_dir.path().join("temp_zip")).with_mode(mode);
        let syncer = Syncer::new(source, store.clone(), settings);
        (syncer, store, temp_dir)
    }

    async fn listed_ids(store: &PluginStore) -> Vec<String> {
        store.list().await.unwrap().into_iter().map(|e| e.id).collect()
    }

    #[tokio::test]
    async fn test_sync_extracts_bundle_and_converges() {
        let source = Arc::new(FakeSource::default());
        source.publish(
            artifact(1, 1),
            zip_bytes(&[("A/index.js", "a"), ("B/index.js", "b")]),
        );
        let (syncer, store, temp_dir) = setup(source, SyncMode::Latest);

        for _ in 0..2 {
            let outcome = syncer.run_once().await;
            assert!(matches!(
                outcome,
                SyncOutcome::Completed { plugin_count: 2, .. }
            ));
            assert_eq!(listed_ids(&store).await, vec!["A", "B"]);
        }

        // The bundle is removed after a successful extraction.
        assert!(!temp_dir.path().join("temp_zip").join("1.zip").exists());
    }

    #[tokio::test]
    async fn test_newer_bundle_replaces_store() {
        let source = Arc::new(FakeSource::default());
        source.publish(artifact(1, 1), zip_bytes(&[("A/index.js", "a")]));
        let (syncer, store, _temp) = setup(source.clone(), SyncMode::Latest);

        syncer.run_once().await;
        assert_eq!(listed_ids(&store).await, vec!["A"]);

        source.publish(artifact(2, 2), zip_bytes(&[("C/index.js", "c")]));
        let outcome = syncer.run_once().await;
        assert!(matches!(outcome, SyncOutcome::Completed { ref artifact_ids, .. } if artifact_ids == &vec![2]));
        assert_eq!(listed_ids(&store).await, vec!["C"]);
    }

    #[tokio::test]
    async fn test_all_mode_applies_oldest_first() {
        let source = Arc::new(FakeSource::default());
        source.publish(
            artifact(2, 9),
            zip_bytes(&[("A/version.txt", "new"), ("B/index.js", "b")]),
        );
        source.publish(artifact(1, 3), zip_bytes(&[("A/version.txt", "old")]));
        let (syncer, store, _temp) = setup(source, SyncMode::All);

        let outcome = syncer.run_once().await;
        assert!(matches!(outcome, SyncOutcome::Completed { ref artifact_ids, .. } if artifact_ids == &vec![1, 2]));
        assert_eq!(listed_ids(&store).await, vec!["A", "B"]);
        assert_eq!(
            std::fs::read_to_string(store.root().join("A/version.txt")).unwrap(),
            "new"
        );
    }

    #[tokio::test]
    async fn test_listing_failure_leaves_store_untouched() {
        let source = Arc::new(FakeSource::default());
        source.publish(artifact(1, 1), zip_bytes(&[("A/index.js", "a")]));
        let (syncer, store, _temp) = setup(source.clone(), SyncMode::Latest);
        syncer.run_once().await;

        source.fail_listing.store(true, Ordering::SeqCst);
        let outcome = syncer.run_once().await;

        assert!(matches!(outcome, SyncOutcome::Failed { .. }));
        assert_eq!(listed_ids(&store).await, vec!["A"]);
        let status = syncer.status().await;
        assert!(!status.running);
        assert_eq!(status.last_outcome, Some(outcome));
    }

    #[tokio::test]
    async fn test_corrupt_bundle_keeps_file_and_store() {
        let source = Arc::new(FakeSource::default());
        source.publish(artifact(7, 1), b"definitely not a zip".to_vec());
        let (syncer, store, temp_dir) = setup(source, SyncMode::Latest);

        let outcome = syncer.run_once().await;

        assert!(matches!(outcome, SyncOutcome::Failed { .. }));
        assert!(listed_ids(&store).await.is_empty());
        assert!(temp_dir.path().join("temp_zip").join("7.zip").exists());
        // No staging directory is left behind.
        let leftovers = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("staging"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_no_matching_artifacts() {
        let source = Arc::new(FakeSource::default());
        let mut other = artifact(1, 1);
        other.name = "coverage-report".to_string();
        source.publish(other, zip_bytes(&[("X/index.js", "x")]));
        let (syncer, store, _temp) = setup(source, SyncMode::Latest);

        assert_eq!(syncer.run_once().await, SyncOutcome::NoArtifacts);
        assert!(listed_ids(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_cycle_is_skipped() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let source = Arc::new(FakeSource {
            gate: Some((entered.clone(), release.clone())),
            ..Default::default()
        });
        source.publish(artifact(1, 1), zip_bytes(&[("A/index.js", "a")]));
        let (syncer, _store, _temp) = setup(source.clone(), SyncMode::Latest);
        let syncer = Arc::new(syncer);

        let first = tokio::spawn({
            let syncer = syncer.clone();
            async move { syncer.run_once().await }
        });
        entered.notified().await;

        assert!(syncer.status().await.running);
        assert_eq!(syncer.run_once().await, SyncOutcome::Skipped);

        release.notify_one();
        let outcome = first.await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Completed { .. }));
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = SyncOutcome::Completed {
            artifact_ids: vec![3],
            plugin_count: 2,
            duration_ms: 10,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["result"], "completed");
        assert_eq!(json["pluginCount"], 2);

        let json = serde_json::to_value(SyncOutcome::NoArtifacts).unwrap();
        assert_eq!(json["result"], "noArtifacts");
    }
}
