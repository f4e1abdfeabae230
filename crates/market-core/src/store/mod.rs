//! The plugin store: the on-disk directory that sync cycles populate and the
//! HTTP layer reads from.
//!
//! Readers hold a shared lock for the duration of a scan or export. A sync
//! cycle extracts into a staging directory next to the root and then swaps it
//! in under the exclusive lock, so readers never see a half-extracted store.

mod descriptor;

pub use descriptor::{read_descriptor, resolve_entry, sanitize_identifier};

use crate::models::{PluginEntry, PluginKind};
use crate::{archive, MarketError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, TempPath};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A plugin opened for download.
#[derive(Debug)]
pub struct PluginExport {
    pub entry: PluginEntry,
    /// Open handle to the bytes to send.
    pub file: File,
    pub len: u64,
    pub content_type: &'static str,
    /// Packed archive for directory plugins; the file is removed on drop.
    pub temp_path: Option<TempPath>,
}

/// Directory-backed plugin store.
pub struct PluginStore {
    root: PathBuf,
    lock: RwLock<()>,
}

impl PluginStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| MarketError::io_with_path(e, &self.root))
    }

    /// All plugins in the store, sorted by entry name.
    pub async fn list(&self) -> Result<Vec<PluginEntry>> {
        let _guard = self.lock.read().await;
        let root = self.root.clone();
        run_blocking(move || scan_entries(&root)).await
    }

    /// Look up a plugin by its canonical identifier.
    pub async fn find(&self, id: &str) -> Result<Option<PluginEntry>> {
        let _guard = self.lock.read().await;
        let root = self.root.clone();
        let id = id.to_string();
        run_blocking(move || find_entry(&root, &id)).await
    }

    /// Open a plugin for download, packing directories into a ZIP inside
    /// `scratch_dir`. Returns `Ok(None)` when no plugin has this id.
    pub async fn export(&self, id: &str, scratch_dir: &Path) -> Result<Option<PluginExport>> {
        let _guard = self.lock.read().await;
        let root = self.root.clone();
        let scratch_dir = scratch_dir.to_path_buf();
        let id = id.to_string();

        run_blocking(move || {
            let Some(entry) = find_entry(&root, &id)? else {
                return Ok(None);
            };
            export_entry(entry, &scratch_dir).map(Some)
        })
        .await
    }

    /// Create an empty staging directory on the same filesystem as the root.
    ///
    /// The directory is deleted when the returned handle drops, unless it was
    /// consumed by [`PluginStore::replace_with`].
    pub fn create_staging(&self) -> Result<TempDir> {
        let parent = self.parent_dir();
        std::fs::create_dir_all(&parent).map_err(|e| MarketError::io_with_path(e, &parent))?;
        tempfile::Builder::new()
            .prefix(&format!(".{}.staging-", self.root_name()))
            .tempdir_in(&parent)
            .map_err(|e| MarketError::io_with_path(e, parent))
    }

    /// Replace the store contents with `staging`.
    ///
    /// The old root is renamed aside, the staging directory renamed into
    /// place, and the old contents deleted after the lock is released. If the
    /// second rename fails the old root is restored.
    pub async fn replace_with(&self, staging: &Path) -> Result<()> {
        let backup = {
            let _guard = self.lock.write().await;
            let root = self.root.clone();
            let staging = staging.to_path_buf();
            let backup = self
                .parent_dir()
                .join(format!(".{}.old-{}", self.root_name(), uuid::Uuid::new_v4().simple()));
            run_blocking(move || swap_directories(&root, &staging, &backup)).await?
        };

        if let Some(backup) = backup {
            let result = run_blocking(move || {
                std::fs::remove_dir_all(&backup).map_err(|e| MarketError::io_with_path(e, backup))
            })
            .await;
            if let Err(e) = result {
                warn!("Failed to remove previous store contents: {}", e);
            }
        }

        info!("Plugin store at {} replaced", self.root.display());
        Ok(())
    }

    fn parent_dir(&self) -> PathBuf {
        match self.root.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn root_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string())
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MarketError::Other(format!("Store task failed: {}", e)))?
}

fn scan_entries(root: &Path) -> Result<Vec<PluginEntry>> {
    let read_dir = match std::fs::read_dir(root) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(MarketError::io_with_path(e, root)),
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| MarketError::io_with_path(e, root))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        paths.push(entry.path());
    }
    paths.sort();

    Ok(paths.iter().filter_map(|p| resolve_entry(p)).collect())
}

fn find_entry(root: &Path, id: &str) -> Result<Option<PluginEntry>> {
    Ok(scan_entries(root)?.into_iter().find(|entry| entry.id == id))
}

fn export_entry(entry: PluginEntry, scratch_dir: &Path) -> Result<PluginExport> {
    match entry.kind {
        PluginKind::File => {
            let file = File::open(&entry.path).map_err(|e| MarketError::io_with_path(e, &entry.path))?;
            let len = file
                .metadata()
                .map_err(|e| MarketError::io_with_path(e, &entry.path))?
                .len();
            Ok(PluginExport {
                entry,
                file,
                len,
                content_type: "application/octet-stream",
                temp_path: None,
            })
        }
        PluginKind::Directory => {
            std::fs::create_dir_all(scratch_dir)
                .map_err(|e| MarketError::io_with_path(e, scratch_dir))?;
            let temp_path = tempfile::Builder::new()
                .prefix(&format!("{}-", sanitize_identifier(&entry.id)))
                .suffix(".zip")
                .tempfile_in(scratch_dir)
                .map_err(|e| MarketError::io_with_path(e, scratch_dir))?
                .into_temp_path();

            let files = archive::pack_directory(&entry.path, &temp_path)?;
            let file = File::open(&temp_path).map_err(|e| MarketError::io_with_path(e, &*temp_path))?;
            let len = file
                .metadata()
                .map_err(|e| MarketError::io_with_path(e, &*temp_path))?
                .len();
            debug!("Packed {} ({} files, {} bytes)", entry.id, files, len);

            Ok(PluginExport {
                entry,
                file,
                len,
                content_type: "application/zip",
                temp_path: Some(temp_path),
            })
        }
    }
}

/// Returns the backup path when there was a previous root to move aside.
fn swap_directories(root: &Path, staging: &Path, backup: &Path) -> Result<Option<PathBuf>> {
    let had_root = root.exists();
    if had_root {
        std::fs::rename(root, backup).map_err(|e| MarketError::io_with_path(e, root))?;
    }

    if let Err(e) = std::fs::rename(staging, root) {
        if had_root {
            if let Err(restore) = std::fs::rename(backup, root) {
                warn!(
                    "Failed to restore previous store from {}: {}",
                    backup.display(),
                    restore
                );
            }
        }
        return Err(MarketError::io_with_path(e, root));
    }

    Ok(had_root.then(|| backup.to_path_buf()))
}
