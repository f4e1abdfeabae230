//! Bundle extraction.

use crate::{MarketError, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Compressed bundle formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleFormat {
    Zip,
    TarGz,
}

impl BundleFormat {
    /// Sniff the format from the leading bytes of `path`.
    pub fn detect(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| MarketError::io_with_path(e, path))?;
        let mut magic = [0u8; 4];
        let read = file
            .read(&mut magic)
            .map_err(|e| MarketError::io_with_path(e, path))?;

        match &magic[..read] {
            [b'P', b'K', 0x03, 0x04] | [b'P', b'K', 0x05, 0x06] => Ok(BundleFormat::Zip),
            [0x1f, 0x8b, ..] => Ok(BundleFormat::TarGz),
            _ => Err(MarketError::Archive {
                message: format!("Unrecognized bundle format: {}", path.display()),
            }),
        }
    }
}

/// Extract the bundle at `archive_path` into `dest_dir`.
///
/// The destination is created if missing; existing files with the same
/// relative path are overwritten. Returns the number of files written.
pub fn extract_bundle(archive_path: &Path, dest_dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(dest_dir).map_err(|e| MarketError::io_with_path(e, dest_dir))?;

    let count = match BundleFormat::detect(archive_path)? {
        BundleFormat::Zip => extract_zip(archive_path, dest_dir)?,
        BundleFormat::TarGz => extract_tarball(archive_path, dest_dir)?,
    };

    debug!(
        "Extracted {} files from {} into {}",
        count,
        archive_path.display(),
        dest_dir.display()
    );
    Ok(count)
}

fn extract_zip(archive_path: &Path, extract_dir: &Path) -> Result<usize> {
    let file = File::open(archive_path).map_err(|e| MarketError::io_with_path(e, archive_path))?;

    let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| MarketError::Archive {
        message: format!("Invalid zip archive {}: {}", archive_path.display(), e),
    })?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| MarketError::Archive {
            message: format!("Failed to read zip entry {}: {}", i, e),
        })?;

        let outpath = match entry.enclosed_name() {
            Some(path) => extract_dir.join(path),
            None => {
                warn!("Skipping zip entry with unsafe path: {}", entry.name());
                continue;
            }
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath).map_err(|e| MarketError::io_with_path(e, &outpath))?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent).map_err(|e| MarketError::io_with_path(e, parent))?;
            }

            let mut outfile =
                File::create(&outpath).map_err(|e| MarketError::io_with_path(e, &outpath))?;
            std::io::copy(&mut entry, &mut outfile)
                .map_err(|e| MarketError::io_with_path(e, &outpath))?;
            written += 1;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)).ok();
            }
        }
    }

    Ok(written)
}

fn extract_tarball(archive_path: &Path, extract_dir: &Path) -> Result<usize> {
    let file = File::open(archive_path).map_err(|e| MarketError::io_with_path(e, archive_path))?;
    let decoder = flate2::read::GzDecoder::new(BufReader::new(file));
    let mut archive = tar::Archive::new(decoder);
    archive.set_overwrite(true);

    let entries = archive.entries().map_err(|e| MarketError::Archive {
        message: format!("Failed to read tarball {}: {}", archive_path.display(), e),
    })?;

    let mut written = 0;
    for entry in entries {
        let mut entry = entry.map_err(|e| MarketError::Archive {
            message: format!("Failed to read tar entry: {}", e),
        })?;
        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            warn!(
                "Skipping link entry in tarball: {}",
                entry.path().map(|p| p.display().to_string()).unwrap_or_default()
            );
            continue;
        }
        let is_file = entry_type.is_file();

        // `unpack_in` refuses entries that would land outside `extract_dir`.
        let unpacked = entry.unpack_in(extract_dir).map_err(|e| MarketError::Archive {
            message: format!("Failed to extract tar entry: {}", e),
        })?;
        if !unpacked {
            warn!("Skipping tar entry with unsafe path");
        } else if is_file {
            written += 1;
        }
    }

    Ok(written)
}
