//! On-demand ZIP packing of plugin directories.

use crate::{MarketError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use tracing::warn;
use zip::CompressionMethod;

/// Pack the contents of `src_dir` into a new ZIP at `dest`.
///
/// Entries are stored relative to `src_dir` (the directory itself is not a
/// path component), with forward slashes and deflate compression. Symbolic
/// links are not followed and not packed. Returns the number of files written.
pub fn pack_directory(src_dir: &Path, dest: &Path) -> Result<usize> {
    if !src_dir.is_dir() {
        return Err(MarketError::Io {
            message: "Not a directory".to_string(),
            path: Some(src_dir.to_path_buf()),
            source: None,
        });
    }

    let file = File::create(dest).map_err(|e| MarketError::io_with_path(e, dest))?;
    let mut zip = zip::ZipWriter::new(BufWriter::new(file));
    let base_options =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = 0;
    for entry in WalkDir::new(src_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src_dir)
            .map_err(|e| MarketError::Other(format!("Failed to relativize path: {}", e)))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.path_is_symlink() {
            warn!("Not packing symbolic link {}", entry.path().display());
            continue;
        }

        let options = with_permissions(base_options, entry.path());

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", name), options)?;
        } else {
            zip.start_file(name, options)?;
            let mut source =
                File::open(entry.path()).map_err(|e| MarketError::io_with_path(e, entry.path()))?;
            std::io::copy(&mut source, &mut zip)
                .map_err(|e| MarketError::io_with_path(e, entry.path()))?;
            files += 1;
        }
    }

    let mut writer = zip.finish()?;
    writer.flush().map_err(|e| MarketError::io_with_path(e, dest))?;
    Ok(files)
}

#[cfg(unix)]
fn with_permissions(options: SimpleFileOptions, path: &Path) -> SimpleFileOptions {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => options.unix_permissions(meta.permissions().mode() & 0o7777),
        Err(_) => options,
    }
}

#[cfg(not(unix))]
fn with_permissions(options: SimpleFileOptions, _path: &Path) -> SimpleFileOptions {
    options
}
