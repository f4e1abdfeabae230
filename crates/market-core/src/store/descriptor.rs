//! Resolution of store entries into plugin metadata.
//!
//! One rule derives a plugin's identifier everywhere: the `id` from its
//! `plugin.json` when present and non-empty, otherwise the entry's file name
//! with every character outside `[A-Za-z0-9._-]` replaced by `-`.

use crate::config::StoreConfig;
use crate::models::{PluginDescriptor, PluginEntry, PluginKind};
use crate::{MarketError, Result};
use std::path::Path;
use tracing::warn;

/// Read `plugin.json` from a plugin directory.
///
/// Returns `Ok(None)` when the file does not exist or is a symbolic link.
pub fn read_descriptor(plugin_dir: &Path) -> Result<Option<PluginDescriptor>> {
    let path = plugin_dir.join(StoreConfig::DESCRIPTOR_FILE_NAME);
    match std::fs::symlink_metadata(&path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            warn!("Ignoring symlinked descriptor {}", path.display());
            return Ok(None);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        _ => {}
    }

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MarketError::io_with_path(e, path)),
    };

    let descriptor = serde_json::from_str(&contents).map_err(|e| MarketError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;
    Ok(Some(descriptor))
}

/// Replace characters that are awkward in URLs and file names.
pub fn sanitize_identifier(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "plugin".to_string()
    } else {
        sanitized
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Build the [`PluginEntry`] for a path inside the store root.
///
/// Unreadable or malformed descriptors are logged and treated as absent.
/// Symbolic links and anything else that is neither a file nor a directory
/// yield `None`.
pub fn resolve_entry(path: &Path) -> Option<PluginEntry> {
    let file_name = path.file_name()?.to_string_lossy().into_owned();
    let file_type = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta.file_type(),
        Err(e) => {
            warn!("Skipping unreadable store entry {}: {}", file_name, e);
            return None;
        }
    };
    let kind = if file_type.is_dir() {
        PluginKind::Directory
    } else if file_type.is_file() {
        PluginKind::File
    } else {
        warn!("Skipping store entry {}: not a regular file or directory", file_name);
        return None;
    };

    let descriptor = match kind {
        PluginKind::Directory => match read_descriptor(path) {
            Ok(descriptor) => descriptor.unwrap_or_default(),
            Err(e) => {
                warn!("Ignoring descriptor for {}: {}", file_name, e);
                PluginDescriptor::default()
            }
        },
        PluginKind::File => PluginDescriptor::default(),
    };

    Some(PluginEntry {
        id: non_empty(descriptor.id).unwrap_or_else(|| sanitize_identifier(&file_name)),
        name: non_empty(descriptor.name).unwrap_or_else(|| file_name.clone()),
        version: non_empty(descriptor.version)
            .unwrap_or_else(|| StoreConfig::DEFAULT_VERSION.to_string()),
        description: non_empty(descriptor.description)
            .unwrap_or_else(|| StoreConfig::DEFAULT_DESCRIPTION.to_string()),
        file_name,
        path: path.to_path_buf(),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("my-plugin_1.0"), "my-plugin_1.0");
        assert_eq!(sanitize_identifier("My Plugin (beta)"), "My-Plugin--beta-");
        assert_eq!(sanitize_identifier("日本"), "--");
        assert_eq!(sanitize_identifier("   "), "plugin");
    }

    #[test]
    fn test_descriptor_fields_win() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("weather widget");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("plugin.json"),
            r#"{"id":"com.example.weather","name":"Weather","version":"2.1.0","description":"Forecasts"}"#,
        )
        .unwrap();

        let entry = resolve_entry(&dir).unwrap();
        assert_eq!(entry.id, "com.example.weather");
        assert_eq!(entry.name, "Weather");
        assert_eq!(entry.version, "2.1.0");
        assert_eq!(entry.description, "Forecasts");
        assert_eq!(entry.file_name, "weather widget");
        assert_eq!(entry.kind, PluginKind::Directory);
    }

    #[test]
    fn test_defaults_without_descriptor() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("weather widget");
        std::fs::create_dir_all(&dir).unwrap();

        let entry = resolve_entry(&dir).unwrap();
        assert_eq!(entry.id, "weather-widget");
        assert_eq!(entry.name, "weather widget");
        assert_eq!(entry.version, "none");
        assert_eq!(entry.description, "No description available");
    }

    #[test]
    fn test_empty_fields_fall_back() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("clock");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("plugin.json"), r#"{"id":"","name":"  "}"#).unwrap();

        let entry = resolve_entry(&dir).unwrap();
        assert_eq!(entry.id, "clock");
        assert_eq!(entry.name, "clock");
    }

    #[test]
    fn test_malformed_descriptor_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("broken");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("plugin.json"), "{ not json").unwrap();

        assert!(read_descriptor(&dir).is_err());
        let entry = resolve_entry(&dir).unwrap();
        assert_eq!(entry.id, "broken");
        assert_eq!(entry.version, "none");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_entries_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let outside = temp_dir.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("plugin.json"), r#"{"id":"stolen"}"#).unwrap();

        let link = temp_dir.path().join("root-link");
        std::os::unix::fs::symlink(&outside, &link).unwrap();
        assert!(resolve_entry(&link).is_none());

        let plugin = temp_dir.path().join("real");
        std::fs::create_dir_all(&plugin).unwrap();
        std::os::unix::fs::symlink(outside.join("plugin.json"), plugin.join("plugin.json"))
            .unwrap();
        assert!(read_descriptor(&plugin).unwrap().is_none());
        assert_eq!(resolve_entry(&plugin).unwrap().id, "real");
    }

    #[test]
    fn test_file_entry() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("standalone.wasm");
        std::fs::write(&file, b"\0asm").unwrap();

        let entry = resolve_entry(&file).unwrap();
        assert_eq!(entry.kind, PluginKind::File);
        assert_eq!(entry.id, "standalone.wasm");
        assert_eq!(entry.download_file_name(), "standalone.wasm");
    }
}
