//! Plugin descriptor and listing types.

use crate::config::StoreConfig;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Contents of an optional `plugin.json` sidecar inside a plugin directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Accepts `"1.2"` as well as `1.2`; descriptors in the wild use both.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Whether a store entry is a directory or a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Directory,
    File,
}

/// A resolved entry of the plugin store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEntry {
    /// Canonical identifier used for listing and lookup.
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    /// File name of the entry inside the store root.
    pub file_name: String,
    pub path: PathBuf,
    pub kind: PluginKind,
}

impl PluginEntry {
    /// File name offered to clients in `Content-Disposition`.
    pub fn download_file_name(&self) -> String {
        match self.kind {
            PluginKind::Directory => format!("{}.zip", self.file_name),
            PluginKind::File => self.file_name.clone(),
        }
    }

    pub fn to_summary(&self) -> PluginSummary {
        PluginSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            download_url: format!(
                "{}{}",
                StoreConfig::DOWNLOAD_ROUTE_PREFIX,
                urlencoding::encode(&self.id)
            ),
        }
    }
}

/// Plugin as returned by `GET /plugins`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSummary {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub download_url: String,
}

/// Body of `GET /plugins`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginListResponse {
    pub plugins: Vec<PluginSummary>,
}
