//! Plugin listing and download.

use super::ApiError;
use crate::server::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use futures::StreamExt;
use market_core::{MarketError, PluginExport, PluginListResponse};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

pub async fn list_plugins(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PluginListResponse>, ApiError> {
    let entries = state.store.list().await?;
    debug!("Listing {} plugins", entries.len());
    Ok(Json(PluginListResponse {
        plugins: entries.iter().map(|e| e.to_summary()).collect(),
    }))
}

pub async fn download_plugin(
    State(state): State<Arc<AppState>>,
    Path(plugin_id): Path<String>,
) -> Result<Response, ApiError> {
    let export = state
        .store
        .export(&plugin_id, &state.scratch_dir)
        .await?
        .ok_or_else(|| MarketError::PluginNotFound { id: plugin_id })?;

    let PluginExport {
        entry,
        file,
        len,
        content_type,
        temp_path,
    } = export;
    info!("Serving plugin {} ({} bytes)", entry.id, len);

    // The packed ZIP is deleted when the body stream is dropped.
    let stream = ReaderStream::new(tokio::fs::File::from_std(file)).map(move |chunk| {
        let _keep = &temp_path;
        chunk
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, len)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&entry.download_file_name()),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// `attachment` disposition with an ASCII `filename` and, when the name needs
/// it, an RFC 5987 `filename*`.
fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if ascii == file_name {
        format!("attachment; filename=\"{}\"", ascii)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            ascii,
            urlencoding::encode(file_name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("weather.zip"),
            "attachment; filename=\"weather.zip\""
        );
        assert_eq!(
            content_disposition("my plugin.zip"),
            "attachment; filename=\"my plugin.zip\""
        );
        assert_eq!(
            content_disposition("日記.zip"),
            "attachment; filename=\"__.zip\"; filename*=UTF-8''%E6%97%A5%E8%A8%98.zip"
        );
        assert_eq!(
            content_disposition("a\"b.zip"),
            "attachment; filename=\"a_b.zip\"; filename*=UTF-8''a%22b.zip"
        );
    }
}
