//! HTTP request handlers.

mod plugins;
mod status;

pub use plugins::{download_plugin, list_plugins};
pub use status::handle_health;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use market_core::MarketError;
use serde_json::json;
use tracing::error;

/// Error returned by handlers, rendered as `{"message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "Plugin not found".to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        match StatusCode::from_u16(err.status_code()) {
            Ok(StatusCode::NOT_FOUND) => ApiError::not_found(),
            Ok(status) => Self {
                status,
                message: err.to_string(),
            },
            Err(_) => ApiError::internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed: {}", self.message);
        }
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

/// Any route the router does not know.
pub async fn handle_not_found() -> ApiError {
    ApiError::not_found()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_map_through_status_code() {
        let err = ApiError::from(MarketError::PluginNotFound { id: "x".into() });
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Plugin not found");

        let err = ApiError::from(MarketError::Archive {
            message: "bad zip".into(),
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Archive error: bad zip");
    }
}
