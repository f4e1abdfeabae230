//! Error types for the plugin market.
//!
//! Every fallible operation in the core crate returns [`MarketError`]. The
//! server maps variants onto HTTP statuses through [`MarketError::status_code`].

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the plugin market.
#[derive(Debug, Error)]
pub enum MarketError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Artifact API error: {message}")]
    ArtifactApi {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Archive errors
    #[error("Archive error: {message}")]
    Archive { message: String },

    // Store errors
    #[error("Plugin not found: {id}")]
    PluginNotFound { id: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for plugin market operations.
pub type Result<T> = std::result::Result<T, MarketError>;

impl From<std::io::Error> for MarketError {
    fn from(err: std::io::Error) -> Self {
        MarketError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for MarketError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MarketError::Timeout(err.to_string())
        } else {
            MarketError::Network {
                message: err.to_string(),
                cause: err.url().map(|u| u.to_string()),
            }
        }
    }
}

impl From<zip::result::ZipError> for MarketError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => e.into(),
            other => MarketError::Archive {
                message: other.to_string(),
            },
        }
    }
}

impl From<walkdir::Error> for MarketError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        MarketError::Io {
            message: err.to_string(),
            path,
            source: err.into_io_error(),
        }
    }
}

impl MarketError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        MarketError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// HTTP status for an error raised while serving a request.
    pub fn status_code(&self) -> u16 {
        match self {
            MarketError::PluginNotFound { .. } => 404,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MarketError::PluginNotFound {
            id: "hello-world".into(),
        };
        assert_eq!(err.to_string(), "Plugin not found: hello-world");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            MarketError::PluginNotFound { id: "x".into() }.status_code(),
            404
        );
        assert_eq!(
            MarketError::Archive {
                message: "bad zip".into()
            }
            .status_code(),
            500
        );
    }

    #[test]
    fn test_zip_io_error_becomes_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: MarketError = zip::result::ZipError::Io(io).into();
        assert!(matches!(err, MarketError::Io { .. }));
    }
}
