//! Network access to the remote artifact repository.
//!
//! This module provides:
//! - HTTP client with bearer auth and rate limit tracking
//! - The [`ArtifactSource`] seam and its GitHub implementation
//! - Artifact selection by name and creation time
//! - Bundle downloads into the scratch directory

mod artifacts;
mod client;
mod download;

pub use artifacts::{select_artifacts, ArtifactSource, GitHubArtifactSource};
pub use client::{extract_domain, HttpClient, RateLimitState};
pub use download::DownloadManager;
