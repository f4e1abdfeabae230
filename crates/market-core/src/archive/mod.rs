//! Archive handling: unpacking downloaded bundles and packing plugin
//! directories for download.
//!
//! Both operations are synchronous; async callers run them through
//! `tokio::task::spawn_blocking`.

mod compress;
mod extract;

pub use compress::pack_directory;
pub use extract::{extract_bundle, BundleFormat};
