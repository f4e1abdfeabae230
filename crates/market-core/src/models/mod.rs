//! Data models shared by the sync pipeline, the store and the HTTP layer.

mod artifact;
mod plugin;

pub use artifact::*;
pub use plugin::*;
