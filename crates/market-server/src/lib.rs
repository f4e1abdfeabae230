//! Market Server - HTTP front end for the plugin market.
//!
//! Serves the plugin store maintained by `market-core` and runs the periodic
//! artifact sync in the background.

pub mod config;
pub mod handlers;
pub mod server;

pub use config::Args;
pub use server::{build_router, start_server, AppState};
