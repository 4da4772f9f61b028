//! Prediction service: HTTP API over a loaded artifact bundle

pub mod api;
pub mod config;

pub use api::{create_router, initialize_state, AppState};
pub use config::ServerConfig;
