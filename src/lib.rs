pub mod access_log;
pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod render;
pub mod routes;
pub mod store;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use middleware::{AccessLog, CatchPanic};
