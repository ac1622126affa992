//! HTTP surface for the translation chain
//!
//! Binds the chain under a path prefix (`/chain` by default) with
//! `invoke`, `batch`, `stream`, `input_schema` and `output_schema` routes.

pub mod config;
pub mod handlers;
pub mod server;

pub use config::ServerConfig;
pub use handlers::AppState;
pub use server::{build_router, serve, start_server};
