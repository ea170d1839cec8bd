//! HTTP surface: health check and the streaming chat endpoint.

mod chat;
mod routes;
mod types;

pub use routes::{build_state, router, serve, AppState};
pub use types::{ChatRequest, HealthResponse};
