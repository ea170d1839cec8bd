//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One chat turn submitted by the front-end.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub message: String,

    /// Session to continue; omitted for a fresh conversation
    pub session_id: Option<Uuid>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}
