//! Chat endpoint: one message per request, loop progress streamed via SSE.
//!
//! Event order on the wire: `session` (the session id to reuse), zero or
//! more `update` events (one per plan/act step), then exactly one `final`
//! or `error` event.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::routes::AppState;
use super::types::{ChatRequest, HealthResponse};

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /chat
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = state.sessions.get_or_create(request.session_id).await;
    let session_id = session.id;
    info!("Chat turn for session {}", session_id);

    let (tx, mut rx) = mpsc::channel(32);
    let control = state.control.clone();
    let message = request.message.clone();
    let handle =
        tokio::spawn(async move { control.run(&session, &message, Some(tx)).await });

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("session").data(session_id.to_string()));

        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(data) => yield Ok(Event::default().event("update").data(data)),
                Err(e) => warn!("Failed to serialize loop event: {}", e),
            }
        }

        // The channel closes when the loop finishes; the join yields the answer.
        match handle.await {
            Ok(Ok(answer)) => {
                yield Ok(Event::default().event("final").data(answer));
            }
            Ok(Err(e)) => {
                yield Ok(Event::default().event("error").data(e.to_string()));
            }
            Err(e) => {
                yield Ok(Event::default().event("error").data(format!("Internal error: {}", e)));
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
