//! Router assembly and shared application state.
//!
//! Every component is constructed once in `serve` and injected explicitly;
//! there are no module-level singletons.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent::ControlLoop;
use crate::auth::{AuthResolver, CredentialPrompt, NoPrompt};
use crate::catalog::ToolCatalog;
use crate::config::Config;
use crate::executor::ToolExecutor;
use crate::index::ToolIndex;
use crate::llm::{Embedder, LlmClient, OpenRouterClient};
use crate::planner::LlmPlanner;
use crate::session::SessionStore;
use crate::tools::{ApiTool, ToolRegistry};

use super::chat;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub control: Arc<ControlLoop>,
    pub sessions: Arc<SessionStore>,
}

/// Wire up all components from configuration.
///
/// The HTTP transport has no interactive channel, so the credential prompt
/// defaults to `NoPrompt`; front-ends with a side channel can inject their
/// own implementation.
pub fn build_state(config: &Config, prompt: Arc<dyn CredentialPrompt>) -> AppState {
    let catalog = Arc::new(ToolCatalog::load_or_default(&config.tools_config_path));
    let client = Arc::new(OpenRouterClient::new(
        config.api_key.clone(),
        config.embed_model.clone(),
    ));
    let embedder: Arc<dyn Embedder> = client.clone();
    let llm: Arc<dyn LlmClient> = client;

    let index = Arc::new(ToolIndex::new(catalog, embedder));
    let auth = Arc::new(AuthResolver::new(
        prompt,
        Duration::from_secs(config.prompt_timeout_secs),
    ));
    let planner = Arc::new(LlmPlanner::new(
        llm.clone(),
        config.default_model.clone(),
        config.allow_dangerous_requests,
    ));
    let executor = Arc::new(ToolExecutor::new(index, auth, planner));

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ApiTool::new(executor)));

    let control = Arc::new(ControlLoop::new(
        llm,
        Arc::new(registry),
        config.default_model.clone(),
        config.max_rounds,
    ));

    AppState {
        control,
        sessions: Arc::new(SessionStore::default()),
    }
}

/// Build the router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(chat::health))
        .route("/chat", post(chat::chat))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server and block until it exits.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = build_state(&config, Arc::new(NoPrompt));
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
