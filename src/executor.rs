//! Per-query orchestration: pick a tool, resolve auth, load the spec, then
//! simulate or delegate to the planner.
//!
//! `execute` never fails past its boundary. Every internal error is rendered
//! as an explanatory string so the control loop always receives a normal
//! tool result.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::auth::AuthResolver;
use crate::catalog::ToolDescriptor;
use crate::index::ToolIndex;
use crate::openapi::{ReducedSpec, SpecClient, SpecError};
use crate::planner::{ApiPlanner, HttpTransport, PlannerRequest};
use crate::session::SessionContext;

/// Pluggable classifier for exploratory ("how do I...") questions.
///
/// A heuristic, not a guarantee: false positives and negatives are acceptable.
/// It exists to skip the cost and latency of a live API call when the user is
/// asking about an API rather than asking it something.
pub type ExploratoryPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

const EXPLORATORY_KEYWORDS: &[&str] = &["how", "example", "usage", "explain"];

/// The default keyword predicate.
pub fn default_exploratory_predicate() -> ExploratoryPredicate {
    Arc::new(|query: &str| {
        let lowered = query.to_lowercase();
        EXPLORATORY_KEYWORDS.iter().any(|kw| lowered.contains(kw))
    })
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("No suitable API found for this query")]
    NoToolMatch,

    #[error("Could not select an API tool: {0}")]
    Retrieval(anyhow::Error),

    #[error("Failed to load the API specification: {0}")]
    SpecLoad(#[from] SpecError),

    #[error("Cannot call the '{tool}' API: missing credential(s) {names:?}. \
             Set them in the environment or answer the prompt and retry.")]
    AuthUnresolved { tool: String, names: Vec<String> },

    #[error("The '{tool}' API call failed: {reason}")]
    Planner { tool: String, reason: anyhow::Error },
}

/// Orchestrates one query end to end.
pub struct ToolExecutor {
    index: Arc<ToolIndex>,
    auth: Arc<AuthResolver>,
    specs: SpecClient,
    planner: Arc<dyn ApiPlanner>,
    exploratory: ExploratoryPredicate,
}

impl ToolExecutor {
    pub fn new(
        index: Arc<ToolIndex>,
        auth: Arc<AuthResolver>,
        planner: Arc<dyn ApiPlanner>,
    ) -> Self {
        Self {
            index,
            auth,
            specs: SpecClient::new(),
            planner,
            exploratory: default_exploratory_predicate(),
        }
    }

    /// Replace the exploratory classifier.
    pub fn with_exploratory_predicate(mut self, predicate: ExploratoryPredicate) -> Self {
        self.exploratory = predicate;
        self
    }

    /// Answer a query, always returning user-facing text.
    pub async fn execute(&self, session: &SessionContext, query: &str) -> String {
        match self.try_execute(session, query).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Query failed: {}", e);
                e.to_string()
            }
        }
    }

    async fn try_execute(
        &self,
        session: &SessionContext,
        query: &str,
    ) -> Result<String, ExecError> {
        info!("Finding optimal API tool for: {}", query);
        let (tool, score) = self
            .index
            .find_best(query)
            .await
            .map_err(ExecError::Retrieval)?
            .ok_or(ExecError::NoToolMatch)?;
        info!("Selected API tool: {} with score: {:.4}", tool.id, score);

        let header_template = tool.header_auth.clone().unwrap_or_default();
        let body_template = tool.body_auth.clone().unwrap_or_default();
        let headers = self
            .auth
            .resolve(&session.credentials, &header_template)
            .await;
        let body = self.auth.resolve(&session.credentials, &body_template).await;

        let spec = self.specs.load(&tool.spec_url).await?;

        if (self.exploratory)(query) {
            info!("Query classified as exploratory, skipping live call");
            return Ok(simulated_answer(&tool, &spec));
        }

        // A literal `{NAME}` must never reach a live endpoint.
        let mut missing: Vec<String> = headers.unresolved.clone();
        missing.extend(body.unresolved.iter().cloned());
        if !missing.is_empty() {
            return Err(ExecError::AuthUnresolved {
                tool: tool.id.clone(),
                names: missing,
            });
        }

        let mut all_headers = tool.headers.clone().unwrap_or_default();
        all_headers.extend(headers.values);

        let transport = HttpTransport::new(&all_headers).map_err(|reason| ExecError::Planner {
            tool: tool.id.clone(),
            reason,
        })?;

        self.planner
            .run(PlannerRequest {
                spec: &spec,
                transport: &transport,
                body: &body.values,
                query,
            })
            .await
            .map_err(|reason| ExecError::Planner {
                tool: tool.id.clone(),
                reason,
            })
    }
}

/// Templated answer for exploratory questions: describes how the selected API
/// would be used without calling it.
fn simulated_answer(tool: &ToolDescriptor, spec: &ReducedSpec) -> String {
    let server = spec
        .servers
        .first()
        .map(String::as_str)
        .unwrap_or("(no server declared)");
    let endpoint = spec
        .endpoints
        .first()
        .map(|e| e.route())
        .unwrap_or_else(|| "(no endpoints declared)".to_string());

    format!(
        "This question can be answered with the '{id}' API.\n\
         Base URL: {server}\n\
         Example endpoint: {endpoint}\n\
         Full specification: {spec_url}\n\n\
         For instance, a request to {endpoint} at {server} would return the \
         relevant records. Ask a concrete question (e.g. about specific \
         records) and I will call the API for you.",
        id = tool.id,
        server = server,
        endpoint = endpoint,
        spec_url = tool.spec_url,
    )
}
