//! The plan/act control loop.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::llm::{ChatMessage, LlmClient};
use crate::session::SessionContext;
use crate::tools::ToolRegistry;

use super::prompt::build_system_prompt;

#[derive(Debug, Error)]
pub enum LoopError {
    #[error("Could not reach a conclusion after {0} round(s)")]
    Exceeded(usize),

    #[error("Language model call failed: {0}")]
    Llm(anyhow::Error),

    #[error("Language model returned an empty response")]
    EmptyResponse,
}

/// Which loop state produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopNode {
    Plan,
    Act,
}

/// One observable step: the node that ran and the messages it appended.
#[derive(Debug, Clone, Serialize)]
pub struct LoopEvent {
    pub node: LoopNode,
    pub messages: Vec<ChatMessage>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl LoopEvent {
    fn new(node: LoopNode, messages: Vec<ChatMessage>) -> Self {
        Self {
            node,
            messages,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Two-state machine driving one conversation turn.
pub struct ControlLoop {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    model: String,
    max_rounds: usize,
}

impl ControlLoop {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        model: String,
        max_rounds: usize,
    ) -> Self {
        Self {
            llm,
            tools,
            model,
            max_rounds,
        }
    }

    /// Run the loop for one user message and return the final answer.
    ///
    /// Each round's node identity and appended message batch is sent to
    /// `events` as it is produced, so callers can stream progress. A closed
    /// receiver never stops the loop.
    ///
    /// # Errors
    ///
    /// Returns `LoopError::Exceeded` when the model keeps requesting tool
    /// calls past the round cap.
    pub async fn run(
        &self,
        session: &SessionContext,
        user_message: &str,
        events: Option<mpsc::Sender<LoopEvent>>,
    ) -> Result<String, LoopError> {
        let mut messages = vec![
            ChatMessage::system(build_system_prompt(&self.tools)),
            ChatMessage::user(user_message),
        ];

        let tool_schemas = self.tools.get_tool_schemas();

        for round in 0..self.max_rounds {
            debug!("Plan round {}", round + 1);

            // Plan: the model sees the full history and the tool schema.
            let response = self
                .llm
                .chat_completion(&self.model, &messages, Some(&tool_schemas))
                .await
                .map_err(LoopError::Llm)?;

            let assistant =
                ChatMessage::assistant(response.content.clone(), response.tool_calls.clone());
            messages.push(assistant.clone());
            emit(&events, LoopEvent::new(LoopNode::Plan, vec![assistant])).await;

            if !response.has_tool_calls() {
                // Terminal: the plan produced a final answer.
                return response.content.ok_or(LoopError::EmptyResponse);
            }

            // Act: execute each requested call and append its result.
            let tool_calls = response.tool_calls.unwrap_or_default();
            let mut batch = Vec::with_capacity(tool_calls.len());
            for call in &tool_calls {
                let args: serde_json::Value =
                    serde_json::from_str(&call.function.arguments).unwrap_or(serde_json::Value::Null);

                let result = self
                    .tools
                    .execute(&call.function.name, args, session)
                    .await;
                let result_str = match result {
                    Ok(output) => output,
                    Err(e) => format!("Error: {}", e),
                };

                let message = ChatMessage::tool_result(call.id.clone(), result_str);
                messages.push(message.clone());
                batch.push(message);
            }
            emit(&events, LoopEvent::new(LoopNode::Act, batch)).await;
        }

        Err(LoopError::Exceeded(self.max_rounds))
    }
}

async fn emit(events: &Option<mpsc::Sender<LoopEvent>>, event: LoopEvent) {
    if let Some(tx) = events {
        // Best effort: a disconnected consumer must not wedge the loop.
        let _ = tx.send(event).await;
    }
}
