//! The single tool exposed to the model: answer a question via an external API.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::Tool;
use crate::executor::ToolExecutor;
use crate::session::SessionContext;

/// Wraps the `ToolExecutor` behind the model-facing tool interface.
pub struct ApiTool {
    executor: Arc<ToolExecutor>,
}

impl ApiTool {
    pub fn new(executor: Arc<ToolExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for ApiTool {
    fn name(&self) -> &str {
        "api_tool"
    }

    fn description(&self) -> &str {
        "Find and use the appropriate API to answer a query"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The question to answer using an external API"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, session: &SessionContext) -> anyhow::Result<String> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'query' argument"))?;

        // The executor converts its own failures to text; nothing to map here.
        Ok(self.executor.execute(session, query).await)
    }
}
