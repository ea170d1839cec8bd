//! Tool abstraction and registry.
//!
//! The control loop dispatches model tool-call requests through an explicit
//! registry keyed by tool name. Each tool declares a JSON schema that is
//! handed to the model.

mod api_tool;

pub use api_tool::ApiTool;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{FunctionSchema, ToolSchema};
use crate::session::SessionContext;

/// A capability the model can invoke during the act step.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the tool's argument object.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value, session: &SessionContext) -> anyhow::Result<String>;
}

/// Lookup table of registered tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool schemas in registration order, in provider wire format.
    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolSchema {
                schema_type: "function".to_string(),
                function: FunctionSchema {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters_schema(),
                },
            })
            .collect()
    }

    /// Execute a named tool; unknown names become a tool-level error string
    /// so the model can recover.
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        session: &SessionContext,
    ) -> anyhow::Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;
        tool.execute(args, session).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the query back."
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {"query": {"type": "string"}}})
        }

        async fn execute(&self, args: Value, _session: &SessionContext) -> anyhow::Result<String> {
            Ok(args["query"].as_str().unwrap_or_default().to_string())
        }
    }

    #[tokio::test]
    async fn test_registry_dispatch() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let session = SessionContext::new();

        let out = registry
            .execute("echo", json!({"query": "hi"}), &session)
            .await
            .unwrap();
        assert_eq!(out, "hi");

        let err = registry
            .execute("missing", json!({}), &session)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown tool"));
    }

    #[test]
    fn test_schemas_in_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let schemas = registry.get_tool_schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].function.name, "echo");
        assert_eq!(schemas[0].schema_type, "function");
    }
}
