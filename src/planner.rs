//! The API planning agent boundary.
//!
//! `ApiPlanner` is the capability that, given a reduced spec and an HTTP
//! transport, answers a query against that API. The production `LlmPlanner`
//! keeps it deliberately small: one model call selects an endpoint and
//! parameters, the transport executes the request, a second call summarizes
//! the response. It is not a general-purpose OpenAPI client.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::llm::{ChatMessage, LlmClient};
use crate::openapi::ReducedSpec;

/// HTTP transport preconfigured with resolved auth headers.
pub struct HttpTransport {
    client: reqwest::Client,
    headers: HeaderMap,
}

impl HttpTransport {
    /// Build a transport carrying the given headers on every request.
    ///
    /// # Errors
    ///
    /// Fails when a header name or value is not valid HTTP.
    pub fn new(headers: &HashMap<String, String>) -> anyhow::Result<Self> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name: HeaderName = name.parse()?;
            let value: HeaderValue = value.parse()?;
            header_map.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .user_agent("apilot/0.3")
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            headers: header_map,
        })
    }

    /// Execute one request and return the response body as text.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&serde_json::Value>,
    ) -> anyhow::Result<String> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .headers(self.headers.clone())
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!("Planner request: {} {}", method, url);
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            anyhow::bail!("API returned HTTP {}: {}", status, truncate(&text, 500));
        }
        Ok(text)
    }
}

/// Planning-agent capability: answer a query against one described API.
#[async_trait]
pub trait ApiPlanner: Send + Sync {
    async fn run(&self, request: PlannerRequest<'_>) -> anyhow::Result<String>;
}

/// Everything the planner needs for one query.
pub struct PlannerRequest<'a> {
    pub spec: &'a ReducedSpec,
    pub transport: &'a HttpTransport,
    /// Resolved body template merged into request bodies.
    pub body: &'a HashMap<String, String>,
    pub query: &'a str,
}

/// The endpoint selection the model is asked to produce.
#[derive(Debug, Deserialize)]
struct PlanStep {
    method: String,
    path: String,
    #[serde(default)]
    query: HashMap<String, String>,
    #[serde(default)]
    body: Option<serde_json::Value>,
}

/// LLM-driven planner: select endpoint, call it, summarize.
pub struct LlmPlanner {
    llm: Arc<dyn LlmClient>,
    model: String,
    allow_dangerous_requests: bool,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn LlmClient>, model: String, allow_dangerous_requests: bool) -> Self {
        Self {
            llm,
            model,
            allow_dangerous_requests,
        }
    }

    async fn select_step(&self, spec: &ReducedSpec, query: &str) -> anyhow::Result<PlanStep> {
        let endpoints = spec
            .endpoints
            .iter()
            .map(|e| match &e.summary {
                Some(summary) => format!("- {} — {}", e.route(), summary),
                None => format!("- {}", e.route()),
            })
            .collect::<Vec<_>>()
            .join("\n");

        let system = format!(
            "You select one API endpoint to answer a user question.\n\
             Available endpoints:\n{endpoints}\n\n\
             Respond with a single JSON object and nothing else:\n\
             {{\"method\": \"GET\", \"path\": \"/...\", \"query\": {{}}, \"body\": null}}"
        );
        let messages = vec![ChatMessage::system(system), ChatMessage::user(query)];

        let response = self.llm.chat_completion(&self.model, &messages, None).await?;
        let content = response
            .content
            .ok_or_else(|| anyhow::anyhow!("Planner model returned no content"))?;

        let step: PlanStep = serde_json::from_str(strip_code_fences(&content))
            .map_err(|e| anyhow::anyhow!("Planner produced unparseable step ({e}): {content}"))?;
        Ok(step)
    }

    async fn summarize(&self, query: &str, route: &str, body: &str) -> anyhow::Result<String> {
        let messages = vec![
            ChatMessage::system(
                "Summarize the API response below to answer the user's question. \
                 Be concise and only state what the data supports.",
            ),
            ChatMessage::user(format!(
                "Question: {query}\n\nEndpoint called: {route}\n\nResponse:\n{}",
                truncate(body, 8000)
            )),
        ];
        let response = self.llm.chat_completion(&self.model, &messages, None).await?;
        response
            .content
            .ok_or_else(|| anyhow::anyhow!("Summarizer model returned no content"))
    }
}

#[async_trait]
impl ApiPlanner for LlmPlanner {
    async fn run(&self, request: PlannerRequest<'_>) -> anyhow::Result<String> {
        let step = self.select_step(request.spec, request.query).await?;

        let method: Method = step.method.to_uppercase().parse()?;
        if method != Method::GET && !self.allow_dangerous_requests {
            anyhow::bail!(
                "Planner selected {} {} but non-GET requests are disabled",
                method,
                step.path
            );
        }

        let base = request
            .spec
            .servers
            .first()
            .ok_or_else(|| anyhow::anyhow!("Spec declares no server URL"))?;
        let url = format!("{}{}", base.trim_end_matches('/'), step.path);

        // Merge the resolved body template into the planned body.
        let body = merge_body(step.body, request.body);

        let route = format!("{} {}", method, step.path);
        info!("Planner executing {}", route);

        let query: Vec<(String, String)> = step.query.into_iter().collect();
        let response = request
            .transport
            .execute(method, &url, &query, body.as_ref())
            .await?;

        self.summarize(request.query, &route, &response).await
    }
}

fn merge_body(
    planned: Option<serde_json::Value>,
    template: &HashMap<String, String>,
) -> Option<serde_json::Value> {
    if template.is_empty() {
        return planned;
    }
    let mut body = match planned {
        Some(serde_json::Value::Object(map)) => serde_json::Value::Object(map),
        Some(other) => other,
        None => json!({}),
    };
    if let Some(map) = body.as_object_mut() {
        for (key, value) in template {
            map.insert(key.clone(), json!(value));
        }
    }
    Some(body)
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, ToolSchema};
    use crate::openapi;

    struct ScriptedLlm {
        responses: std::sync::Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<&str>) -> Arc<Self> {
            Arc::new(Self {
                responses: std::sync::Mutex::new(
                    responses.into_iter().rev().map(String::from).collect(),
                ),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
            _tools: Option<&[ToolSchema]>,
        ) -> anyhow::Result<ChatResponse> {
            let content = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("no scripted response left"))?;
            Ok(ChatResponse {
                content: Some(content),
                tool_calls: None,
            })
        }
    }

    fn spec_for(server: &str) -> ReducedSpec {
        let doc: serde_yaml::Value = serde_yaml::from_str(&format!(
            r#"
openapi: 3.0.0
servers:
  - url: {server}
paths:
  /engagements:
    get:
      summary: List engagements
"#
        ))
        .unwrap();
        openapi::reduce("http://x/openapi.yaml", &doc).unwrap()
    }

    #[tokio::test]
    async fn test_planner_calls_endpoint_and_summarizes() {
        let mut server = mockito::Server::new_async().await;
        let api = server
            .mock("GET", "/engagements")
            .match_header("authorization", "Bearer secret123")
            .with_status(200)
            .with_body(r#"[{"id": 1, "title": "Kickoff"}]"#)
            .create_async()
            .await;

        let llm = ScriptedLlm::new(vec![
            r#"{"method": "GET", "path": "/engagements", "query": {}, "body": null}"#,
            "You have one engagement: Kickoff.",
        ]);
        let planner = LlmPlanner::new(llm, "openai/gpt-4o".to_string(), true);

        let headers =
            HashMap::from([("Authorization".to_string(), "Bearer secret123".to_string())]);
        let transport = HttpTransport::new(&headers).unwrap();
        let spec = spec_for(&server.url());
        let body = HashMap::new();

        let answer = planner
            .run(PlannerRequest {
                spec: &spec,
                transport: &transport,
                body: &body,
                query: "list all engagements",
            })
            .await
            .unwrap();

        api.assert_async().await;
        assert_eq!(answer, "You have one engagement: Kickoff.");
    }

    #[tokio::test]
    async fn test_non_get_rejected_when_dangerous_disabled() {
        let llm = ScriptedLlm::new(vec![
            r#"{"method": "DELETE", "path": "/engagements", "query": {}, "body": null}"#,
        ]);
        let planner = LlmPlanner::new(llm, "openai/gpt-4o".to_string(), false);

        let transport = HttpTransport::new(&HashMap::new()).unwrap();
        let spec = spec_for("http://localhost:1");
        let body = HashMap::new();

        let err = planner
            .run(PlannerRequest {
                spec: &spec,
                transport: &transport,
                body: &body,
                query: "delete everything",
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("non-GET requests are disabled"));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("{}"), "{}");
    }

    #[test]
    fn test_merge_body_injects_template() {
        let template = HashMap::from([("api_key".to_string(), "secret".to_string())]);
        let merged = merge_body(Some(json!({"q": "x"})), &template).unwrap();
        assert_eq!(merged["api_key"], "secret");
        assert_eq!(merged["q"], "x");

        assert!(merge_body(None, &HashMap::new()).is_none());
    }
}
