//! OpenRouter client: chat completions and embeddings over HTTPS.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{ChatMessage, ChatResponse, Embedder, LlmClient, ToolSchema};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Client for the OpenRouter OpenAI-compatible API.
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    embed_model: String,
}

impl OpenRouterClient {
    pub fn new(api_key: String, embed_model: String) -> Self {
        Self::with_base_url(api_key, embed_model, DEFAULT_BASE_URL.to_string())
    }

    /// Point the client at a different base URL (used in tests).
    pub fn with_base_url(api_key: String, embed_model: String, base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("reqwest client construction cannot fail with static options");

        Self {
            client,
            api_key,
            base_url,
            embed_model,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<super::ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingObject>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingObject {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> anyhow::Result<ChatResponse> {
        let mut body = json!({
            "model": model,
            "messages": messages,
        });
        if let Some(tools) = tools {
            body["tools"] = serde_json::to_value(tools)?;
        }

        debug!("Chat completion request to model {}", model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completion failed with {}: {}", status, text);
        }

        let completion: CompletionResponse = response.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Provider returned no choices"))?;

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls,
        })
    }
}

#[async_trait]
impl Embedder for OpenRouterClient {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.embed_model,
                "input": texts,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding request failed with {}: {}", status, text);
        }

        let mut parsed: EmbeddingsResponse = response.json().await?;
        // Providers may return vectors out of order; the index field is authoritative.
        parsed.data.sort_by_key(|obj| obj.index);
        if parsed.data.len() != texts.len() {
            anyhow::bail!(
                "Provider returned {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            );
        }

        Ok(parsed.data.into_iter().map(|obj| obj.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[tokio::test]
    async fn test_chat_completion_parses_tool_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "choices": [{
                        "message": {
                            "content": null,
                            "tool_calls": [{
                                "id": "call_1",
                                "type": "function",
                                "function": {"name": "api_tool", "arguments": "{\"query\":\"list engagements\"}"}
                            }]
                        }
                    }]
                }"#,
            )
            .create_async()
            .await;

        let client = OpenRouterClient::with_base_url(
            "test-key".to_string(),
            "openai/text-embedding-3-small".to_string(),
            server.url(),
        );
        let messages = vec![ChatMessage::user("list engagements")];
        let response = client
            .chat_completion("openai/gpt-4o", &messages, None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(response.has_tool_calls());
        let calls = response.tool_calls.unwrap();
        assert_eq!(calls[0].function.name, "api_tool");
        assert_eq!(messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_embed_orders_by_index() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "data": [
                        {"index": 1, "embedding": [0.0, 1.0]},
                        {"index": 0, "embedding": [1.0, 0.0]}
                    ]
                }"#,
            )
            .create_async()
            .await;

        let client = OpenRouterClient::with_base_url(
            "test-key".to_string(),
            "openai/text-embedding-3-small".to_string(),
            server.url(),
        );
        let vectors = client
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors[0], vec![1.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0]);
    }
}
