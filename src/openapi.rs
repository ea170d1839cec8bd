//! Fetching and reducing OpenAPI documents.
//!
//! A `ReducedSpec` keeps only what downstream planning needs: the base server
//! URL(s) and the declared endpoints in document order. Specs are fetched
//! fresh for every query; there is no persistent cache.

use serde_yaml::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("Failed to fetch spec from {url}: {source}")]
    Fetch {
        url: String,
        source: reqwest::Error,
    },

    #[error("Spec fetch from {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse spec from {url}: {source}")]
    Parse {
        url: String,
        source: serde_yaml::Error,
    },

    #[error("Document from {url} has no paths object")]
    NoPaths { url: String },
}

const HTTP_METHODS: &[&str] = &[
    "get", "post", "put", "delete", "patch", "head", "options", "trace",
];

/// One declared operation: method, path, and the raw operation object.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
    pub summary: Option<String>,
    pub operation: Value,
}

impl Endpoint {
    /// The `METHOD /path` form used in prompts and user-facing text.
    pub fn route(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// A normalized, endpoint-indexed view of an OpenAPI/Swagger document.
#[derive(Debug, Clone)]
pub struct ReducedSpec {
    pub title: Option<String>,
    /// Base server URLs in declaration order.
    pub servers: Vec<String>,
    /// Endpoints in document order.
    pub endpoints: Vec<Endpoint>,
}

/// Fetches spec documents over HTTP and reduces them.
pub struct SpecClient {
    client: reqwest::Client,
}

impl SpecClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent("apilot/0.3")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self { client }
    }

    /// GET the document at `url` and reduce it.
    ///
    /// The body is parsed as YAML, which also covers JSON documents.
    pub async fn load(&self, url: &str) -> Result<ReducedSpec, SpecError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| SpecError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpecError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|source| SpecError::Fetch {
            url: url.to_string(),
            source,
        })?;

        let doc: Value = serde_yaml::from_str(&text).map_err(|source| SpecError::Parse {
            url: url.to_string(),
            source,
        })?;

        reduce(url, &doc)
    }
}

impl Default for SpecClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduce a parsed OpenAPI 3 or Swagger 2 document.
pub fn reduce(url: &str, doc: &Value) -> Result<ReducedSpec, SpecError> {
    let title = doc
        .get("info")
        .and_then(|info| info.get("title"))
        .and_then(Value::as_str)
        .map(String::from);

    let servers = extract_servers(doc);

    let paths = doc
        .get("paths")
        .and_then(Value::as_mapping)
        .ok_or_else(|| SpecError::NoPaths {
            url: url.to_string(),
        })?;

    let mut endpoints = Vec::new();
    for (path, item) in paths {
        let Some(path) = path.as_str() else { continue };
        let Some(item) = item.as_mapping() else { continue };

        for (method, operation) in item {
            let Some(method) = method.as_str() else { continue };
            if !HTTP_METHODS.contains(&method) {
                continue;
            }
            let summary = operation
                .get("summary")
                .and_then(Value::as_str)
                .map(String::from);
            endpoints.push(Endpoint {
                method: method.to_uppercase(),
                path: path.to_string(),
                summary,
                operation: operation.clone(),
            });
        }
    }

    Ok(ReducedSpec {
        title,
        servers,
        endpoints,
    })
}

/// OpenAPI 3 `servers` list, with a Swagger 2 `host`/`basePath` fallback.
fn extract_servers(doc: &Value) -> Vec<String> {
    if let Some(servers) = doc.get("servers").and_then(Value::as_sequence) {
        return servers
            .iter()
            .filter_map(|s| s.get("url").and_then(Value::as_str))
            .map(String::from)
            .collect();
    }

    if let Some(host) = doc.get("host").and_then(Value::as_str) {
        let scheme = doc
            .get("schemes")
            .and_then(Value::as_sequence)
            .and_then(|s| s.first())
            .and_then(Value::as_str)
            .unwrap_or("https");
        let base_path = doc
            .get("basePath")
            .and_then(Value::as_str)
            .unwrap_or("");
        return vec![format!("{scheme}://{host}{base_path}")];
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENAPI_V3: &str = r#"
openapi: 3.0.0
info:
  title: Engagements API
servers:
  - url: https://api.example.com
  - url: https://staging.example.com
paths:
  /engagements:
    get:
      summary: List engagements
    post:
      summary: Create engagement
  /engagements/{id}:
    get:
      summary: Fetch one engagement
"#;

    #[test]
    fn test_reduce_openapi_v3() {
        let doc: Value = serde_yaml::from_str(OPENAPI_V3).unwrap();
        let spec = reduce("http://x/openapi.yaml", &doc).unwrap();

        assert_eq!(spec.title.as_deref(), Some("Engagements API"));
        assert_eq!(spec.servers[0], "https://api.example.com");
        assert_eq!(spec.endpoints.len(), 3);
        // Document order is preserved: the first declared endpoint wins.
        assert_eq!(spec.endpoints[0].route(), "GET /engagements");
        assert_eq!(
            spec.endpoints[0].summary.as_deref(),
            Some("List engagements")
        );
    }

    #[test]
    fn test_reduce_swagger_v2_host() {
        let doc: Value = serde_yaml::from_str(
            r#"
swagger: "2.0"
host: api.example.com
basePath: /v2
schemes: [https]
paths:
  /pets:
    get:
      summary: List pets
"#,
        )
        .unwrap();
        let spec = reduce("http://x/swagger.yaml", &doc).unwrap();
        assert_eq!(spec.servers, vec!["https://api.example.com/v2"]);
        assert_eq!(spec.endpoints[0].route(), "GET /pets");
    }

    #[test]
    fn test_reduce_json_body() {
        // JSON is valid YAML; the same parse path covers both.
        let doc: Value = serde_yaml::from_str(
            r#"{"openapi": "3.0.0", "servers": [{"url": "http://localhost:8000"}], "paths": {"/items": {"get": {}}}}"#,
        )
        .unwrap();
        let spec = reduce("http://x/openapi.json", &doc).unwrap();
        assert_eq!(spec.servers, vec!["http://localhost:8000"]);
        assert_eq!(spec.endpoints[0].route(), "GET /items");
    }

    #[test]
    fn test_missing_paths_is_an_error() {
        let doc: Value = serde_yaml::from_str("openapi: 3.0.0").unwrap();
        let err = reduce("http://x/openapi.yaml", &doc).unwrap_err();
        assert!(matches!(err, SpecError::NoPaths { .. }));
    }

    #[tokio::test]
    async fn test_load_fetches_and_reduces() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/openapi.yaml")
            .with_status(200)
            .with_body(OPENAPI_V3)
            .create_async()
            .await;

        let client = SpecClient::new();
        let spec = client
            .load(&format!("{}/openapi.yaml", server.url()))
            .await
            .unwrap();
        assert_eq!(spec.endpoints.len(), 3);
    }

    #[tokio::test]
    async fn test_load_non_2xx_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/openapi.yaml")
            .with_status(500)
            .create_async()
            .await;

        let client = SpecClient::new();
        let err = client
            .load(&format!("{}/openapi.yaml", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, SpecError::Status { status: 500, .. }));
    }
}
