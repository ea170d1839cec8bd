//! The tool catalog: descriptors for every externally callable API.
//!
//! Descriptors are loaded once from a YAML file with a `tools` list. When the
//! file is absent or malformed, loading falls back to a single hardcoded
//! descriptor so the assistant stays usable out of the box.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read tool config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse tool config {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("Duplicate tool id in catalog: {0}")]
    DuplicateId(String),
}

/// Pre-flight token acquisition request, carried through from configuration.
///
/// The field is modelled for forward compatibility but is not consulted
/// during credential resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: HashMap<String, String>,
}

/// Metadata describing one externally callable API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// Unique identifier within the catalog
    pub id: String,

    /// URL of the OpenAPI/Swagger document describing the API
    pub spec_url: String,

    /// Natural-language description; used as the retrieval key
    pub description: String,

    /// Static headers sent on every request to the API
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,

    /// Header template with `{NAME}` credential placeholders
    #[serde(default)]
    pub header_auth: Option<HashMap<String, String>>,

    /// Body template with `{NAME}` credential placeholders
    #[serde(default)]
    pub body_auth: Option<HashMap<String, String>>,

    /// Optional token acquisition request
    #[serde(default)]
    pub token_req: Option<TokenRequest>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
}

/// Immutable, process-lifetime collection of tool descriptors.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// Build a catalog from a list of descriptors, enforcing unique ids.
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<Self, CatalogError> {
        let mut seen = std::collections::HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.id.clone()) {
                return Err(CatalogError::DuplicateId(tool.id.clone()));
            }
        }
        Ok(Self { tools })
    }

    /// Load the catalog from a YAML config file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed, or contains
    /// duplicate ids. Callers wanting the hardcoded fallback should use
    /// [`ToolCatalog::load_or_default`].
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: CatalogFile =
            serde_yaml::from_str(&text).map_err(|source| CatalogError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        Self::new(file.tools)
    }

    /// Load the catalog, falling back to the hardcoded default descriptor on
    /// any failure. The failure is logged, never swallowed silently.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(catalog) if !catalog.is_empty() => {
                info!(
                    "Loaded {} tool descriptor(s) from {}",
                    catalog.len(),
                    path.display()
                );
                catalog
            }
            Ok(_) => {
                warn!(
                    "Tool config {} contains no tools, using hardcoded fallback",
                    path.display()
                );
                Self::fallback()
            }
            Err(e) => {
                warn!("{}; using hardcoded fallback", e);
                Self::fallback()
            }
        }
    }

    /// The built-in single-tool catalog used when no config file is usable.
    pub fn fallback() -> Self {
        Self {
            tools: vec![ToolDescriptor {
                id: "client-engagements".to_string(),
                spec_url: "http://localhost:8000/openapi.json".to_string(),
                description: "API to manage and retrieve client engagement records.".to_string(),
                headers: None,
                header_auth: Some(HashMap::new()),
                body_auth: None,
                token_req: None,
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Descriptors in load order. Order matters: retrieval ties are broken by
    /// catalog position.
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn get(&self, index: usize) -> Option<&ToolDescriptor> {
        self.tools.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn descriptor(id: &str) -> ToolDescriptor {
        ToolDescriptor {
            id: id.to_string(),
            spec_url: "http://localhost:8000/openapi.json".to_string(),
            description: format!("API {}", id),
            headers: None,
            header_auth: None,
            body_auth: None,
            token_req: None,
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = ToolCatalog::new(vec![descriptor("a"), descriptor("a")]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(id) if id == "a"));
    }

    #[test]
    fn test_load_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
tools:
  - id: hubspot
    spec_url: https://api.hubspot.example/openapi.yaml
    description: CRM engagements and contacts API.
    header_auth:
      Authorization: "Bearer {{HUBSPOT_KEY}}"
  - id: weather
    spec_url: https://weather.example/swagger.json
    description: Current weather and forecasts.
"#
        )
        .unwrap();

        let catalog = ToolCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.tools()[0].id, "hubspot");
        assert_eq!(
            catalog.tools()[0].header_auth.as_ref().unwrap()["Authorization"],
            "Bearer {HUBSPOT_KEY}"
        );
    }

    #[test]
    fn test_missing_file_falls_back() {
        let catalog = ToolCatalog::load_or_default(Path::new("/nonexistent/tools.yaml"));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.tools()[0].id, "client-engagements");
    }

    #[test]
    fn test_empty_tools_list_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tools: []").unwrap();
        let catalog = ToolCatalog::load_or_default(file.path());
        assert_eq!(catalog.tools()[0].id, "client-engagements");
    }
}
