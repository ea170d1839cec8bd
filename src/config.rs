//! Configuration management for apilot.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required. API key for the LLM/embeddings provider.
//! - `DEFAULT_MODEL` - Optional. The chat model to use. Defaults to `openai/gpt-4o`.
//! - `EMBED_MODEL` - Optional. Embedding model. Defaults to `openai/text-embedding-3-small`.
//! - `TOOLS_CONFIG_PATH` - Optional. Path to the tool catalog YAML. Defaults to `config/tools.yaml`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `MAX_ROUNDS` - Optional. Maximum plan/act rounds per conversation. Defaults to `8`.
//! - `PROMPT_TIMEOUT_SECS` - Optional. Interactive credential prompt timeout. Defaults to `120`.
//! - `ALLOW_DANGEROUS_REQUESTS` - Optional. Permit non-GET calls against target APIs. Defaults to `true`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Provider API key (OpenRouter format)
    pub api_key: String,

    /// Default chat model identifier
    pub default_model: String,

    /// Embedding model identifier for tool retrieval
    pub embed_model: String,

    /// Path to the tool catalog YAML file
    pub tools_config_path: PathBuf,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum plan/act rounds before the loop gives up
    pub max_rounds: usize,

    /// Interactive credential prompt timeout in seconds
    pub prompt_timeout_secs: u64,

    /// Whether the planner may issue non-GET requests against target APIs
    pub allow_dangerous_requests: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let default_model = std::env::var("DEFAULT_MODEL")
            .unwrap_or_else(|_| "openai/gpt-4o".to_string());

        let embed_model = std::env::var("EMBED_MODEL")
            .unwrap_or_else(|_| "openai/text-embedding-3-small".to_string());

        let tools_config_path = std::env::var("TOOLS_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/tools.yaml"));

        let host = std::env::var("HOST")
            .unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let max_rounds = std::env::var("MAX_ROUNDS")
            .unwrap_or_else(|_| "8".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("MAX_ROUNDS".to_string(), format!("{}", e)))?;

        let prompt_timeout_secs = std::env::var("PROMPT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("PROMPT_TIMEOUT_SECS".to_string(), format!("{}", e))
            })?;

        let allow_dangerous_requests = std::env::var("ALLOW_DANGEROUS_REQUESTS")
            .ok()
            .map(|v| {
                parse_bool(&v).map_err(|e| {
                    ConfigError::InvalidValue("ALLOW_DANGEROUS_REQUESTS".to_string(), e)
                })
            })
            .transpose()?
            .unwrap_or(true);

        Ok(Self {
            api_key,
            default_model,
            embed_model,
            tools_config_path,
            host,
            port,
            max_rounds,
            prompt_timeout_secs,
            allow_dangerous_requests,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, default_model: String, tools_config_path: PathBuf) -> Self {
        Self {
            api_key,
            default_model,
            embed_model: "openai/text-embedding-3-small".to_string(),
            tools_config_path,
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_rounds: 8,
            prompt_timeout_secs: 120,
            allow_dangerous_requests: true,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        assert!(parse_bool("yes").unwrap());
        assert!(parse_bool("On").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_new_defaults() {
        let config = Config::new(
            "key".to_string(),
            "openai/gpt-4o".to_string(),
            PathBuf::from("config/tools.yaml"),
        );
        assert_eq!(config.max_rounds, 8);
        assert_eq!(config.prompt_timeout_secs, 120);
        assert!(config.allow_dangerous_requests);
    }
}
