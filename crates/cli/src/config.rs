//! Configuration loading from purser.toml.

use capabilities::CapabilitySet;
use connector::{EndpointConfig, TransportKind};
use runtime::{DEFAULT_MODEL, TOKEN_ENV_VAR};
use serde::Deserialize;
use std::path::Path;

/// Default remote tool source (the sentiment-analysis MCP server).
const DEFAULT_ENDPOINT_URL: &str =
    "https://joabyssinia-mcp-sentiment.hf.space/gradio_api/mcp/sse";

/// Top-level configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Remote tool source endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: EndpointConfig,

    /// Model backend configuration.
    #[serde(default)]
    pub model: ModelConfig,

    /// Agent configuration.
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Model backend configuration.
#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    /// Hosted model to use.
    #[serde(default = "default_model")]
    pub model: String,

    /// Inference API token. The HUGGINGFACE_API_TOKEN environment variable
    /// takes precedence.
    pub api_token: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_token: None,
        }
    }
}

/// Agent configuration.
#[derive(Debug, Default, Deserialize)]
pub struct AgentConfig {
    /// Declared side-capability allow-list.
    #[serde(default)]
    pub capabilities: CapabilitySet,
}

fn default_endpoint() -> EndpointConfig {
    EndpointConfig {
        url: DEFAULT_ENDPOINT_URL.to_string(),
        transport: TransportKind::Sse,
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Create a default configuration.
    pub fn default_config() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: ModelConfig::default(),
            agent: AgentConfig::default(),
        }
    }

    /// Resolve the inference API token: environment first, config second.
    pub fn token(&self) -> Result<String, ConfigError> {
        self.resolve_token(std::env::var(TOKEN_ENV_VAR).ok())
    }

    fn resolve_token(&self, env_token: Option<String>) -> Result<String, ConfigError> {
        env_token
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.model.api_token.clone())
            .ok_or(ConfigError::MissingToken)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("credential not configured: set {TOKEN_ENV_VAR} or model.api_token")]
    MissingToken,
}

#[cfg(test)]
mod tests {
    use super::*;
    use capabilities::Capability;

    #[test]
    fn defaults() {
        let config = Config::default_config();
        assert_eq!(config.endpoint.url, DEFAULT_ENDPOINT_URL);
        assert_eq!(config.endpoint.transport, TransportKind::Sse);
        assert_eq!(config.model.model, DEFAULT_MODEL);
        assert!(config.agent.capabilities.allows(Capability::Json));
    }

    #[test]
    fn parse_full_config() {
        let config = Config::parse(
            r#"
            [endpoint]
            url = "https://example.test/sse"
            transport = "sse"

            [model]
            model = "some/other-model"
            api_token = "hf_config"

            [agent]
            capabilities = ["json", "base64"]
            "#,
        )
        .unwrap();

        assert_eq!(config.endpoint.url, "https://example.test/sse");
        assert_eq!(config.model.model, "some/other-model");
        assert!(!config.agent.capabilities.allows(Capability::Ast));
    }

    #[test]
    fn unknown_capability_fails_parse() {
        let err = Config::parse(
            r#"
            [agent]
            capabilities = ["subprocess"]
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn token_resolution_order() {
        let config = Config::parse(r#"model = { api_token = "hf_config" }"#).unwrap();
        assert_eq!(config.resolve_token(Some("hf_env".into())).unwrap(), "hf_env");
        assert_eq!(config.resolve_token(Some("  ".into())).unwrap(), "hf_config");
        assert_eq!(config.resolve_token(None).unwrap(), "hf_config");

        let bare = Config::default_config();
        assert!(matches!(
            bare.resolve_token(None),
            Err(ConfigError::MissingToken)
        ));
    }
}
