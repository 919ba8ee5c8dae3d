use serde::{Deserialize, Serialize};

use crate::batch::GenerationParams;
use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Default generation parameters for every item.
    #[serde(default)]
    pub generation: GenerationParams,
}

/// Remote endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// API base URL (e.g., "https://api.runpod.ai/v2")
    #[serde(default = "default_url")]
    pub url: String,
    /// Serverless endpoint ID
    pub endpoint_id: String,
    /// API key (sent as a bearer token)
    pub api_key: String,
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_url() -> String {
    "https://api.runpod.ai/v2".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub endpoint: SanitizedEndpointConfig,
    pub orchestrator: OrchestratorConfig,
    pub generation: GenerationParams,
}

/// Sanitized endpoint config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEndpointConfig {
    pub url: String,
    pub endpoint_id: String,
    pub api_key_configured: bool,
    pub request_timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            endpoint: SanitizedEndpointConfig {
                url: config.endpoint.url.clone(),
                endpoint_id: config.endpoint.endpoint_id.clone(),
                api_key_configured: !config.endpoint.api_key.is_empty(),
                request_timeout_secs: config.endpoint.request_timeout_secs,
            },
            orchestrator: config.orchestrator.clone(),
            generation: config.generation.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[endpoint]
endpoint_id = "abc123"
api_key = "secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.endpoint.endpoint_id, "abc123");
        assert_eq!(config.endpoint.url, "https://api.runpod.ai/v2");
        assert_eq!(config.endpoint.request_timeout_secs, 30);
        assert_eq!(config.orchestrator.batch_size, 3);
        assert_eq!(config.generation, GenerationParams::default());
    }

    #[test]
    fn test_deserialize_missing_endpoint_fails() {
        let toml = r#"
[orchestrator]
batch_size = 4
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_generation_defaults() {
        let toml = r#"
[endpoint]
endpoint_id = "abc123"
api_key = "secret"

[generation]
temperature = 1.5
top_p = 0.95
top_k = 50
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.generation.temperature, 1.5);
        assert_eq!(config.generation.top_p, 0.95);
        assert_eq!(config.generation.top_k, 50);
        assert_eq!(config.generation.max_new_tokens, 3072);
    }

    #[test]
    fn test_sanitized_config_hides_api_key() {
        let toml = r#"
[endpoint]
endpoint_id = "abc123"
api_key = "secret-key"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);

        assert!(sanitized.endpoint.api_key_configured);
        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret-key"));
    }
}
