use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Endpoint id, API key and URL are not empty
/// - Request timeout is not 0
/// - Orchestrator settings (see `OrchestratorConfig::validate`)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.endpoint.endpoint_id.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "endpoint.endpoint_id cannot be empty".to_string(),
        ));
    }

    if config.endpoint.api_key.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "endpoint.api_key cannot be empty".to_string(),
        ));
    }

    if config.endpoint.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "endpoint.url cannot be empty".to_string(),
        ));
    }

    if config.endpoint.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "endpoint.request_timeout_secs cannot be 0".to_string(),
        ));
    }

    config
        .orchestrator
        .validate()
        .map_err(|e| ConfigError::ValidationError(format!("orchestrator: {}", e)))?;

    Ok(())
}
