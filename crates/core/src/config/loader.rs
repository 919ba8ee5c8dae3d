use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment variables accepted without the `VOXBATCH_` prefix.
const PLAIN_ENV_KEYS: [(&str, &str); 2] = [
    ("RUNPOD_API_KEY", "endpoint.api_key"),
    ("ENDPOINT_ID", "endpoint.endpoint_id"),
];

/// Apply environment overrides on top of `figment`.
///
/// `RUNPOD_API_KEY` and `ENDPOINT_ID` are honored as-is; every other key
/// uses the `VOXBATCH_` prefix with `__` as the nesting separator
/// (e.g. `VOXBATCH_ORCHESTRATOR__BATCH_SIZE=4`).
fn with_env(figment: Figment) -> Figment {
    let plain = Env::raw()
        .only(&[PLAIN_ENV_KEYS[0].0, PLAIN_ENV_KEYS[1].0])
        .map(|key| {
            PLAIN_ENV_KEYS
                .iter()
                .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
                .map(|(_, path)| (*path).into())
                .unwrap_or_else(|| key.as_str().to_string().into())
        });

    figment
        .merge(plain)
        .merge(Env::prefixed("VOXBATCH_").split("__"))
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    with_env(Figment::new().merge(Toml::file(path)))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from environment variables only
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    with_env(Figment::new())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
