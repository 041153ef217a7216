use std::path::{Path, PathBuf};

use gateway_common::config::SystemConfig;

use super::validation;

/// Complete gateway configuration loaded from the config directory plus
/// environment-sourced secrets (SPEC_FULL.md §4.13).
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Parsed `system.toml`.
    pub system: SystemConfig,
    /// OpenAI API key, read from `system.providers.openai.api_key_env`.
    pub openai_api_key: Option<String>,
    /// Gemini API key, read from `system.providers.gemini.api_key_env`.
    pub gemini_api_key: Option<String>,
    /// Postgres DSN, read from `system.state.database.dsn_env` when state is
    /// enabled.
    pub state_dsn: Option<String>,
    #[allow(dead_code)]
    pub config_dir: PathBuf,
}

impl GatewayConfig {
    pub fn openai_base_url(&self) -> &str {
        self.system
            .providers
            .openai
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1")
    }

    pub fn gemini_base_url(&self) -> &str {
        self.system
            .providers
            .gemini
            .base_url
            .as_deref()
            .unwrap_or("https://generativelanguage.googleapis.com/v1beta/openai")
    }
}

/// Load all configuration from the given config directory. Fails loudly with
/// clear error messages if anything is misconfigured; the gateway refuses to
/// start on validation failure (spec.md §4.13).
pub fn load_config(config_dir: &Path) -> Result<GatewayConfig, ConfigError> {
    tracing::info!(config_dir = %config_dir.display(), "Loading configuration");

    let system_path = config_dir.join("system.toml");
    let system = load_system_config(&system_path)?;

    let openai_api_key = read_env_opt(&system.providers.openai.api_key_env);
    let gemini_api_key = read_env_opt(&system.providers.gemini.api_key_env);
    let state_dsn = if system.state.enabled {
        Some(read_env_required(&system.state.database.dsn_env)?)
    } else {
        None
    };

    let config = GatewayConfig {
        system,
        openai_api_key,
        gemini_api_key,
        state_dsn,
        config_dir: config_dir.to_path_buf(),
    };

    validation::validate(&config)?;

    tracing::info!("Configuration loaded successfully");
    Ok(config)
}

fn read_env_opt(var: &str) -> Option<String> {
    if var.is_empty() {
        return None;
    }
    match std::env::var(var) {
        Ok(v) if !v.is_empty() => Some(v),
        _ => {
            tracing::warn!(env_var = var, "Environment variable not set or empty");
            None
        }
    }
}

fn read_env_required(var: &str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| {
        ConfigError::Validation(format!(
            "state.enabled=true but env var '{}' (state.database.dsn_env) is not set",
            var
        ))
    })
}

fn load_system_config(path: &Path) -> Result<SystemConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}
