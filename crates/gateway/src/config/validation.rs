use super::loader::{ConfigError, GatewayConfig};

/// Validate the complete gateway configuration. Checks sane ranges on
/// numeric parameters and cross-validates that referenced values make
/// sense together. The gateway refuses to start on validation failure
/// (spec.md §4.13).
pub fn validate(config: &GatewayConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_api(config, &mut errors);
    validate_models(config, &mut errors);
    validate_specialists(config, &mut errors);
    validate_sticky_session(config, &mut errors);
    validate_state(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors.join("; ")))
    }
}

fn validate_api(config: &GatewayConfig, errors: &mut Vec<String>) {
    if config.system.api.public_model_id.trim().is_empty() {
        errors.push("api.public_model_id must not be empty".into());
    }
}

fn validate_models(config: &GatewayConfig, errors: &mut Vec<String>) {
    if config.system.models.classifier.trim().is_empty() {
        errors.push("models.classifier must not be empty".into());
    }
}

fn validate_specialists(config: &GatewayConfig, errors: &mut Vec<String>) {
    for domain in gateway_common::SpecialistDomain::ALL {
        let key = domain.as_str();
        match config.system.specialists.by_domain.get(key) {
            Some(entry) if entry.model.trim().is_empty() => {
                errors.push(format!("specialists.by_domain.{key}.model must not be empty"));
            }
            None => {
                errors.push(format!(
                    "specialists.by_domain is missing a required entry for '{key}'"
                ));
            }
            _ => {}
        }
    }
}

fn validate_sticky_session(config: &GatewayConfig, errors: &mut Vec<String>) {
    let s = &config.system.sticky_session;
    if s.history_size == 0 {
        errors.push("sticky_session.history_size must be > 0".into());
    }
    if s.max_sessions < 64 {
        errors.push("sticky_session.max_sessions must be >= 64".into());
    }
}

fn validate_state(config: &GatewayConfig, errors: &mut Vec<String>) {
    let s = &config.system.state;
    if !s.enabled {
        return;
    }
    if s.database.dsn_env.trim().is_empty() {
        errors.push("state.database.dsn_env must be set when state.enabled=true".into());
    }
    if s.database.min_schema_version > s.database.max_schema_version {
        errors.push("state.database.min_schema_version must be <= max_schema_version".into());
    }
    if !["silent", "footer_warning"].contains(&s.decision.on_failure.as_str()) {
        errors.push("state.decision.on_failure must be 'silent' or 'footer_warning'".into());
    }
    if !["off", "mirror", "full"].contains(&s.projection.mode.as_str()) {
        errors.push("state.projection.mode must be 'off', 'mirror' or 'full'".into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_common::config::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn base_config() -> GatewayConfig {
        let mut by_domain = HashMap::new();
        for domain in gateway_common::SpecialistDomain::ALL {
            by_domain.insert(
                domain.as_str().to_string(),
                SpecialistModelConfig {
                    model: "gpt-5.2".into(),
                    prompt_file: None,
                },
            );
        }
        GatewayConfig {
            system: SystemConfig {
                server: ServerConfig::default(),
                api: ApiConfig::default(),
                providers: ProvidersConfig {
                    openai: ProviderCredentials {
                        api_key_env: "OPENAI_API_KEY".into(),
                        base_url: None,
                    },
                    gemini: ProviderCredentials {
                        api_key_env: "GEMINI_API_KEY".into(),
                        base_url: None,
                    },
                },
                models: ModelsConfig {
                    classifier: "gpt-5-nano".into(),
                    fallbacks: vec![],
                },
                specialists: SpecialistsConfig {
                    by_domain,
                    ..SpecialistsConfig::default()
                },
                sticky_session: StickySessionConfig::default(),
                state: StateConfig::default(),
                diagnostics: DiagnosticsConfig::default(),
                safety: SafetyLimits::default(),
            },
            openai_api_key: None,
            gemini_api_key: None,
            state_dsn: None,
            config_dir: PathBuf::from("config"),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn missing_specialist_entry_fails() {
        let mut config = base_config();
        config.system.specialists.by_domain.remove("homelab");
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("homelab")));
    }

    #[test]
    fn state_enabled_without_dsn_env_fails() {
        let mut config = base_config();
        config.system.state.enabled = true;
        config.system.state.database.dsn_env = String::new();
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("dsn_env")));
    }
}
