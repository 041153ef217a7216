use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level system configuration, deserialized from `config/system.toml`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub providers: ProvidersConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub specialists: SpecialistsConfig,
    #[serde(default)]
    pub sticky_session: StickySessionConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub safety: SafetyLimits,
}

/// HTTP server bind address and auth keys.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Bearer tokens accepted on `/v1/*`. An empty list disables auth
    /// (spec.md §6).
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default = "default_request_timeout_seconds")]
    pub upstream_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_keys: Vec::new(),
            upstream_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    60
}

/// The single public model id this gateway presents in `/v1/models`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_public_model_id")]
    pub public_model_id: String,
    /// If false, any incoming `model` field other than `public_model_id` is
    /// rejected with HTTP 400 (spec.md §6).
    #[serde(default)]
    pub allow_provider_model_passthrough: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            public_model_id: default_public_model_id(),
            allow_provider_model_passthrough: false,
        }
    }
}

fn default_public_model_id() -> String {
    "gateway".to_string()
}

/// Per-provider credentials and base URLs, read from env vars named in
/// config rather than storing secrets in the file itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub openai: ProviderCredentials,
    pub gemini: ProviderCredentials,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderCredentials {
    /// Env var holding the API key. Never stored in the TOML file itself.
    pub api_key_env: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Model routing table: the orchestrator's classifier model, the ordered
/// fallback chain, and the specialist → model mapping (C2).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub classifier: String,
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpecialistModelConfig {
    pub model: String,
    #[serde(default)]
    pub prompt_file: Option<String>,
}

/// Prompt Registry configuration (C1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpecialistsConfig {
    #[serde(default = "default_prompts_directory")]
    pub prompts_directory: PathBuf,
    #[serde(default = "default_orchestrator_prompt_file")]
    pub orchestrator_prompt_file: String,
    #[serde(default = "default_true")]
    pub auto_reload: bool,
    /// Keyed by the normalized domain string (`"personal_development"`, …).
    #[serde(default)]
    pub by_domain: HashMap<String, SpecialistModelConfig>,
}

impl Default for SpecialistsConfig {
    fn default() -> Self {
        Self {
            prompts_directory: default_prompts_directory(),
            orchestrator_prompt_file: default_orchestrator_prompt_file(),
            auto_reload: true,
            by_domain: HashMap::new(),
        }
    }
}

fn default_prompts_directory() -> PathBuf {
    PathBuf::from("prompts")
}

fn default_orchestrator_prompt_file() -> String {
    "_orchestrator.md".to_string()
}

fn default_true() -> bool {
    true
}

/// Sticky Session Store sizing (C3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StickySessionConfig {
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for StickySessionConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_history_size() -> usize {
    3
}

fn default_max_sessions() -> usize {
    4096
}

/// State subsystem configuration: schema migrator, decision engine,
/// per-writer enable flags, and the file projector (C7–C13).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub database: StateDatabaseConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub checkin: WriterToggle,
    #[serde(default)]
    pub journal: WriterToggle,
    #[serde(default)]
    pub memory: WriterToggle,
    #[serde(default)]
    pub projection: ProjectionConfig,
    #[serde(default = "default_context_fetch_limit")]
    pub context_checkins_limit: u32,
    #[serde(default = "default_context_fetch_limit")]
    pub context_journal_titles_limit: u32,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            database: StateDatabaseConfig::default(),
            decision: DecisionConfig::default(),
            checkin: WriterToggle::default(),
            journal: WriterToggle::default(),
            memory: WriterToggle::default(),
            projection: ProjectionConfig::default(),
            context_checkins_limit: default_context_fetch_limit(),
            context_journal_titles_limit: default_context_fetch_limit(),
        }
    }
}

fn default_context_fetch_limit() -> u32 {
    5
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateDatabaseConfig {
    /// Env var holding the Postgres DSN. Empty when state is disabled.
    #[serde(default)]
    pub dsn_env: String,
    #[serde(default = "default_true")]
    pub auto_migrate: bool,
    #[serde(default = "default_min_schema_version")]
    pub min_schema_version: String,
    #[serde(default = "default_max_schema_version")]
    pub max_schema_version: String,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StateDatabaseConfig {
    fn default() -> Self {
        Self {
            dsn_env: String::new(),
            auto_migrate: true,
            min_schema_version: default_min_schema_version(),
            max_schema_version: default_max_schema_version(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_min_schema_version() -> String {
    "0001".to_string()
}

fn default_max_schema_version() -> String {
    "0003".to_string()
}

fn default_connect_timeout_seconds() -> u64 {
    5
}

fn default_max_connections() -> u32 {
    10
}

/// State Decision Engine configuration (C9).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub model: Option<String>,
    #[serde(default = "default_max_json_retries")]
    pub max_json_retries: u32,
    /// `silent` | `footer_warning` (spec.md §4.11).
    #[serde(default = "default_on_failure")]
    pub on_failure: String,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: None,
            max_json_retries: default_max_json_retries(),
            on_failure: default_on_failure(),
        }
    }
}

fn default_max_json_retries() -> u32 {
    1
}

fn default_on_failure() -> String {
    "footer_warning".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WriterToggle {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for WriterToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// File Projector configuration (C12).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// `off` | `mirror` | `full` (spec.md §4.10).
    #[serde(default = "default_projection_mode")]
    pub mode: String,
    #[serde(default = "default_projection_directory")]
    pub output_directory: PathBuf,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            mode: default_projection_mode(),
            output_directory: default_projection_directory(),
        }
    }
}

fn default_projection_mode() -> String {
    "off".to_string()
}

fn default_projection_directory() -> PathBuf {
    PathBuf::from("state/users")
}

/// Diagnostics endpoint path overrides (spec.md §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_health_path")]
    pub health: String,
    #[serde(default = "default_ready_path")]
    pub ready: String,
    #[serde(default = "default_diagnostics_path")]
    pub diagnostics: String,
    #[serde(default = "default_metrics_path")]
    pub metrics: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            health: default_health_path(),
            ready: default_ready_path(),
            diagnostics: default_diagnostics_path(),
            metrics: default_metrics_path(),
        }
    }
}

fn default_health_path() -> String {
    "/healthz".to_string()
}

fn default_ready_path() -> String {
    "/readyz".to_string()
}

fn default_diagnostics_path() -> String {
    "/diagnostics".to_string()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

/// Safety limits that bound LLM-driven behavior (classifier/decision engine
/// retries, context-fetch sizes).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SafetyLimits {
    #[serde(default = "default_classifier_max_tokens")]
    pub classifier_max_tokens: u32,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            classifier_max_tokens: default_classifier_max_tokens(),
        }
    }
}

fn default_classifier_max_tokens() -> u32 {
    120
}
