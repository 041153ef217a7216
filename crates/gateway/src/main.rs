mod cli;
mod classifier;
mod config;
mod http;
mod jsonx;
mod orchestrator;
mod prompts;
mod provider;
mod session_store;
mod state;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;

use gateway_common::SpecialistDomain;

use crate::config::GatewayConfig;
use crate::http::{AppState, DiagnosticPaths};
use crate::orchestrator::Orchestrator;
use crate::prompts::PromptRegistry;
use crate::provider::{ProviderCredentials, ProviderRouter};
use crate::session_store::StickySessionStore;
use crate::state::{FileProjector, OnFailure, ProjectionMode, StatePipelineCoordinator, StateStore};

#[derive(Parser)]
#[command(name = "gatewayd", about = "OpenAI-compatible chat-completions gateway with specialist routing")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory containing `system.toml` (spec.md §4.13).
    #[arg(long, global = true, default_value = "config")]
    config_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway's HTTP server (default when no subcommand is given).
    Serve,
    /// Interactively upsert provider credentials into an env-file.
    Onboard {
        #[arg(long, default_value = ".env")]
        env_file: PathBuf,
    },
    /// Local database provisioning helpers.
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
}

#[derive(Subcommand)]
enum DbCommand {
    /// Create a local Postgres role/database for the state store and print
    /// its DSN. Must be run as root on platforms that expose a root check.
    BootstrapLocal {
        #[arg(long, default_value = "gateway_user")]
        role: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "gateway_state")]
        database: String,
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value_t = 5432)]
        port: u16,
    },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            init_logging();
            tokio::runtime::Runtime::new()
                .expect("failed to start Tokio runtime")
                .block_on(serve(cli.config_dir));
        }
        Command::Onboard { env_file } => {
            init_logging();
            let config = load_config_or_exit(&cli.config_dir);
            let state_dsn_env = if config.system.state.enabled {
                Some(config.system.state.database.dsn_env.as_str())
            } else {
                None
            };
            if let Err(e) = cli::run_onboard(
                &env_file,
                &config.system.providers.openai.api_key_env,
                &config.system.providers.gemini.api_key_env,
                state_dsn_env,
            ) {
                tracing::error!(error = %e, "onboarding failed");
                std::process::exit(1);
            }
        }
        Command::Db {
            command: DbCommand::BootstrapLocal {
                role,
                password,
                database,
                host,
                port,
            },
        } => {
            init_logging();
            match cli::run_bootstrap_local(&role, &password, &database, &host, port) {
                Ok(_dsn) => {}
                Err(e) => {
                    tracing::error!(error = %e, "db bootstrap-local failed");
                    std::process::exit(1);
                }
            }
        }
    }
}

fn load_config_or_exit(config_dir: &PathBuf) -> GatewayConfig {
    match config::load_config(config_dir) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration — refusing to start");
            std::process::exit(1);
        }
    }
}

async fn serve(config_dir: PathBuf) {
    tracing::info!("gateway starting");

    let config = load_config_or_exit(&config_dir);

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus metrics recorder");

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.system.server.upstream_timeout_seconds))
        .build()
        .expect("failed to build HTTP client");

    let router = Arc::new(ProviderRouter::new(
        http_client,
        ProviderCredentials {
            api_key: config.openai_api_key.clone().unwrap_or_default(),
            base_url: config.openai_base_url().to_string(),
        },
        ProviderCredentials {
            api_key: config.gemini_api_key.clone().unwrap_or_default(),
            base_url: config.gemini_base_url().to_string(),
        },
        config.system.models.fallbacks.clone(),
    ));

    let mut domain_prompt_files: HashMap<String, String> = HashMap::new();
    let mut specialist_models: HashMap<SpecialistDomain, String> = HashMap::new();
    let mut specialist_models_label: HashMap<String, String> = HashMap::new();
    for domain in SpecialistDomain::ALL {
        let configured = config.system.specialists.by_domain.get(domain.as_str());
        let model = configured
            .map(|c| c.model.clone())
            .unwrap_or_else(|| config.system.models.classifier.clone());
        if let Some(file) = configured.and_then(|c| c.prompt_file.clone()) {
            domain_prompt_files.insert(domain.as_str().to_string(), file);
        }
        specialist_models_label.insert(domain.as_str().to_string(), model.clone());
        specialist_models.insert(domain, model);
    }

    let prompts = Arc::new(PromptRegistry::load(
        config.system.specialists.prompts_directory.clone(),
        config.system.specialists.orchestrator_prompt_file.clone(),
        domain_prompt_files,
        config.system.specialists.auto_reload,
    ));

    let sessions = Arc::new(StickySessionStore::new(
        config.system.sticky_session.history_size,
        config.system.sticky_session.max_sessions,
    ));

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&router),
        Arc::clone(&prompts),
        sessions,
        specialist_models,
        config.system.models.classifier.clone(),
        config.system.safety.classifier_max_tokens,
    ));

    let candidate_models = router.candidate_models(&specialist_models_label.values().cloned().collect::<Vec<_>>());

    let (state_store, state_pipeline, projection_mode_label) = if config.system.state.enabled {
        let dsn = config
            .state_dsn
            .clone()
            .expect("state.enabled=true implies state_dsn was resolved during config load");

        let store = match StateStore::connect(
            &dsn,
            config.system.state.database.connect_timeout_seconds,
            config.system.state.database.max_connections,
            config.system.state.database.auto_migrate,
            &config.system.state.database.min_schema_version,
            &config.system.state.database.max_schema_version,
            &config.system.state.projection.mode,
        )
        .await
        {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::error!(error = %e, "state store initialization failed — refusing to start");
                std::process::exit(1);
            }
        };

        let projection_mode = ProjectionMode::from_config_str(&config.system.state.projection.mode);
        let projector = Arc::new(FileProjector::new(
            projection_mode,
            config.system.state.projection.output_directory.clone(),
        ));

        let decision_model = config
            .system
            .state
            .decision
            .model
            .clone()
            .unwrap_or_else(|| config.system.models.classifier.clone());

        let coordinator = Arc::new(StatePipelineCoordinator::new(
            Arc::clone(&store),
            projector,
            decision_model,
            config.system.state.decision.max_json_retries,
            OnFailure::from_config_str(&config.system.state.decision.on_failure),
            config.system.state.checkin.enabled,
            config.system.state.journal.enabled,
            config.system.state.memory.enabled,
            config.system.state.context_checkins_limit as i64,
            config.system.state.context_journal_titles_limit as i64,
        ));

        (Some(store), Some(coordinator), config.system.state.projection.mode.clone())
    } else {
        (None, None, "off".to_string())
    };

    let app_state = Arc::new(AppState {
        router,
        orchestrator,
        prompts,
        metrics_handle,
        api_keys: config.system.server.api_keys.clone(),
        public_model_id: config.system.api.public_model_id.clone(),
        allow_provider_model_passthrough: config.system.api.allow_provider_model_passthrough,
        classifier_model: config.system.models.classifier.clone(),
        specialist_models: specialist_models_label,
        candidate_models,
        projection_mode_label,
        state_store,
        state_pipeline,
    });

    let diagnostic_paths = DiagnosticPaths {
        health: config.system.diagnostics.health.clone(),
        ready: config.system.diagnostics.ready.clone(),
        diagnostics: config.system.diagnostics.diagnostics.clone(),
        metrics: config.system.diagnostics.metrics.clone(),
    };

    let app = http::build_router(app_state, &diagnostic_paths);

    let bind_address = config.system.server.bind_address.clone();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind_address}: {e}"));

    tracing::info!(bind_address = %bind_address, "gateway listening");

    axum::serve(listener, app).await.expect("HTTP server error");
}
