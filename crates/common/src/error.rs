use thiserror::Error;

/// Top-level error taxonomy for the gateway (spec.md §7).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("authentication rejected")]
    AuthRejected,

    /// Never surfaced to clients — the classifier absorbs failures into `general`.
    #[error("classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("all provider candidates failed: {0}")]
    ProviderExhausted(String),

    #[error("no provider candidates configured")]
    NoCandidates,

    #[error("malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),

    /// Never surfaced as an HTTP error — absorbed into a footer warning.
    #[error("state model unavailable: {0}")]
    StateModelUnavailable(String),

    #[error("pending schema migrations: {0:?}")]
    PendingMigrations(Vec<String>),

    #[error("schema version {current} out of supported range [{min}, {max}]")]
    SchemaOutOfRange {
        current: String,
        min: String,
        max: String,
    },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status this variant maps to when it does reach the client.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::AuthRequired | Self::AuthRejected => 401,
            Self::ProviderExhausted(_) | Self::NoCandidates => 502,
            Self::MalformedUpstreamResponse(_) => 502,
            Self::ClassifierUnavailable(_) | Self::StateModelUnavailable(_) => 500,
            Self::PendingMigrations(_) | Self::SchemaOutOfRange { .. } => 503,
            Self::Persistence(_) | Self::Config(_) | Self::Internal(_) => 500,
        }
    }

    /// `error.type` discriminant for the OpenAI-shaped error body.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::AuthRequired | Self::AuthRejected => "authentication_error",
            Self::ProviderExhausted(_) => "provider_exhausted",
            Self::NoCandidates => "no_candidates",
            Self::MalformedUpstreamResponse(_) => "malformed_upstream_response",
            Self::ClassifierUnavailable(_) => "classifier_unavailable",
            Self::StateModelUnavailable(_) => "state_model_unavailable",
            Self::PendingMigrations(_) => "pending_migrations",
            Self::SchemaOutOfRange { .. } => "schema_out_of_range",
            Self::Persistence(_) => "persistence_error",
            Self::Config(_) => "config_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
