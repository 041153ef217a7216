//! State Schema + Migrator (C7, spec.md §4.6).
//!
//! On startup, if the state subsystem is enabled: connect with a bounded
//! `connect_timeout`, ensure `schema_migrations` exists, compute the pending
//! set, refuse to start if any migration is pending and `auto_migrate` is
//! off, otherwise apply pending migrations each in its own transaction, then
//! verify the resulting version lies in `[min_supported, max_supported]`.

use std::time::Duration;

use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use gateway_common::GatewayError;

use super::migrations::{migration_sql, migration_versions};

#[derive(Clone, Debug, Serialize)]
pub struct StateStoreStatus {
    pub enabled: bool,
    pub connected: bool,
    pub ready: bool,
    pub auto_migrate: bool,
    pub projection_mode: String,
    pub min_supported_schema_version: String,
    pub max_supported_schema_version: String,
    pub current_schema_version: Option<String>,
    pub pending_migrations: Vec<String>,
    pub migrations_applied: Vec<String>,
    pub error: Option<String>,
}

pub struct StateStore {
    pool: PgPool,
    status: StateStoreStatus,
}

impl StateStore {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn status(&self) -> &StateStoreStatus {
        &self.status
    }

    /// Connect and bring the schema up to date. Returns `Err` (and the
    /// caller refuses to start the service) on `PendingMigrations` or
    /// `SchemaOutOfRange`.
    #[allow(clippy::too_many_arguments)]
    pub async fn connect(
        dsn: &str,
        connect_timeout_seconds: u64,
        max_connections: u32,
        auto_migrate: bool,
        min_schema_version: &str,
        max_schema_version: &str,
        projection_mode: &str,
    ) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_seconds))
            .connect(dsn)
            .await
            .map_err(|e| GatewayError::Persistence(format!("connect failed: {e}")))?;

        let mut status = StateStoreStatus {
            enabled: true,
            connected: false,
            ready: false,
            auto_migrate,
            projection_mode: projection_mode.to_string(),
            min_supported_schema_version: min_schema_version.to_string(),
            max_supported_schema_version: max_schema_version.to_string(),
            current_schema_version: None,
            pending_migrations: Vec::new(),
            migrations_applied: Vec::new(),
            error: None,
        };

        match run_migrations(&pool, auto_migrate, min_schema_version, max_schema_version, &mut status).await {
            Ok(()) => {
                status.connected = true;
                status.ready = true;
                Ok(Self { pool, status })
            }
            Err(e) => {
                status.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

async fn run_migrations(
    pool: &PgPool,
    auto_migrate: bool,
    min_schema_version: &str,
    max_schema_version: &str,
    status: &mut StateStoreStatus,
) -> Result<(), GatewayError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| GatewayError::Persistence(format!("failed to ensure schema_migrations: {e}")))?;

    let applied: Vec<String> = sqlx::query("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await
        .map_err(|e| GatewayError::Persistence(format!("failed to load applied versions: {e}")))?
        .into_iter()
        .map(|row| row.get::<String, _>("version"))
        .collect();

    let ordered = migration_versions();
    let pending: Vec<String> = ordered
        .iter()
        .filter(|v| !applied.iter().any(|a| a == *v))
        .map(|v| v.to_string())
        .collect();
    status.pending_migrations = pending.clone();

    if !pending.is_empty() && !auto_migrate {
        return Err(GatewayError::PendingMigrations(pending));
    }

    for version in &pending {
        tracing::info!(version, "applying state migration");
        let sql = migration_sql(version)
            .ok_or_else(|| GatewayError::Persistence(format!("no SQL registered for migration {version}")))?;
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| GatewayError::Persistence(format!("begin transaction failed: {e}")))?;
        sqlx::query(sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| GatewayError::Persistence(format!("migration {version} failed: {e}")))?;
        sqlx::query("INSERT INTO schema_migrations(version) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(version)
            .execute(&mut *tx)
            .await
            .map_err(|e| GatewayError::Persistence(format!("failed to record migration {version}: {e}")))?;
        tx.commit()
            .await
            .map_err(|e| GatewayError::Persistence(format!("commit failed for {version}: {e}")))?;
        status.migrations_applied.push(version.clone());
    }

    let current: Option<String> = sqlx::query("SELECT MAX(version) AS version FROM schema_migrations")
        .fetch_one(pool)
        .await
        .map_err(|e| GatewayError::Persistence(format!("failed to read current schema version: {e}")))?
        .get("version");
    status.current_schema_version = current.clone();
    status.pending_migrations = Vec::new();

    let current = current.ok_or_else(|| {
        GatewayError::Persistence("no state schema version detected after initialization".into())
    })?;

    if current.as_str() < min_schema_version || current.as_str() > max_schema_version {
        return Err(GatewayError::SchemaOutOfRange {
            current,
            min: min_schema_version.to_string(),
            max: max_schema_version.to_string(),
        });
    }

    Ok(())
}
