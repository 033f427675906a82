use std::sync::Arc;

use rise_agent::llm::LlmError;
use rise_agent::AgentRuntime;
use rise_core::config::{AppConfig, ConfigError, LoadOptions};
use rise_db::repositories::SqlProjectRequestRepository;
use rise_db::{connect_from_config, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::api::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<AgentRuntime>,
}

impl Application {
    pub fn state(&self) -> AppState {
        AppState {
            runtime: self.runtime.clone(),
            projects: Arc::new(SqlProjectRequestRepository::new(self.db_pool.clone())),
            db_pool: self.db_pool.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("language model client could not be built: {0}")]
    Model(#[source] LlmError),
}

#[cfg(test)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        "starting application bootstrap"
    );

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let runtime =
        AgentRuntime::from_config(&config, db_pool.clone()).map_err(BootstrapError::Model)?;

    Ok(Application { config, db_pool, runtime: Arc::new(runtime) })
}
