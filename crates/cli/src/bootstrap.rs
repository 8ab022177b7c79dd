use std::sync::Arc;

use clap::ValueEnum;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::info;

use textagent_actions::{ActionRouter, MessagingService, TaskTrackingService};
use textagent_agent::{AgentInvoker, AgentTarget, HttpAgentClient};
use textagent_core::config::{AppConfig, ConfigError};
use textagent_core::secrets::{SecretError, SecretStore};
use textagent_core::{ActionRequest, ActionResponse};
use textagent_db::{
    connect_with_settings, migrations, DbPool, RepositoryError, SqlMessageRepository,
    SqlTaskRepository,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ServiceKind {
    Messaging,
    TaskTracking,
}

impl ServiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Messaging => "messaging",
            Self::TaskTracking => "task-tracking",
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
    #[error("record store setup failed: {0}")]
    Storage(#[from] RepositoryError),
    #[error("agent secret lookup failed: {0}")]
    Secret(#[from] SecretError),
}

impl BootstrapError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_validation",
            Self::DatabaseConnect(_) => "db_connectivity",
            Self::Migration(_) => "migration",
            Self::Storage(_) => "storage",
            Self::Secret(_) => "secret_lookup",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::DatabaseConnect(_) => 4,
            Self::Migration(_) => 5,
            Self::Storage(_) => 6,
            Self::Secret(_) => 7,
        }
    }
}

/// The router for whichever service this process was started as.
pub enum ServiceRouter {
    Messaging(ActionRouter<MessagingService>),
    TaskTracking(ActionRouter<TaskTrackingService>),
}

impl ServiceRouter {
    pub async fn route(&self, request: &ActionRequest) -> ActionResponse {
        match self {
            Self::Messaging(router) => router.route(request).await,
            Self::TaskTracking(router) => router.route(request).await,
        }
    }

    pub async fn handle_payload(&self, payload: &[u8]) -> ActionResponse {
        match serde_json::from_slice::<ActionRequest>(payload) {
            Ok(request) => self.route(&request).await,
            Err(error) => self.reject_malformed(&error),
        }
    }

    pub fn reject_malformed(&self, error: &serde_json::Error) -> ActionResponse {
        match self {
            Self::Messaging(router) => router.reject_malformed(error),
            Self::TaskTracking(router) => router.reject_malformed(error),
        }
    }
}

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub router: ServiceRouter,
}

pub async fn connect_and_migrate(config: &AppConfig) -> Result<DbPool, BootstrapError> {
    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
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

    Ok(db_pool)
}

/// Everything a request needs is built here, once. Any failure is fatal.
pub async fn bootstrap_with_config(
    config: AppConfig,
    service: ServiceKind,
    secrets: &dyn SecretStore,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        service = service.as_str(),
        "starting service bootstrap"
    );

    let db_pool = connect_and_migrate(&config).await?;

    let router = match service {
        ServiceKind::Messaging => {
            let messages =
                SqlMessageRepository::new(db_pool.clone(), &config.storage.message_table)?;
            messages.ensure_table().await?;
            let invoker = build_agent_invoker(&config, secrets).await?;
            ServiceRouter::Messaging(ActionRouter::new(MessagingService::new(
                Arc::new(messages),
                invoker,
            )))
        }
        ServiceKind::TaskTracking => {
            let tasks = SqlTaskRepository::new(db_pool.clone(), &config.storage.task_table)?;
            tasks.ensure_table().await?;
            ServiceRouter::TaskTracking(ActionRouter::new(TaskTrackingService::new(Arc::new(
                tasks,
            ))))
        }
    };

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        service = service.as_str(),
        "service ready"
    );

    Ok(Application { config, db_pool, router })
}

async fn build_agent_invoker(
    config: &AppConfig,
    secrets: &dyn SecretStore,
) -> Result<AgentInvoker, BootstrapError> {
    let settings = config.agent.require_invocation_settings()?;

    let agent_id = secrets.get_secret(settings.id_secret_id).await?;
    let agent_alias_id = secrets.get_secret(settings.alias_id_secret_id).await?;
    let api_key: Option<SecretString> = match settings.api_key_secret_id {
        Some(key) => Some(secrets.get_secret(key).await?),
        None => None,
    };

    info!(
        event_name = "system.bootstrap.agent_resolved",
        correlation_id = "bootstrap",
        base_url = settings.base_url,
        authenticated = api_key.is_some(),
        "agent client configured"
    );

    let client = HttpAgentClient::new(settings.base_url, api_key);
    Ok(AgentInvoker::new(
        Arc::new(client),
        AgentTarget {
            agent_id: agent_id.expose_secret().to_owned(),
            agent_alias_id: agent_alias_id.expose_secret().to_owned(),
        },
    ))
}
