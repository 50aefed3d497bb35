//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Core services are generic over repository traits; AppState pins them to
//! the SQLite implementations from legacymark-infra.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use legacymark_core::service::workflow::WorkflowService;
use legacymark_core::workflow::dispatcher::TriggerDispatcher;
use legacymark_core::workflow::executor::WorkflowExecutor;
use legacymark_infra::actions::LiveActionContext;
use legacymark_infra::config::{load_settings, resolve_data_dir, Settings};
use legacymark_infra::sqlite::pool::{database_url, DatabasePool};
use legacymark_infra::sqlite::task::SqliteTaskRepository;
use legacymark_infra::sqlite::workflow::SqliteWorkflowRepository;
use legacymark_types::config::AutomationConfig;
use secrecy::SecretString;

pub type ConcreteWorkflowService = WorkflowService<SqliteWorkflowRepository>;
pub type ConcreteExecutor = WorkflowExecutor<SqliteWorkflowRepository>;
pub type ConcreteDispatcher = TriggerDispatcher<SqliteWorkflowRepository>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub workflow_service: Arc<ConcreteWorkflowService>,
    pub executor: Arc<ConcreteExecutor>,
    pub dispatcher: Arc<ConcreteDispatcher>,
    pub task_repo: Arc<SqliteTaskRepository>,
    /// Expected `x-api-key`; `None` rejects every protected request.
    pub api_key: Option<Arc<SecretString>>,
    pub config: Arc<AutomationConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let settings = load_settings(&data_dir).await;

        let pool = DatabasePool::new(&database_url(&data_dir))
            .await
            .context("failed to open the automation database")?;

        Self::from_parts(data_dir, settings, pool)
    }

    /// Wire services on top of an open pool.
    pub fn from_parts(
        data_dir: PathBuf,
        settings: Settings,
        pool: DatabasePool,
    ) -> anyhow::Result<Self> {
        let workflow_repo = Arc::new(SqliteWorkflowRepository::new(pool.clone()));
        let task_repo = Arc::new(SqliteTaskRepository::new(pool));

        let actions = LiveActionContext::new(
            &settings.automation.http,
            settings.automation.email.clone(),
            settings.resend_api_key,
            Arc::clone(&task_repo),
        )
        .context("failed to build the outbound HTTP client")?;

        let executor = Arc::new(WorkflowExecutor::new(
            Arc::clone(&workflow_repo),
            Arc::new(actions),
            &settings.automation.executor,
        ));
        let dispatcher = Arc::new(TriggerDispatcher::new(Arc::clone(&executor)));
        let workflow_service = Arc::new(WorkflowService::new(workflow_repo));

        Ok(Self {
            workflow_service,
            executor,
            dispatcher,
            task_repo,
            api_key: settings.api_key.map(Arc::new),
            config: Arc::new(settings.automation),
            data_dir,
        })
    }
}
