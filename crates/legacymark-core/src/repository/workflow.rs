//! Workflow repository trait definition.
//!
//! Defines the storage interface for workflows and their execution records.
//! The infrastructure layer (legacymark-infra) implements this trait with
//! SQLite persistence.

use chrono::{DateTime, Utc};
use legacymark_types::company::CompanyId;
use legacymark_types::error::RepositoryError;
use legacymark_types::workflow::{ExecutionLogEntry, ExecutionStatus, Workflow, WorkflowExecution};
use uuid::Uuid;

/// Field changes applied to an execution by `update_execution`.
///
/// Logs are not part of the update: they only ever grow through
/// `append_execution_log`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionUpdate {
    pub status: ExecutionStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub next_step_index: Option<usize>,
    pub resume_at: Option<DateTime<Utc>>,
}

impl ExecutionUpdate {
    /// Terminal update: stamps `completed_at` and clears any resume point.
    pub fn finished(status: ExecutionStatus, error: Option<String>) -> Self {
        Self {
            status,
            completed_at: Some(Utc::now()),
            error,
            next_step_index: None,
            resume_at: None,
        }
    }

    /// Park the execution until `resume_at`, continuing at `next_step_index`.
    ///
    /// `error` carries the first failure of a `continue_on_error` step seen
    /// before the WAIT, so the resumed drive still finishes FAILED.
    pub fn waiting(next_step_index: usize, resume_at: DateTime<Utc>, error: Option<String>) -> Self {
        Self {
            status: ExecutionStatus::Waiting,
            completed_at: None,
            error,
            next_step_index: Some(next_step_index),
            resume_at: Some(resume_at),
        }
    }
}

/// Repository trait for workflow persistence.
///
/// Covers two entity families:
/// - **Workflows:** CRUD and trigger lookup, partitioned by company.
/// - **Executions:** create, append log entries, finalize, park and claim.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait WorkflowRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Workflows
    // -----------------------------------------------------------------------

    /// Upsert a workflow (insert or replace by ID).
    fn save_workflow(
        &self,
        workflow: &Workflow,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_workflow(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Workflow>, RepositoryError>> + Send;

    /// All workflows of a company, most recently updated first.
    fn list_workflows(
        &self,
        company_id: &CompanyId,
    ) -> impl std::future::Future<Output = Result<Vec<Workflow>, RepositoryError>> + Send;

    /// Active workflows bound to `trigger_type`, optionally restricted to one company.
    fn list_active_by_trigger(
        &self,
        trigger_type: &str,
        company_id: Option<&CompanyId>,
    ) -> impl std::future::Future<Output = Result<Vec<Workflow>, RepositoryError>> + Send;

    /// Flip `is_active`. Returns `false` if the workflow does not exist.
    fn set_workflow_active(
        &self,
        id: &Uuid,
        active: bool,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete a workflow and its executions. Returns `true` if it existed.
    fn delete_workflow(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Executions
    // -----------------------------------------------------------------------

    fn create_execution(
        &self,
        execution: &WorkflowExecution,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Append one entry to the execution's log. Never rewrites earlier entries.
    fn append_execution_log(
        &self,
        execution_id: &Uuid,
        entry: &ExecutionLogEntry,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Apply a status change. Last write wins.
    fn update_execution(
        &self,
        execution_id: &Uuid,
        update: &ExecutionUpdate,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_execution(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowExecution>, RepositoryError>> + Send;

    /// Executions of one workflow, ordered by started_at DESC.
    fn list_executions(
        &self,
        workflow_id: &Uuid,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowExecution>, RepositoryError>> + Send;

    /// Executions across all of a company's workflows, ordered by started_at DESC.
    fn list_recent_executions(
        &self,
        company_id: &CompanyId,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowExecution>, RepositoryError>> + Send;

    /// WAITING executions whose `resume_at` is at or before `now`, oldest first.
    fn list_due_executions(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowExecution>, RepositoryError>> + Send;

    /// Atomically move a due WAITING execution back to PENDING.
    ///
    /// Returns `false` when the execution is not WAITING, not yet due, or was
    /// already claimed by someone else.
    fn claim_due_execution(
        &self,
        execution_id: &Uuid,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
