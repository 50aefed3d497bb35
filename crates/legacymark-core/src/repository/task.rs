//! Task repository trait definition.

use legacymark_types::company::CompanyId;
use legacymark_types::error::RepositoryError;
use legacymark_types::task::Task;

/// Storage for CRM tasks created by workflow steps.
pub trait TaskRepository: Send + Sync {
    fn create_task(
        &self,
        task: &Task,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Most recent tasks for a company, newest first.
    fn list_tasks(
        &self,
        company_id: &CompanyId,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, RepositoryError>> + Send;
}
