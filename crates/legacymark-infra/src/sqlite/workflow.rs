//! SQLite workflow repository implementation.
//!
//! Implements `WorkflowRepository` from `legacymark-core` using sqlx with split
//! read/write pools. Steps, trigger config, payloads and execution logs are
//! stored as JSON text. Log entries are appended in place with `json_insert`
//! so concurrent readers never see a rewritten log.

use chrono::{DateTime, Utc};
use legacymark_core::repository::workflow::{ExecutionUpdate, WorkflowRepository};
use legacymark_types::company::CompanyId;
use legacymark_types::error::RepositoryError;
use legacymark_types::workflow::{
    ExecutionLogEntry, ExecutionStatus, StepDefinition, Workflow, WorkflowExecution,
};
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_uuid};

const WORKFLOW_COLUMNS: &str = "id, company_id, name, description, trigger_type, trigger_config, steps, is_active, created_at, updated_at";

const EXECUTION_COLUMNS: &str = "id, workflow_id, workflow_name, company_id, status, trigger_type, trigger_payload, started_at, completed_at, logs, error, next_step_index, resume_at";

/// SQLite-backed implementation of `WorkflowRepository`.
pub struct SqliteWorkflowRepository {
    pool: DatabasePool,
}

impl SqliteWorkflowRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct WorkflowRow {
    id: String,
    company_id: String,
    name: String,
    description: Option<String>,
    trigger_type: String,
    trigger_config: String,
    steps: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl WorkflowRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            company_id: row.try_get("company_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            trigger_type: row.try_get("trigger_type")?,
            trigger_config: row.try_get("trigger_config")?,
            steps: row.try_get("steps")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_workflow(self) -> Result<Workflow, RepositoryError> {
        let trigger_config: Value = serde_json::from_str(&self.trigger_config)
            .map_err(|e| RepositoryError::Query(format!("invalid trigger_config JSON: {e}")))?;
        let steps: Vec<StepDefinition> = serde_json::from_str(&self.steps)
            .map_err(|e| RepositoryError::Query(format!("invalid steps JSON: {e}")))?;

        Ok(Workflow {
            id: parse_uuid(&self.id)?,
            company_id: CompanyId::from_uuid(parse_uuid(&self.company_id)?),
            name: self.name,
            description: self.description,
            trigger_type: self.trigger_type,
            trigger_config,
            steps,
            is_active: self.is_active,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct ExecutionRow {
    id: String,
    workflow_id: String,
    workflow_name: String,
    company_id: String,
    status: String,
    trigger_type: String,
    trigger_payload: String,
    started_at: String,
    completed_at: Option<String>,
    logs: String,
    error: Option<String>,
    next_step_index: Option<i64>,
    resume_at: Option<String>,
}

impl ExecutionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            workflow_name: row.try_get("workflow_name")?,
            company_id: row.try_get("company_id")?,
            status: row.try_get("status")?,
            trigger_type: row.try_get("trigger_type")?,
            trigger_payload: row.try_get("trigger_payload")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            logs: row.try_get("logs")?,
            error: row.try_get("error")?,
            next_step_index: row.try_get("next_step_index")?,
            resume_at: row.try_get("resume_at")?,
        })
    }

    fn into_execution(self) -> Result<WorkflowExecution, RepositoryError> {
        let trigger_payload: Value = serde_json::from_str(&self.trigger_payload)
            .map_err(|e| RepositoryError::Query(format!("invalid trigger_payload JSON: {e}")))?;
        let logs: Vec<ExecutionLogEntry> = serde_json::from_str(&self.logs)
            .map_err(|e| RepositoryError::Query(format!("invalid logs JSON: {e}")))?;
        let next_step_index = self
            .next_step_index
            .map(|i| {
                usize::try_from(i)
                    .map_err(|_| RepositoryError::Query(format!("invalid next_step_index: {i}")))
            })
            .transpose()?;

        Ok(WorkflowExecution {
            id: parse_uuid(&self.id)?,
            workflow_id: parse_uuid(&self.workflow_id)?,
            workflow_name: self.workflow_name,
            company_id: CompanyId::from_uuid(parse_uuid(&self.company_id)?),
            status: self.status.parse().map_err(RepositoryError::Query)?,
            trigger_type: self.trigger_type,
            trigger_payload,
            started_at: parse_datetime(&self.started_at)?,
            completed_at: self.completed_at.as_deref().map(parse_datetime).transpose()?,
            logs,
            error: self.error,
            next_step_index,
            resume_at: self.resume_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T, what: &str) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Query(format!("serialize {what}: {e}")))
}

fn workflows_from_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Workflow>, RepositoryError> {
    rows.iter()
        .map(|row| {
            WorkflowRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_workflow()
        })
        .collect()
}

fn executions_from_rows(
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<Vec<WorkflowExecution>, RepositoryError> {
    rows.iter()
        .map(|row| {
            ExecutionRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_execution()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// WorkflowRepository impl
// ---------------------------------------------------------------------------

impl WorkflowRepository for SqliteWorkflowRepository {
    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let trigger_config = to_json(&workflow.trigger_config, "trigger_config")?;
        let steps = to_json(&workflow.steps, "steps")?;

        sqlx::query(
            r#"INSERT INTO workflows
               (id, company_id, name, description, trigger_type, trigger_config, steps, is_active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 trigger_type = excluded.trigger_type,
                 trigger_config = excluded.trigger_config,
                 steps = excluded.steps,
                 is_active = excluded.is_active,
                 updated_at = excluded.updated_at"#,
        )
        .bind(workflow.id.to_string())
        .bind(workflow.company_id.to_string())
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(&workflow.trigger_type)
        .bind(&trigger_config)
        .bind(&steps)
        .bind(workflow.is_active)
        .bind(format_datetime(&workflow.created_at))
        .bind(format_datetime(&workflow.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get_workflow(&self, id: &Uuid) -> Result<Option<Workflow>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = WorkflowRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_workflow()?))
            }
            None => Ok(None),
        }
    }

    async fn list_workflows(&self, company_id: &CompanyId) -> Result<Vec<Workflow>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE company_id = ? ORDER BY updated_at DESC, id DESC"
        ))
        .bind(company_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        workflows_from_rows(&rows)
    }

    async fn list_active_by_trigger(
        &self,
        trigger_type: &str,
        company_id: Option<&CompanyId>,
    ) -> Result<Vec<Workflow>, RepositoryError> {
        let rows = match company_id {
            Some(company) => {
                sqlx::query(&format!(
                    "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE trigger_type = ? AND is_active = 1 AND company_id = ? ORDER BY created_at ASC"
                ))
                .bind(trigger_type)
                .bind(company.to_string())
                .fetch_all(&self.pool.reader)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE trigger_type = ? AND is_active = 1 ORDER BY created_at ASC"
                ))
                .bind(trigger_type)
                .fetch_all(&self.pool.reader)
                .await
            }
        }
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        workflows_from_rows(&rows)
    }

    async fn set_workflow_active(&self, id: &Uuid, active: bool) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE workflows SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(format_datetime(&Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_workflow(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        // Executions go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<(), RepositoryError> {
        let payload = to_json(&execution.trigger_payload, "trigger_payload")?;
        let logs = to_json(&execution.logs, "logs")?;

        sqlx::query(
            r#"INSERT INTO workflow_executions
               (id, workflow_id, workflow_name, company_id, status, trigger_type, trigger_payload,
                started_at, completed_at, logs, error, next_step_index, resume_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(execution.id.to_string())
        .bind(execution.workflow_id.to_string())
        .bind(&execution.workflow_name)
        .bind(execution.company_id.to_string())
        .bind(execution.status.to_string())
        .bind(&execution.trigger_type)
        .bind(&payload)
        .bind(format_datetime(&execution.started_at))
        .bind(execution.completed_at.as_ref().map(format_datetime))
        .bind(&logs)
        .bind(&execution.error)
        .bind(execution.next_step_index.map(|i| i as i64))
        .bind(execution.resume_at.as_ref().map(format_datetime))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn append_execution_log(
        &self,
        execution_id: &Uuid,
        entry: &ExecutionLogEntry,
    ) -> Result<(), RepositoryError> {
        let entry_json = to_json(entry, "log entry")?;

        let result = sqlx::query(
            "UPDATE workflow_executions SET logs = json_insert(logs, '$[#]', json(?)) WHERE id = ?",
        )
        .bind(&entry_json)
        .bind(execution_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn update_execution(
        &self,
        execution_id: &Uuid,
        update: &ExecutionUpdate,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE workflow_executions
               SET status = ?, completed_at = ?, error = ?, next_step_index = ?, resume_at = ?
               WHERE id = ?"#,
        )
        .bind(update.status.to_string())
        .bind(update.completed_at.as_ref().map(format_datetime))
        .bind(&update.error)
        .bind(update.next_step_index.map(|i| i as i64))
        .bind(update.resume_at.as_ref().map(format_datetime))
        .bind(execution_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn get_execution(
        &self,
        execution_id: &Uuid,
    ) -> Result<Option<WorkflowExecution>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM workflow_executions WHERE id = ?"
        ))
        .bind(execution_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = ExecutionRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_execution()?))
            }
            None => Ok(None),
        }
    }

    async fn list_executions(
        &self,
        workflow_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<WorkflowExecution>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM workflow_executions WHERE workflow_id = ? ORDER BY started_at DESC, id DESC LIMIT ?"
        ))
        .bind(workflow_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        executions_from_rows(&rows)
    }

    async fn list_recent_executions(
        &self,
        company_id: &CompanyId,
        limit: u32,
    ) -> Result<Vec<WorkflowExecution>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM workflow_executions WHERE company_id = ? ORDER BY started_at DESC, id DESC LIMIT ?"
        ))
        .bind(company_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        executions_from_rows(&rows)
    }

    async fn list_due_executions(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<WorkflowExecution>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM workflow_executions WHERE status = ? AND resume_at IS NOT NULL AND resume_at <= ? ORDER BY resume_at ASC LIMIT ?"
        ))
        .bind(ExecutionStatus::Waiting.to_string())
        .bind(format_datetime(&now))
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        executions_from_rows(&rows)
    }

    async fn claim_due_execution(
        &self,
        execution_id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE workflow_executions SET status = ?
               WHERE id = ? AND status = ? AND resume_at IS NOT NULL AND resume_at <= ?"#,
        )
        .bind(ExecutionStatus::Pending.to_string())
        .bind(execution_id.to_string())
        .bind(ExecutionStatus::Waiting.to_string())
        .bind(format_datetime(&now))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use legacymark_types::workflow::{
        EmailStep, LogStep, StepKind, StepStatus, WaitStep, TRIGGER_FORM_SUBMISSION,
        TRIGGER_TEST,
    };
    use serde_json::json;

    async fn test_repo() -> SqliteWorkflowRepository {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        std::mem::forget(dir);
        SqliteWorkflowRepository::new(DatabasePool::new(&url).await.unwrap())
    }

    fn sample_workflow(company_id: CompanyId, trigger_type: &str) -> Workflow {
        let now = Utc::now();
        Workflow {
            id: Uuid::now_v7(),
            company_id,
            name: "Welcome lead".to_string(),
            description: Some("Greets new form leads".to_string()),
            trigger_type: trigger_type.to_string(),
            trigger_config: json!({"targetStage": "WON"}),
            steps: vec![
                StepDefinition::new(StepKind::Log(LogStep {
                    message: "New lead {{name}}".to_string(),
                })),
                StepDefinition::new(StepKind::Email(EmailStep::default())).continue_on_error(),
                StepDefinition::new(StepKind::Wait(WaitStep { delay: 60 })),
            ],
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn saved_execution(repo: &SqliteWorkflowRepository) -> (Workflow, WorkflowExecution) {
        let wf = sample_workflow(CompanyId::new(), TRIGGER_TEST);
        repo.save_workflow(&wf).await.unwrap();
        let exec = WorkflowExecution::pending(&wf, TRIGGER_TEST, json!({"name": "Ana"}));
        repo.create_execution(&exec).await.unwrap();
        (wf, exec)
    }

    #[tokio::test]
    async fn test_save_and_get_workflow() {
        let repo = test_repo().await;
        let wf = sample_workflow(CompanyId::new(), TRIGGER_FORM_SUBMISSION);
        repo.save_workflow(&wf).await.unwrap();

        let loaded = repo.get_workflow(&wf.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, wf.name);
        assert_eq!(loaded.company_id, wf.company_id);
        assert_eq!(loaded.trigger_config, wf.trigger_config);
        assert_eq!(loaded.steps, wf.steps);
        assert!(loaded.is_active);

        assert!(repo.get_workflow(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_upserts_and_keeps_created_at() {
        let repo = test_repo().await;
        let mut wf = sample_workflow(CompanyId::new(), TRIGGER_FORM_SUBMISSION);
        repo.save_workflow(&wf).await.unwrap();

        let created_at = wf.created_at;
        wf.name = "Renamed".to_string();
        wf.steps.truncate(1);
        wf.created_at = Utc::now() + TimeDelta::days(1);
        repo.save_workflow(&wf).await.unwrap();

        let loaded = repo.get_workflow(&wf.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Renamed");
        assert_eq!(loaded.steps.len(), 1);
        assert_eq!(format_datetime(&loaded.created_at), format_datetime(&created_at));
    }

    #[tokio::test]
    async fn test_list_active_by_trigger() {
        let repo = test_repo().await;
        let company = CompanyId::new();

        let active = sample_workflow(company, TRIGGER_FORM_SUBMISSION);
        let mut inactive = sample_workflow(company, TRIGGER_FORM_SUBMISSION);
        inactive.is_active = false;
        let other_trigger = sample_workflow(company, TRIGGER_TEST);
        let other_company = sample_workflow(CompanyId::new(), TRIGGER_FORM_SUBMISSION);
        for wf in [&active, &inactive, &other_trigger, &other_company] {
            repo.save_workflow(wf).await.unwrap();
        }

        let all = repo
            .list_active_by_trigger(TRIGGER_FORM_SUBMISSION, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let scoped = repo
            .list_active_by_trigger(TRIGGER_FORM_SUBMISSION, Some(&company))
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, active.id);
    }

    #[tokio::test]
    async fn test_set_active_and_list_order() {
        let repo = test_repo().await;
        let company = CompanyId::new();
        let first = sample_workflow(company, TRIGGER_TEST);
        let second = sample_workflow(company, TRIGGER_TEST);
        repo.save_workflow(&first).await.unwrap();
        repo.save_workflow(&second).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(repo.set_workflow_active(&first.id, false).await.unwrap());
        assert!(!repo.set_workflow_active(&Uuid::now_v7(), true).await.unwrap());

        let listed = repo.list_workflows(&company).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id, "most recently updated first");
        assert!(!listed[0].is_active);
    }

    #[tokio::test]
    async fn test_append_log_preserves_order() {
        let repo = test_repo().await;
        let (_, exec) = saved_execution(&repo).await;

        for (i, status) in [StepStatus::Success, StepStatus::Skipped, StepStatus::Failed]
            .into_iter()
            .enumerate()
        {
            let entry = ExecutionLogEntry::new(i, "LOG", status, format!("step {i}"));
            repo.append_execution_log(&exec.id, &entry).await.unwrap();
        }

        let loaded = repo.get_execution(&exec.id).await.unwrap().unwrap();
        let indexes: Vec<usize> = loaded.logs.iter().map(|l| l.step_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(loaded.logs[1].status, StepStatus::Skipped);
        assert_eq!(loaded.trigger_payload, json!({"name": "Ana"}));

        let missing = repo
            .append_execution_log(
                &Uuid::now_v7(),
                &ExecutionLogEntry::new(0, "LOG", StepStatus::Success, String::new()),
            )
            .await;
        assert!(matches!(missing, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_execution_finishes_run() {
        let repo = test_repo().await;
        let (_, exec) = saved_execution(&repo).await;

        repo.update_execution(
            &exec.id,
            &ExecutionUpdate::finished(ExecutionStatus::Failed, Some("boom".to_string())),
        )
        .await
        .unwrap();

        let loaded = repo.get_execution(&exec.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ExecutionStatus::Failed);
        assert_eq!(loaded.error.as_deref(), Some("boom"));
        assert!(loaded.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_due_listing_and_claim() {
        let repo = test_repo().await;
        let (_, due) = saved_execution(&repo).await;
        let (_, later) = saved_execution(&repo).await;

        let now = Utc::now();
        let carried = Some("step 0 (EMAIL) failed: smtp down".to_string());
        repo.update_execution(&due.id, &ExecutionUpdate::waiting(2, now - TimeDelta::seconds(5), carried))
            .await
            .unwrap();
        repo.update_execution(&later.id, &ExecutionUpdate::waiting(2, now + TimeDelta::hours(1), None))
            .await
            .unwrap();

        let listed = repo.list_due_executions(now, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, due.id);
        assert_eq!(listed[0].next_step_index, Some(2));
        assert_eq!(listed[0].error.as_deref(), Some("step 0 (EMAIL) failed: smtp down"));

        assert!(repo.claim_due_execution(&due.id, now).await.unwrap());
        assert!(!repo.claim_due_execution(&due.id, now).await.unwrap(), "second claim must lose");
        assert!(!repo.claim_due_execution(&later.id, now).await.unwrap());

        let claimed = repo.get_execution(&due.id).await.unwrap().unwrap();
        assert_eq!(claimed.status, ExecutionStatus::Pending);
    }

    #[tokio::test]
    async fn test_delete_cascades_executions() {
        let repo = test_repo().await;
        let (wf, exec) = saved_execution(&repo).await;

        assert!(repo.delete_workflow(&wf.id).await.unwrap());
        assert!(!repo.delete_workflow(&wf.id).await.unwrap());
        assert!(repo.get_execution(&exec.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_executions_are_company_scoped() {
        let repo = test_repo().await;
        let (wf, first) = saved_execution(&repo).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = WorkflowExecution::pending(&wf, TRIGGER_TEST, json!({}));
        repo.create_execution(&second).await.unwrap();
        saved_execution(&repo).await;

        let recent = repo.list_recent_executions(&wf.company_id, 5).await.unwrap();
        let ids: Vec<Uuid> = recent.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let limited = repo.list_executions(&wf.id, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, second.id);
    }
}
