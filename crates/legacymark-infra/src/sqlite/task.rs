//! SQLite task repository implementation.

use legacymark_core::repository::task::TaskRepository;
use legacymark_types::company::CompanyId;
use legacymark_types::error::RepositoryError;
use legacymark_types::task::Task;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_uuid};

/// SQLite-backed implementation of `TaskRepository`.
#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: DatabasePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct TaskRow {
    id: String,
    company_id: String,
    deal_id: String,
    assignee_id: String,
    title: String,
    description: Option<String>,
    priority: String,
    status: String,
    execution_id: Option<String>,
    created_at: String,
}

impl TaskRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            company_id: row.try_get("company_id")?,
            deal_id: row.try_get("deal_id")?,
            assignee_id: row.try_get("assignee_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            priority: row.try_get("priority")?,
            status: row.try_get("status")?,
            execution_id: row.try_get("execution_id")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_task(self) -> Result<Task, RepositoryError> {
        Ok(Task {
            id: parse_uuid(&self.id)?,
            company_id: CompanyId::from_uuid(parse_uuid(&self.company_id)?),
            deal_id: self.deal_id,
            assignee_id: self.assignee_id,
            title: self.title,
            description: self.description,
            priority: self.priority.parse().map_err(RepositoryError::Query)?,
            status: self.status.parse().map_err(RepositoryError::Query)?,
            execution_id: self.execution_id.as_deref().map(parse_uuid).transpose()?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

impl TaskRepository for SqliteTaskRepository {
    async fn create_task(&self, task: &Task) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO tasks
               (id, company_id, deal_id, assignee_id, title, description, priority, status, execution_id, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(task.company_id.to_string())
        .bind(&task.deal_id)
        .bind(&task.assignee_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.priority.to_string())
        .bind(task.status.to_string())
        .bind(task.execution_id.map(|id| id.to_string()))
        .bind(format_datetime(&task.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_tasks(&self, company_id: &CompanyId, limit: u32) -> Result<Vec<Task>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT id, company_id, deal_id, assignee_id, title, description, priority, status, execution_id, created_at
               FROM tasks WHERE company_id = ? ORDER BY created_at DESC, id DESC LIMIT ?"#,
        )
        .bind(company_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                TaskRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_task()
            })
            .collect()
    }
}
