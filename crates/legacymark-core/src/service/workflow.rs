//! Workflow administration service.
//!
//! Every operation takes the caller's `TenantContext` explicitly. A workflow
//! or execution owned by another company is reported exactly like a missing
//! one, so ids from other tenants reveal nothing.

use std::sync::Arc;

use chrono::Utc;
use legacymark_types::company::TenantContext;
use legacymark_types::error::WorkflowError;
use legacymark_types::workflow::{
    empty_object, normalize_trigger_type, StepDefinition, StepKind, WaitStep, Workflow,
    WorkflowExecution, WorkflowInput,
};
use serde_json::Value;
use uuid::Uuid;

use crate::repository::workflow::WorkflowRepository;

/// Longest accepted workflow name, in characters.
pub const MAX_NAME_LEN: usize = 200;

/// Default page size for `recent_executions`.
pub const DEFAULT_RECENT_LIMIT: u32 = 5;

/// Upper bound for any execution listing.
pub const MAX_LIST_LIMIT: u32 = 100;

/// Validated form of a `WorkflowInput`.
struct ValidatedInput {
    name: String,
    description: Option<String>,
    trigger_type: String,
    trigger_config: Value,
    steps: Vec<StepDefinition>,
    is_active: Option<bool>,
}

pub struct WorkflowService<R: WorkflowRepository> {
    repo: Arc<R>,
}

impl<R: WorkflowRepository> WorkflowService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Create a workflow. New workflows are inactive unless `isActive` is set.
    pub async fn create(
        &self,
        tenant: &TenantContext,
        input: WorkflowInput,
    ) -> Result<Workflow, WorkflowError> {
        let input = validate(input)?;
        let now = Utc::now();

        let workflow = Workflow {
            id: Uuid::now_v7(),
            company_id: tenant.company_id,
            name: input.name,
            description: input.description,
            trigger_type: input.trigger_type,
            trigger_config: input.trigger_config,
            steps: input.steps,
            is_active: input.is_active.unwrap_or(false),
            created_at: now,
            updated_at: now,
        };
        self.repo.save_workflow(&workflow).await?;

        tracing::info!(
            workflow_id = %workflow.id,
            company_id = %tenant.company_id,
            trigger_type = %workflow.trigger_type,
            steps = workflow.steps.len(),
            "workflow created"
        );
        Ok(workflow)
    }

    /// Replace a workflow's definition. `isActive` is kept when omitted.
    pub async fn update(
        &self,
        tenant: &TenantContext,
        id: Uuid,
        input: WorkflowInput,
    ) -> Result<Workflow, WorkflowError> {
        let existing = self.get(tenant, id).await?;
        let input = validate(input)?;

        let workflow = Workflow {
            name: input.name,
            description: input.description,
            trigger_type: input.trigger_type,
            trigger_config: input.trigger_config,
            steps: input.steps,
            is_active: input.is_active.unwrap_or(existing.is_active),
            updated_at: Utc::now(),
            ..existing
        };
        self.repo.save_workflow(&workflow).await?;

        tracing::info!(workflow_id = %id, "workflow updated");
        Ok(workflow)
    }

    pub async fn get(&self, tenant: &TenantContext, id: Uuid) -> Result<Workflow, WorkflowError> {
        self.repo
            .get_workflow(&id)
            .await?
            .filter(|w| tenant.owns(&w.company_id))
            .ok_or(WorkflowError::NotFound(id))
    }

    /// All of the tenant's workflows, most recently updated first.
    pub async fn list(&self, tenant: &TenantContext) -> Result<Vec<Workflow>, WorkflowError> {
        Ok(self.repo.list_workflows(&tenant.company_id).await?)
    }

    /// The tenant's most recently created workflow, if any.
    pub async fn latest(&self, tenant: &TenantContext) -> Result<Option<Workflow>, WorkflowError> {
        let workflows = self.list(tenant).await?;
        Ok(workflows
            .into_iter()
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))))
    }

    pub async fn set_active(
        &self,
        tenant: &TenantContext,
        id: Uuid,
        active: bool,
    ) -> Result<Workflow, WorkflowError> {
        self.get(tenant, id).await?;
        if !self.repo.set_workflow_active(&id, active).await? {
            return Err(WorkflowError::NotFound(id));
        }

        tracing::info!(workflow_id = %id, active, "workflow toggled");
        self.get(tenant, id).await
    }

    /// Delete a workflow together with its executions.
    pub async fn delete(&self, tenant: &TenantContext, id: Uuid) -> Result<(), WorkflowError> {
        self.get(tenant, id).await?;
        if !self.repo.delete_workflow(&id).await? {
            return Err(WorkflowError::NotFound(id));
        }

        tracing::info!(workflow_id = %id, "workflow deleted");
        Ok(())
    }

    pub async fn list_executions(
        &self,
        tenant: &TenantContext,
        workflow_id: Uuid,
        limit: u32,
    ) -> Result<Vec<WorkflowExecution>, WorkflowError> {
        self.get(tenant, workflow_id).await?;
        Ok(self
            .repo
            .list_executions(&workflow_id, clamp_limit(limit))
            .await?)
    }

    /// The tenant's latest executions across all workflows (5 when `limit` is `None`).
    pub async fn recent_executions(
        &self,
        tenant: &TenantContext,
        limit: Option<u32>,
    ) -> Result<Vec<WorkflowExecution>, WorkflowError> {
        let limit = clamp_limit(limit.unwrap_or(DEFAULT_RECENT_LIMIT));
        Ok(self
            .repo
            .list_recent_executions(&tenant.company_id, limit)
            .await?)
    }

    pub async fn get_execution(
        &self,
        tenant: &TenantContext,
        id: Uuid,
    ) -> Result<WorkflowExecution, WorkflowError> {
        self.repo
            .get_execution(&id)
            .await?
            .filter(|e| tenant.owns(&e.company_id))
            .ok_or(WorkflowError::ExecutionNotFound(id))
    }
}

fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_LIST_LIMIT)
}

fn validate(input: WorkflowInput) -> Result<ValidatedInput, WorkflowError> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(WorkflowError::Validation("name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(WorkflowError::Validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }

    let trigger_type = normalize_trigger_type(&input.trigger_type);
    if trigger_type.is_empty() {
        return Err(WorkflowError::Validation("triggerType is required".to_string()));
    }

    let trigger_config = match input.trigger_config {
        None | Some(Value::Null) => empty_object(),
        Some(config @ Value::Object(_)) => config,
        Some(_) => {
            return Err(WorkflowError::Validation(
                "triggerConfig must be an object".to_string(),
            ));
        }
    };

    let steps = input
        .steps
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let step = StepDefinition::parse(raw)
                .map_err(|e| WorkflowError::Validation(format!("step {index}: {e}")))?;
            if matches!(&step.kind, StepKind::Wait(wait) if wait.delay > WaitStep::MAX_DELAY_SECS) {
                return Err(WorkflowError::Validation(format!(
                    "step {index}: wait delay must be at most {} seconds",
                    WaitStep::MAX_DELAY_SECS
                )));
            }
            Ok(step)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let description = input
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    Ok(ValidatedInput {
        name,
        description,
        trigger_type,
        trigger_config,
        steps,
        is_active: input.is_active,
    })
}
