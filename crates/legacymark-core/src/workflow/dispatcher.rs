//! Trigger dispatcher: fans an event out to every matching active workflow.
//!
//! Matching is by normalized trigger type, restricted to one company when a
//! tenant is given, then filtered by each workflow's `targetStage`. Every
//! match gets its own PENDING execution record before the run is spawned, so
//! the caller can report execution ids straight away.

use std::sync::Arc;

use legacymark_types::company::TenantContext;
use legacymark_types::error::WorkflowError;
use legacymark_types::workflow::{normalize_trigger_type, Workflow};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::repository::workflow::WorkflowRepository;

use super::executor::{ExecutionOutcome, WorkflowExecutor};

/// Status reported for runs spawned in the background.
pub const STATUS_STARTED: &str = "STARTED";

/// Status reported for a match whose execution record could not be created.
pub const STATUS_ERROR: &str = "ERROR";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDetail {
    pub workflow_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<Uuid>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResult {
    /// Number of workflows that matched and were started.
    pub executed: usize,
    pub details: Vec<TriggerDetail>,
}

pub struct TriggerDispatcher<R: WorkflowRepository> {
    executor: Arc<WorkflowExecutor<R>>,
}

impl<R: WorkflowRepository + 'static> TriggerDispatcher<R> {
    pub fn new(executor: Arc<WorkflowExecutor<R>>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<WorkflowExecutor<R>> {
        &self.executor
    }

    /// Start every matching workflow in the background and return at once.
    pub async fn trigger(
        &self,
        tenant: Option<&TenantContext>,
        trigger_type: &str,
        payload: Value,
    ) -> Result<TriggerResult, WorkflowError> {
        let (trigger_type, workflows) = self.matching(tenant, trigger_type, &payload).await?;

        let mut details = Vec::with_capacity(workflows.len());
        for workflow in workflows {
            let execution = match self.executor.begin(&workflow, &trigger_type, payload.clone()).await {
                Ok(execution) => execution,
                Err(e) => {
                    tracing::error!(workflow_id = %workflow.id, error = %e, "failed to start workflow");
                    details.push(TriggerDetail {
                        workflow_id: workflow.id,
                        execution_id: None,
                        status: STATUS_ERROR.to_string(),
                        error: Some(e.to_string()),
                    });
                    continue;
                }
            };

            details.push(TriggerDetail {
                workflow_id: workflow.id,
                execution_id: Some(execution.id),
                status: STATUS_STARTED.to_string(),
                error: None,
            });

            let executor = Arc::clone(&self.executor);
            tokio::spawn(async move {
                if let Err(e) = executor.run(&workflow, execution).await {
                    tracing::error!(workflow_id = %workflow.id, error = %e, "background workflow run failed");
                }
            });
        }

        Ok(summarize(details))
    }

    /// Run every matching workflow concurrently and report final statuses.
    pub async fn trigger_and_wait(
        &self,
        tenant: Option<&TenantContext>,
        trigger_type: &str,
        payload: Value,
    ) -> Result<TriggerResult, WorkflowError> {
        let (trigger_type, workflows) = self.matching(tenant, trigger_type, &payload).await?;

        let mut handles = Vec::with_capacity(workflows.len());
        for workflow in workflows {
            let executor = Arc::clone(&self.executor);
            let trigger_type = trigger_type.clone();
            let payload = payload.clone();
            let workflow_id = workflow.id;
            let handle = tokio::spawn(async move {
                let execution = executor.begin(&workflow, &trigger_type, payload).await?;
                executor.run(&workflow, execution).await
            });
            handles.push((workflow_id, handle));
        }

        let mut details = Vec::with_capacity(handles.len());
        for (workflow_id, handle) in handles {
            let detail = match handle.await {
                Ok(Ok(outcome)) => detail_from_outcome(&outcome),
                Ok(Err(e)) => TriggerDetail {
                    workflow_id,
                    execution_id: None,
                    status: STATUS_ERROR.to_string(),
                    error: Some(e.to_string()),
                },
                Err(join_err) => TriggerDetail {
                    workflow_id,
                    execution_id: None,
                    status: STATUS_ERROR.to_string(),
                    error: Some(format!("execution task aborted: {join_err}")),
                },
            };
            details.push(detail);
        }

        Ok(summarize(details))
    }

    /// Run one workflow by id, bypassing trigger matching.
    ///
    /// `source` is recorded as the execution's trigger type (e.g. `WEBHOOK`).
    pub async fn execute_direct(
        &self,
        workflow_id: Uuid,
        source: &str,
        payload: Value,
    ) -> Result<ExecutionOutcome, WorkflowError> {
        self.executor.execute(workflow_id, source, payload).await
    }

    async fn matching(
        &self,
        tenant: Option<&TenantContext>,
        trigger_type: &str,
        payload: &Value,
    ) -> Result<(String, Vec<Workflow>), WorkflowError> {
        let trigger_type = normalize_trigger_type(trigger_type);
        if trigger_type.is_empty() {
            return Err(WorkflowError::Validation("Missing trigger type".to_string()));
        }

        let candidates = self
            .executor
            .repository()
            .list_active_by_trigger(&trigger_type, tenant.map(|t| &t.company_id))
            .await?;
        let total = candidates.len();

        let matched: Vec<Workflow> = candidates
            .into_iter()
            .filter(|w| w.accepts_payload(payload))
            .collect();

        tracing::info!(
            trigger_type = %trigger_type,
            company_id = ?tenant.map(|t| t.company_id.to_string()),
            candidates = total,
            matched = matched.len(),
            "dispatching trigger"
        );
        Ok((trigger_type, matched))
    }
}

fn detail_from_outcome(outcome: &ExecutionOutcome) -> TriggerDetail {
    TriggerDetail {
        workflow_id: outcome.workflow_id,
        execution_id: Some(outcome.execution_id),
        status: outcome.status.to_string(),
        error: outcome.error.clone(),
    }
}

fn summarize(details: Vec<TriggerDetail>) -> TriggerResult {
    let executed = details
        .iter()
        .filter(|d| d.execution_id.is_some())
        .count();
    TriggerResult { executed, details }
}
