//! Workflow executor: sequential step execution with a durable log trail.
//!
//! # Execution flow
//!
//! 1. Load the workflow; unknown or inactive workflows fail before any record
//!    is written.
//! 2. Create a PENDING `WorkflowExecution`.
//! 3. Run each step through the `StepRunner`, appending one log entry per step.
//! 4. A FAILED step halts the run unless it sets `continue_on_error`; a false
//!    CONDITION halts it as CANCELLED; a long WAIT parks it as WAITING with a
//!    resume point.
//! 5. Finalize as SUCCESS, FAILED or CANCELLED.
//!
//! Parked executions are continued by [`WorkflowExecutor::resume`], normally
//! driven by the resume poller.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use legacymark_types::config::ExecutorConfig;
use legacymark_types::error::WorkflowError;
use legacymark_types::workflow::{
    ExecutionLogEntry, ExecutionStatus, Workflow, WorkflowExecution,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::repository::workflow::{ExecutionUpdate, WorkflowRepository};

use super::step_runner::{ActionContext, StepContext, StepFlow, StepRunner};

/// Summary of an execution after the executor stopped driving it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    /// Terminal status, or WAITING when parked on a long WAIT.
    pub status: ExecutionStatus,
    /// Steps run during this drive (not counting earlier drives before a resume).
    pub steps_run: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Sequential workflow executor.
///
/// Generic over `R: WorkflowRepository` for storage flexibility.
pub struct WorkflowExecutor<R: WorkflowRepository> {
    repo: Arc<R>,
    runner: StepRunner,
}

impl<R: WorkflowRepository + 'static> WorkflowExecutor<R> {
    pub fn new(repo: Arc<R>, actions: Arc<dyn ActionContext>, config: &ExecutorConfig) -> Self {
        Self {
            repo,
            runner: StepRunner::new(
                actions,
                Duration::from_secs(config.inline_wait_limit_secs),
            ),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Load a workflow that may be run: it must exist and be active.
    pub async fn load_runnable(&self, workflow_id: Uuid) -> Result<Workflow, WorkflowError> {
        let workflow = self
            .repo
            .get_workflow(&workflow_id)
            .await?
            .ok_or(WorkflowError::NotFound(workflow_id))?;

        if !workflow.is_active {
            return Err(WorkflowError::Inactive(workflow_id));
        }
        Ok(workflow)
    }

    /// Run a workflow by id to completion (or until it parks on a WAIT).
    pub async fn execute(
        &self,
        workflow_id: Uuid,
        trigger_type: &str,
        payload: Value,
    ) -> Result<ExecutionOutcome, WorkflowError> {
        let workflow = self.load_runnable(workflow_id).await?;
        let execution = self.begin(&workflow, trigger_type, payload).await?;
        self.run(&workflow, execution).await
    }

    /// Create the PENDING record for a run without executing any step.
    pub async fn begin(
        &self,
        workflow: &Workflow,
        trigger_type: &str,
        payload: Value,
    ) -> Result<WorkflowExecution, WorkflowError> {
        let execution = WorkflowExecution::pending(workflow, trigger_type, payload);
        self.repo.create_execution(&execution).await?;

        tracing::info!(
            execution_id = %execution.id,
            workflow_id = %workflow.id,
            workflow = %workflow.name,
            trigger_type,
            steps = workflow.steps.len(),
            "starting workflow execution"
        );
        Ok(execution)
    }

    /// Drive a freshly begun execution from its first step.
    pub async fn run(
        &self,
        workflow: &Workflow,
        execution: WorkflowExecution,
    ) -> Result<ExecutionOutcome, WorkflowError> {
        self.drive(workflow, &execution, 0, None).await
    }

    /// Continue a parked execution once its resume time has passed.
    ///
    /// Returns `Ok(None)` when the execution is not claimable: not WAITING,
    /// not yet due, or already claimed by another poller.
    pub async fn resume(
        &self,
        execution_id: Uuid,
    ) -> Result<Option<ExecutionOutcome>, WorkflowError> {
        if !self.repo.claim_due_execution(&execution_id, Utc::now()).await? {
            return Ok(None);
        }

        let execution = self
            .repo
            .get_execution(&execution_id)
            .await?
            .ok_or(WorkflowError::ExecutionNotFound(execution_id))?;
        let start = execution.next_step_index.unwrap_or(0);
        let prior_failure = prior_failure(&execution);

        let workflow = match self.repo.get_workflow(&execution.workflow_id).await? {
            Some(workflow) if workflow.is_active => workflow,
            Some(_) => {
                return self
                    .abandon(&execution, ExecutionStatus::Cancelled, "workflow was deactivated while waiting")
                    .await
                    .map(Some);
            }
            None => {
                return self
                    .abandon(&execution, ExecutionStatus::Failed, "workflow was deleted while waiting")
                    .await
                    .map(Some);
            }
        };

        tracing::info!(
            execution_id = %execution.id,
            workflow_id = %workflow.id,
            next_step = start,
            prior_failure = prior_failure.is_some(),
            "resuming workflow execution"
        );
        self.drive(&workflow, &execution, start, prior_failure)
            .await
            .map(Some)
    }

    async fn abandon(
        &self,
        execution: &WorkflowExecution,
        status: ExecutionStatus,
        reason: &str,
    ) -> Result<ExecutionOutcome, WorkflowError> {
        tracing::warn!(execution_id = %execution.id, reason, "abandoning parked execution");
        self.repo
            .update_execution(
                &execution.id,
                &ExecutionUpdate::finished(status, Some(reason.to_string())),
            )
            .await?;

        Ok(ExecutionOutcome {
            execution_id: execution.id,
            workflow_id: execution.workflow_id,
            status,
            steps_run: 0,
            error: Some(reason.to_string()),
        })
    }

    /// Run steps from `start`; on a storage error, try to mark the run FAILED
    /// before returning the error.
    async fn drive(
        &self,
        workflow: &Workflow,
        execution: &WorkflowExecution,
        start: usize,
        prior_failure: Option<String>,
    ) -> Result<ExecutionOutcome, WorkflowError> {
        match self.run_steps(workflow, execution, start, prior_failure).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(
                    execution_id = %execution.id,
                    workflow_id = %workflow.id,
                    error = %e,
                    "workflow execution aborted"
                );
                let update = ExecutionUpdate::finished(ExecutionStatus::Failed, Some(e.to_string()));
                if let Err(mark_err) = self.repo.update_execution(&execution.id, &update).await {
                    tracing::error!(
                        execution_id = %execution.id,
                        error = %mark_err,
                        "failed to mark aborted execution as FAILED"
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_steps(
        &self,
        workflow: &Workflow,
        execution: &WorkflowExecution,
        start: usize,
        prior_failure: Option<String>,
    ) -> Result<ExecutionOutcome, WorkflowError> {
        // First failure wins, including one recorded before a park
        let mut first_failure = prior_failure;
        let mut halted = false;
        let mut steps_run = 0;

        for (index, step) in workflow.steps.iter().enumerate().skip(start) {
            let ctx = StepContext {
                execution_id: execution.id,
                company_id: workflow.company_id,
                step_index: index,
                payload: &execution.trigger_payload,
            };
            let result = self.runner.run(&step.kind, &ctx).await;

            let entry = ExecutionLogEntry::new(
                index,
                step.kind.step_type(),
                result.status,
                result.details.clone(),
            );
            self.repo.append_execution_log(&execution.id, &entry).await?;
            steps_run += 1;

            tracing::debug!(
                execution_id = %execution.id,
                step_index = index,
                step_type = step.kind.step_type(),
                status = %result.status,
                "step completed"
            );

            match result.flow {
                StepFlow::Defer(delay) => {
                    let resume_at = resume_time(delay)?;
                    self.repo
                        .update_execution(
                            &execution.id,
                            &ExecutionUpdate::waiting(index + 1, resume_at, first_failure.clone()),
                        )
                        .await?;
                    tracing::info!(
                        execution_id = %execution.id,
                        resume_at = %resume_at,
                        next_step = index + 1,
                        "workflow execution parked"
                    );
                    return Ok(ExecutionOutcome {
                        execution_id: execution.id,
                        workflow_id: workflow.id,
                        status: ExecutionStatus::Waiting,
                        steps_run,
                        error: first_failure,
                    });
                }
                StepFlow::Halt => {
                    halted = true;
                    break;
                }
                StepFlow::Continue => {}
            }

            if result.status.is_failure() {
                if first_failure.is_none() {
                    first_failure = Some(
                        WorkflowError::StepExecution {
                            step_index: index,
                            step_type: step.kind.step_type().to_string(),
                            message: result.details,
                        }
                        .to_string(),
                    );
                }
                if !step.continue_on_error {
                    break;
                }
            }
        }

        let (status, error) = match first_failure {
            Some(failure) => (ExecutionStatus::Failed, Some(failure)),
            None if halted => (ExecutionStatus::Cancelled, None),
            None => (ExecutionStatus::Success, None),
        };

        self.repo
            .update_execution(&execution.id, &ExecutionUpdate::finished(status, error.clone()))
            .await?;

        tracing::info!(
            execution_id = %execution.id,
            workflow_id = %workflow.id,
            status = %status,
            steps_run,
            "workflow execution finished"
        );

        Ok(ExecutionOutcome {
            execution_id: execution.id,
            workflow_id: workflow.id,
            status,
            steps_run,
            error,
        })
    }
}

/// Failure carried by a parked execution: its stored error, or else the first
/// FAILED entry of its log.
fn prior_failure(execution: &WorkflowExecution) -> Option<String> {
    if let Some(error) = &execution.error {
        return Some(error.clone());
    }
    execution
        .logs
        .iter()
        .find(|entry| entry.status.is_failure())
        .map(|entry| {
            WorkflowError::StepExecution {
                step_index: entry.step_index,
                step_type: entry.step_type.clone(),
                message: entry.details.clone(),
            }
            .to_string()
        })
}

fn resume_time(delay: Duration) -> Result<chrono::DateTime<Utc>, WorkflowError> {
    i64::try_from(delay.as_secs())
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .ok_or_else(|| {
            WorkflowError::Validation(format!("wait of {}s is out of range", delay.as_secs()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_workflow, InMemoryWorkflowRepository, RecordingActions};
    use legacymark_types::workflow::{
        ConditionOperator, ConditionStep, EmailStep, LogStep, SlackStep, StepDefinition,
        StepKind, StepStatus, WaitStep, TRIGGER_TEST,
    };
    use serde_json::json;

    fn executor(
        repo: &Arc<InMemoryWorkflowRepository>,
        actions: RecordingActions,
    ) -> WorkflowExecutor<InMemoryWorkflowRepository> {
        WorkflowExecutor::new(repo.clone(), Arc::new(actions), &ExecutorConfig::default())
    }

    fn log(message: &str) -> StepDefinition {
        StepDefinition::new(StepKind::Log(LogStep {
            message: message.to_string(),
        }))
    }

    #[tokio::test]
    async fn test_successful_run_logs_every_step_in_order() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let wf = sample_workflow(TRIGGER_TEST, vec![log("a"), log("b"), log("c")]);
        repo.insert(wf.clone());

        let outcome = executor(&repo, RecordingActions::default())
            .execute(wf.id, TRIGGER_TEST, json!({}))
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Success);
        assert_eq!(outcome.steps_run, 3);

        let exec = repo.execution(outcome.execution_id).unwrap();
        assert_eq!(exec.status, ExecutionStatus::Success);
        assert!(exec.completed_at.is_some());
        let indexes: Vec<usize> = exec.logs.iter().map(|l| l.step_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert!(exec.logs.iter().all(|l| l.status == StepStatus::Success));
    }

    #[tokio::test]
    async fn test_inactive_workflow_creates_no_execution() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let mut wf = sample_workflow(TRIGGER_TEST, vec![log("a")]);
        wf.is_active = false;
        repo.insert(wf.clone());

        let err = executor(&repo, RecordingActions::default())
            .execute(wf.id, TRIGGER_TEST, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Inactive(id) if id == wf.id));
        assert_eq!(repo.execution_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_workflow_is_not_found() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let missing = Uuid::now_v7();
        let err = executor(&repo, RecordingActions::default())
            .execute(missing, TRIGGER_TEST, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(id) if id == missing));
        assert_eq!(repo.execution_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_step_halts_by_default() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let slack = StepDefinition::new(StepKind::Slack(SlackStep::default()));
        let wf = sample_workflow(TRIGGER_TEST, vec![log("a"), slack, log("never")]);
        repo.insert(wf.clone());

        let outcome = executor(&repo, RecordingActions::default())
            .execute(wf.id, TRIGGER_TEST, json!({}))
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Failed);

        let exec = repo.execution(outcome.execution_id).unwrap();
        assert_eq!(exec.logs.len(), 2);
        assert_eq!(exec.logs[1].status, StepStatus::Failed);
        assert_eq!(
            exec.error.as_deref(),
            Some("step 1 (SLACK) failed: Missing Webhook URL")
        );
    }

    #[tokio::test]
    async fn test_continue_on_error_runs_remaining_steps_but_fails_run() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let email = StepDefinition::new(StepKind::Email(EmailStep::default())).continue_on_error();
        let wf = sample_workflow(TRIGGER_TEST, vec![email, log("after")]);
        repo.insert(wf.clone());

        let outcome = executor(&repo, RecordingActions::failing_email("smtp down"))
            .execute(wf.id, TRIGGER_TEST, json!({"email": "ana@example.com"}))
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Failed);
        assert_eq!(outcome.steps_run, 2);

        let exec = repo.execution(outcome.execution_id).unwrap();
        assert_eq!(exec.logs[0].status, StepStatus::Failed);
        assert_eq!(exec.logs[1].status, StepStatus::Success);
    }

    #[tokio::test]
    async fn test_false_condition_cancels_run() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let condition = StepDefinition::new(StepKind::Condition(ConditionStep {
            variable: "source".to_string(),
            operator: ConditionOperator::Equals,
            value: json!("api"),
        }));
        let wf = sample_workflow(TRIGGER_TEST, vec![condition, log("never")]);
        repo.insert(wf.clone());

        let outcome = executor(&repo, RecordingActions::default())
            .execute(wf.id, TRIGGER_TEST, json!({"source": "web"}))
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Cancelled);

        let exec = repo.execution(outcome.execution_id).unwrap();
        assert_eq!(exec.logs.len(), 1);
        assert_eq!(exec.logs[0].status, StepStatus::False);
        assert!(exec.error.is_none());
    }

    #[tokio::test]
    async fn test_long_wait_parks_and_resume_continues() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let wait = StepDefinition::new(StepKind::Wait(WaitStep { delay: 3600 }));
        let wf = sample_workflow(TRIGGER_TEST, vec![log("before"), wait, log("after")]);
        repo.insert(wf.clone());
        let exec = executor(&repo, RecordingActions::default());

        let outcome = exec.execute(wf.id, TRIGGER_TEST, json!({})).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Waiting);

        let parked = repo.execution(outcome.execution_id).unwrap();
        assert_eq!(parked.status, ExecutionStatus::Waiting);
        assert_eq!(parked.next_step_index, Some(2));
        assert!(parked.resume_at.is_some());
        assert_eq!(parked.logs[1].status, StepStatus::Scheduled);

        // Not due yet
        assert!(exec.resume(outcome.execution_id).await.unwrap().is_none());

        repo.make_due(outcome.execution_id);
        let resumed = exec.resume(outcome.execution_id).await.unwrap().unwrap();
        assert_eq!(resumed.status, ExecutionStatus::Success);
        assert_eq!(resumed.steps_run, 1);

        let done = repo.execution(outcome.execution_id).unwrap();
        let indexes: Vec<usize> = done.logs.iter().map(|l| l.step_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert!(done.resume_at.is_none());

        // A finished execution cannot be claimed again
        assert!(exec.resume(outcome.execution_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failure_before_park_fails_resumed_run() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let email = StepDefinition::new(StepKind::Email(EmailStep::default())).continue_on_error();
        let wait = StepDefinition::new(StepKind::Wait(WaitStep { delay: 3600 }));
        let wf = sample_workflow(TRIGGER_TEST, vec![email, wait, log("after")]);
        repo.insert(wf.clone());
        let exec = executor(&repo, RecordingActions::failing_email("smtp down"));

        let outcome = exec
            .execute(wf.id, TRIGGER_TEST, json!({"email": "ana@example.com"}))
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Waiting);

        let parked = repo.execution(outcome.execution_id).unwrap();
        assert_eq!(parked.status, ExecutionStatus::Waiting);
        let parked_error = parked.error.clone().expect("failure kept while parked");
        assert!(parked_error.starts_with("step 0 (EMAIL) failed"));

        repo.make_due(outcome.execution_id);
        let resumed = exec.resume(outcome.execution_id).await.unwrap().unwrap();
        assert_eq!(resumed.status, ExecutionStatus::Failed);
        assert_eq!(resumed.steps_run, 1);

        let done = repo.execution(outcome.execution_id).unwrap();
        let statuses: Vec<StepStatus> = done.logs.iter().map(|l| l.status).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Failed, StepStatus::Scheduled, StepStatus::Success]
        );
        assert_eq!(done.status, ExecutionStatus::Failed);
        assert_eq!(done.error.as_deref(), Some(parked_error.as_str()));
    }

    #[tokio::test]
    async fn test_failure_before_park_outranks_later_false_condition() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let email = StepDefinition::new(StepKind::Email(EmailStep::default())).continue_on_error();
        let wait = StepDefinition::new(StepKind::Wait(WaitStep { delay: 3600 }));
        let condition = StepDefinition::new(StepKind::Condition(ConditionStep {
            variable: "source".to_string(),
            operator: ConditionOperator::Equals,
            value: json!("api"),
        }));
        let wf = sample_workflow(TRIGGER_TEST, vec![email, wait, condition, log("never")]);
        repo.insert(wf.clone());
        let exec = executor(&repo, RecordingActions::failing_email("smtp down"));

        let outcome = exec
            .execute(wf.id, TRIGGER_TEST, json!({"email": "ana@example.com", "source": "web"}))
            .await
            .unwrap();
        repo.make_due(outcome.execution_id);

        let resumed = exec.resume(outcome.execution_id).await.unwrap().unwrap();
        assert_eq!(resumed.status, ExecutionStatus::Failed);

        let done = repo.execution(outcome.execution_id).unwrap();
        assert_eq!(done.logs.len(), 3);
        assert_eq!(done.logs[2].status, StepStatus::False);
        assert!(done.error.unwrap().starts_with("step 0 (EMAIL) failed"));
    }

    #[tokio::test]
    async fn test_resume_recovers_failure_from_log_when_error_missing() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let email = StepDefinition::new(StepKind::Email(EmailStep::default())).continue_on_error();
        let wait = StepDefinition::new(StepKind::Wait(WaitStep { delay: 3600 }));
        let wf = sample_workflow(TRIGGER_TEST, vec![email, wait, log("after")]);
        repo.insert(wf.clone());
        let exec = executor(&repo, RecordingActions::failing_email("smtp down"));

        let outcome = exec
            .execute(wf.id, TRIGGER_TEST, json!({"email": "ana@example.com"}))
            .await
            .unwrap();
        let parked = repo.execution(outcome.execution_id).unwrap();
        repo.update_execution(
            &outcome.execution_id,
            &ExecutionUpdate::waiting(2, parked.resume_at.unwrap(), None),
        )
        .await
        .unwrap();
        repo.make_due(outcome.execution_id);

        let resumed = exec.resume(outcome.execution_id).await.unwrap().unwrap();
        assert_eq!(resumed.status, ExecutionStatus::Failed);
        assert!(resumed.error.unwrap().starts_with("step 0 (EMAIL) failed"));
    }

    #[tokio::test]
    async fn test_resume_of_deactivated_workflow_cancels() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let wait = StepDefinition::new(StepKind::Wait(WaitStep { delay: 600 }));
        let wf = sample_workflow(TRIGGER_TEST, vec![wait, log("after")]);
        repo.insert(wf.clone());
        let exec = executor(&repo, RecordingActions::default());

        let outcome = exec.execute(wf.id, TRIGGER_TEST, json!({})).await.unwrap();
        repo.set_workflow_active(&wf.id, false).await.unwrap();
        repo.make_due(outcome.execution_id);

        let resumed = exec.resume(outcome.execution_id).await.unwrap().unwrap();
        assert_eq!(resumed.status, ExecutionStatus::Cancelled);
        assert_eq!(repo.execution(outcome.execution_id).unwrap().logs.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_workflow_succeeds() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let wf = sample_workflow(TRIGGER_TEST, vec![]);
        repo.insert(wf.clone());

        let outcome = executor(&repo, RecordingActions::default())
            .execute(wf.id, TRIGGER_TEST, json!({}))
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Success);
        assert_eq!(outcome.steps_run, 0);
    }
}
