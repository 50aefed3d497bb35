//! Resume poller for executions parked on a long WAIT.
//!
//! Parked executions live in the store with a `resume_at` timestamp, so runs
//! parked before a restart are picked up by the first tick after it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use legacymark_types::config::ExecutorConfig;
use legacymark_types::error::WorkflowError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::repository::workflow::WorkflowRepository;

use super::executor::WorkflowExecutor;

pub struct ResumePoller<R: WorkflowRepository> {
    executor: Arc<WorkflowExecutor<R>>,
    interval: Duration,
    batch_size: u32,
}

impl<R: WorkflowRepository + 'static> ResumePoller<R> {
    pub fn new(executor: Arc<WorkflowExecutor<R>>, config: &ExecutorConfig) -> Self {
        Self {
            executor,
            interval: Duration::from_secs(config.resume_poll_interval_secs.max(1)),
            batch_size: config.resume_batch_size.max(1),
        }
    }

    /// Resume every due execution once. Returns how many were resumed.
    ///
    /// Executions are resumed concurrently; one failing resume is logged and
    /// does not affect the others.
    pub async fn tick(&self) -> Result<usize, WorkflowError> {
        let due = self
            .executor
            .repository()
            .list_due_executions(Utc::now(), self.batch_size)
            .await?;
        if due.is_empty() {
            return Ok(0);
        }

        tracing::debug!(count = due.len(), "resuming due executions");

        let mut handles = Vec::with_capacity(due.len());
        for execution in due {
            let executor = Arc::clone(&self.executor);
            let id = execution.id;
            handles.push((id, tokio::spawn(async move { executor.resume(id).await })));
        }

        let mut resumed = 0;
        for (id, handle) in handles {
            match handle.await {
                Ok(Ok(Some(outcome))) => {
                    resumed += 1;
                    tracing::debug!(execution_id = %id, status = %outcome.status, "execution resumed");
                }
                // Claimed by someone else in the meantime
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    tracing::error!(execution_id = %id, error = %e, "failed to resume execution");
                }
                Err(e) => {
                    tracing::error!(execution_id = %id, error = %e, "resume task aborted");
                }
            }
        }
        Ok(resumed)
    }

    /// Poll on an interval until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            tracing::info!(interval_secs = self.interval.as_secs(), "resume poller started");
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        tracing::info!("resume poller shutdown requested");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.tick().await {
                            tracing::error!(error = %e, "resume poll failed");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_workflow, InMemoryWorkflowRepository, RecordingActions};
    use legacymark_types::workflow::{
        ExecutionStatus, LogStep, StepDefinition, StepKind, WaitStep, TRIGGER_TEST,
    };
    use serde_json::json;

    fn setup() -> (Arc<InMemoryWorkflowRepository>, Arc<WorkflowExecutor<InMemoryWorkflowRepository>>) {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let executor = Arc::new(WorkflowExecutor::new(
            repo.clone(),
            Arc::new(RecordingActions::default()),
            &ExecutorConfig::default(),
        ));
        (repo, executor)
    }

    fn parked_workflow() -> Vec<StepDefinition> {
        vec![
            StepDefinition::new(StepKind::Wait(WaitStep { delay: 120 })),
            StepDefinition::new(StepKind::Log(LogStep {
                message: "after wait".to_string(),
            })),
        ]
    }

    #[tokio::test]
    async fn test_tick_resumes_only_due_executions() {
        let (repo, executor) = setup();
        let wf = sample_workflow(TRIGGER_TEST, parked_workflow());
        repo.insert(wf.clone());

        let due = executor.execute(wf.id, TRIGGER_TEST, json!({})).await.unwrap();
        let later = executor.execute(wf.id, TRIGGER_TEST, json!({})).await.unwrap();
        repo.make_due(due.execution_id);

        let poller = ResumePoller::new(executor.clone(), &ExecutorConfig::default());
        assert_eq!(poller.tick().await.unwrap(), 1);

        assert_eq!(
            repo.execution(due.execution_id).unwrap().status,
            ExecutionStatus::Success
        );
        assert_eq!(
            repo.execution(later.execution_id).unwrap().status,
            ExecutionStatus::Waiting
        );

        // Nothing left to resume
        assert_eq!(poller.tick().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_spawned_poller_stops_on_cancel() {
        let (_repo, executor) = setup();
        let poller = ResumePoller::new(executor, &ExecutorConfig::default());
        let cancel = CancellationToken::new();

        let handle = poller.spawn(cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("poller did not stop")
            .unwrap();
    }
}
