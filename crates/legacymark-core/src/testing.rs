//! Test doubles shared by the engine's unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use legacymark_types::company::CompanyId;
use legacymark_types::error::RepositoryError;
use legacymark_types::task::{Task, TaskStatus};
use legacymark_types::workflow::{
    ExecutionLogEntry, ExecutionStatus, StepDefinition, Workflow, WorkflowExecution,
};
use uuid::Uuid;

use crate::repository::workflow::{ExecutionUpdate, WorkflowRepository};
use crate::workflow::step_runner::{
    ActionContext, ActionError, ActionFuture, ChatMessage, DeliveryReceipt, EmailMessage,
    HttpCall, HttpCallResult, PhoneMessage, TaskRequest,
};

/// An active workflow owned by a fresh company.
pub fn sample_workflow(trigger_type: &str, steps: Vec<StepDefinition>) -> Workflow {
    sample_workflow_for(CompanyId::new(), trigger_type, steps)
}

pub fn sample_workflow_for(
    company_id: CompanyId,
    trigger_type: &str,
    steps: Vec<StepDefinition>,
) -> Workflow {
    let now = Utc::now();
    Workflow {
        id: Uuid::now_v7(),
        company_id,
        name: format!("{trigger_type} workflow"),
        description: None,
        trigger_type: trigger_type.to_string(),
        trigger_config: legacymark_types::workflow::empty_object(),
        steps,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Poll until the execution reaches a terminal status (or WAITING), for
/// fire-and-forget dispatch tests.
pub async fn wait_for_settled(repo: &InMemoryWorkflowRepository, id: Uuid) -> WorkflowExecution {
    for _ in 0..200 {
        if let Some(exec) = repo.execution(id)
            && (exec.status.is_terminal() || exec.status == ExecutionStatus::Waiting)
        {
            return exec;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("execution {id} did not settle");
}

// ---------------------------------------------------------------------------
// InMemoryWorkflowRepository
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    workflows: Mutex<HashMap<Uuid, Workflow>>,
    executions: Mutex<HashMap<Uuid, WorkflowExecution>>,
}

impl InMemoryWorkflowRepository {
    pub fn insert(&self, workflow: Workflow) {
        self.workflows.lock().unwrap().insert(workflow.id, workflow);
    }

    pub fn execution(&self, id: Uuid) -> Option<WorkflowExecution> {
        self.executions.lock().unwrap().get(&id).cloned()
    }

    pub fn execution_count(&self) -> usize {
        self.executions.lock().unwrap().len()
    }

    pub fn executions_of(&self, workflow_id: Uuid) -> Vec<WorkflowExecution> {
        self.executions
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect()
    }

    /// Pull a parked execution's resume time into the past.
    pub fn make_due(&self, id: Uuid) {
        if let Some(exec) = self.executions.lock().unwrap().get_mut(&id) {
            exec.resume_at = Some(Utc::now() - chrono::TimeDelta::seconds(1));
        }
    }

    fn sorted_desc(mut executions: Vec<WorkflowExecution>, limit: u32) -> Vec<WorkflowExecution> {
        executions.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        executions.truncate(limit as usize);
        executions
    }
}

impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        self.insert(workflow.clone());
        Ok(())
    }

    async fn get_workflow(&self, id: &Uuid) -> Result<Option<Workflow>, RepositoryError> {
        Ok(self.workflows.lock().unwrap().get(id).cloned())
    }

    async fn list_workflows(&self, company_id: &CompanyId) -> Result<Vec<Workflow>, RepositoryError> {
        let mut list: Vec<Workflow> = self
            .workflows
            .lock()
            .unwrap()
            .values()
            .filter(|w| w.company_id == *company_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn list_active_by_trigger(
        &self,
        trigger_type: &str,
        company_id: Option<&CompanyId>,
    ) -> Result<Vec<Workflow>, RepositoryError> {
        Ok(self
            .workflows
            .lock()
            .unwrap()
            .values()
            .filter(|w| w.is_active && w.trigger_type == trigger_type)
            .filter(|w| company_id.is_none_or(|c| w.company_id == *c))
            .cloned()
            .collect())
    }

    async fn set_workflow_active(&self, id: &Uuid, active: bool) -> Result<bool, RepositoryError> {
        match self.workflows.lock().unwrap().get_mut(id) {
            Some(wf) => {
                wf.is_active = active;
                wf.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_workflow(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let existed = self.workflows.lock().unwrap().remove(id).is_some();
        self.executions
            .lock()
            .unwrap()
            .retain(|_, e| e.workflow_id != *id);
        Ok(existed)
    }

    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<(), RepositoryError> {
        self.executions
            .lock()
            .unwrap()
            .insert(execution.id, execution.clone());
        Ok(())
    }

    async fn append_execution_log(
        &self,
        execution_id: &Uuid,
        entry: &ExecutionLogEntry,
    ) -> Result<(), RepositoryError> {
        let mut executions = self.executions.lock().unwrap();
        let exec = executions
            .get_mut(execution_id)
            .ok_or(RepositoryError::NotFound)?;
        exec.logs.push(entry.clone());
        Ok(())
    }

    async fn update_execution(
        &self,
        execution_id: &Uuid,
        update: &ExecutionUpdate,
    ) -> Result<(), RepositoryError> {
        let mut executions = self.executions.lock().unwrap();
        let exec = executions
            .get_mut(execution_id)
            .ok_or(RepositoryError::NotFound)?;
        exec.status = update.status;
        exec.completed_at = update.completed_at;
        exec.error = update.error.clone();
        exec.next_step_index = update.next_step_index;
        exec.resume_at = update.resume_at;
        Ok(())
    }

    async fn get_execution(
        &self,
        execution_id: &Uuid,
    ) -> Result<Option<WorkflowExecution>, RepositoryError> {
        Ok(self.execution(*execution_id))
    }

    async fn list_executions(
        &self,
        workflow_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<WorkflowExecution>, RepositoryError> {
        Ok(Self::sorted_desc(self.executions_of(*workflow_id), limit))
    }

    async fn list_recent_executions(
        &self,
        company_id: &CompanyId,
        limit: u32,
    ) -> Result<Vec<WorkflowExecution>, RepositoryError> {
        let all: Vec<WorkflowExecution> = self
            .executions
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.company_id == *company_id)
            .cloned()
            .collect();
        Ok(Self::sorted_desc(all, limit))
    }

    async fn list_due_executions(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<WorkflowExecution>, RepositoryError> {
        let mut due: Vec<WorkflowExecution> = self
            .executions
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.status == ExecutionStatus::Waiting && e.resume_at.is_some_and(|t| t <= now))
            .cloned()
            .collect();
        due.sort_by_key(|e| e.resume_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn claim_due_execution(
        &self,
        execution_id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut executions = self.executions.lock().unwrap();
        match executions.get_mut(execution_id) {
            Some(exec)
                if exec.status == ExecutionStatus::Waiting
                    && exec.resume_at.is_some_and(|t| t <= now) =>
            {
                exec.status = ExecutionStatus::Pending;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingActions
// ---------------------------------------------------------------------------

/// `ActionContext` that records every outbound call instead of performing it.
pub struct RecordingActions {
    calls: Mutex<Vec<String>>,
    emails: Mutex<Vec<EmailMessage>>,
    tasks: Mutex<Vec<TaskRequest>>,
    email_failure: Option<String>,
    http_status: u16,
}

impl Default for RecordingActions {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            emails: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            email_failure: None,
            http_status: 200,
        }
    }
}

impl RecordingActions {
    pub fn failing_email(message: &str) -> Self {
        Self {
            email_failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn with_http_status(status: u16) -> Self {
        Self {
            http_status: status,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn emails(&self) -> Vec<EmailMessage> {
        self.emails.lock().unwrap().clone()
    }

    pub fn tasks(&self) -> Vec<TaskRequest> {
        self.tasks.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ActionContext for RecordingActions {
    fn send_email(&self, message: EmailMessage) -> ActionFuture<'_, DeliveryReceipt> {
        Box::pin(async move {
            if let Some(reason) = &self.email_failure {
                return Err(ActionError::Rejected(reason.clone()));
            }
            self.record(format!("email:{}", message.to));
            self.emails.lock().unwrap().push(message);
            Ok(DeliveryReceipt {
                id: "email-test".to_string(),
            })
        })
    }

    fn post_chat_message(&self, message: ChatMessage) -> ActionFuture<'_, ()> {
        Box::pin(async move {
            self.record(format!("chat:{}", message.webhook_url));
            Ok(())
        })
    }

    fn http_request(&self, call: HttpCall) -> ActionFuture<'_, HttpCallResult> {
        Box::pin(async move {
            self.record(format!("http:{} {}", call.method, call.url));
            Ok(HttpCallResult {
                status: self.http_status,
            })
        })
    }

    fn send_sms(&self, message: PhoneMessage) -> ActionFuture<'_, DeliveryReceipt> {
        Box::pin(async move {
            self.record(format!("sms:{}", message.to));
            Ok(DeliveryReceipt {
                id: "SMtest".to_string(),
            })
        })
    }

    fn send_whatsapp(&self, message: PhoneMessage) -> ActionFuture<'_, DeliveryReceipt> {
        Box::pin(async move {
            self.record(format!("whatsapp:{}", message.to));
            Ok(DeliveryReceipt {
                id: "WAMtest".to_string(),
            })
        })
    }

    fn create_task(&self, request: TaskRequest) -> ActionFuture<'_, Task> {
        Box::pin(async move {
            self.record(format!("task:{}", request.title));
            let task = Task {
                id: Uuid::now_v7(),
                company_id: request.company_id,
                deal_id: request.deal_id.clone(),
                assignee_id: request.assignee_id.clone(),
                title: request.title.clone(),
                description: request.description.clone(),
                priority: request.priority,
                status: TaskStatus::Todo,
                execution_id: Some(request.execution_id),
                created_at: Utc::now(),
            };
            self.tasks.lock().unwrap().push(request);
            Ok(task)
        })
    }
}
