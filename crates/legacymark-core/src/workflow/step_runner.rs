//! Step runner for all workflow step kinds.
//!
//! `StepRunner` dispatches on the `StepKind` variant. Each handler renders its
//! `{{key}}` templates against the trigger payload, performs the step through
//! the [`ActionContext`] collaborator, and returns a [`StepResult`] that the
//! executor appends to the execution log.
//!
//! Handlers never fail the run by returning an error: a collaborator failure
//! becomes a `FAILED` result and the executor applies the step's failure policy.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use legacymark_types::company::CompanyId;
use legacymark_types::task::{Task, TaskPriority};
use legacymark_types::workflow::{
    ConditionStep, CreateTaskStep, EmailStep, HttpMethod, HttpStep, LogStep, PhoneMessageStep,
    SlackStep, StepKind, StepStatus, WaitStep,
};
use serde_json::Value;
use uuid::Uuid;

use super::condition::evaluate_condition;
use super::template::{first_text_field, replace_variables};

// ---------------------------------------------------------------------------
// ActionContext (collaborator port)
// ---------------------------------------------------------------------------

/// Boxed future returned by [`ActionContext`] methods.
pub type ActionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ActionError>> + Send + 'a>>;

/// Errors reported by outbound collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The remote service answered but refused the request.
    #[error("{0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub webhook_url: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpCall {
    pub url: String,
    pub method: HttpMethod,
    /// Sent as the JSON body on POST.
    pub body: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpCallResult {
    pub status: u16,
}

impl HttpCallResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhoneMessage {
    pub to: String,
    pub body: String,
}

/// Provider-assigned identifier of a delivered message.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    pub company_id: CompanyId,
    pub execution_id: Uuid,
    pub deal_id: String,
    pub assignee_id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
}

/// Outbound capabilities needed by workflow steps, one method per capability.
///
/// Defined here so that the core crate stays free of HTTP and database
/// dependencies; the live implementation lives in legacymark-infra.
/// Methods return boxed futures so the trait stays dyn-compatible.
pub trait ActionContext: Send + Sync {
    fn send_email(&self, message: EmailMessage) -> ActionFuture<'_, DeliveryReceipt>;

    /// Post to a Slack or Discord incoming webhook.
    fn post_chat_message(&self, message: ChatMessage) -> ActionFuture<'_, ()>;

    fn http_request(&self, call: HttpCall) -> ActionFuture<'_, HttpCallResult>;

    fn send_sms(&self, message: PhoneMessage) -> ActionFuture<'_, DeliveryReceipt>;

    fn send_whatsapp(&self, message: PhoneMessage) -> ActionFuture<'_, DeliveryReceipt>;

    fn create_task(&self, request: TaskRequest) -> ActionFuture<'_, Task>;
}

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

/// What the executor should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFlow {
    Continue,
    /// Stop the run without failing it (CONDITION evaluated false).
    Halt,
    /// Park the run and continue with the next step after the delay.
    Defer(Duration),
}

/// Outcome of one step, as logged on the execution.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub status: StepStatus,
    pub details: String,
    pub flow: StepFlow,
}

impl StepResult {
    fn new(status: StepStatus, details: impl Into<String>) -> Self {
        Self {
            status,
            details: details.into(),
            flow: StepFlow::Continue,
        }
    }

    fn success(details: impl Into<String>) -> Self {
        Self::new(StepStatus::Success, details)
    }

    fn failed(details: impl Into<String>) -> Self {
        Self::new(StepStatus::Failed, details)
    }

    fn skipped(details: impl Into<String>) -> Self {
        Self::new(StepStatus::Skipped, details)
    }
}

/// Internal error type for step handlers; always converted to a FAILED result.
#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Per-step inputs handed to the runner by the executor.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub execution_id: Uuid,
    pub company_id: CompanyId,
    pub step_index: usize,
    pub payload: &'a Value,
}

#[derive(Debug, Clone, Copy)]
enum PhoneChannel {
    Sms,
    WhatsApp,
}

// ---------------------------------------------------------------------------
// StepRunner
// ---------------------------------------------------------------------------

/// Executes individual workflow steps by dispatching to kind-specific handlers.
pub struct StepRunner {
    actions: Arc<dyn ActionContext>,
    inline_wait_limit: Duration,
}

impl StepRunner {
    /// WAIT delays strictly below `inline_wait_limit` sleep in process; longer
    /// ones are deferred.
    pub fn new(actions: Arc<dyn ActionContext>, inline_wait_limit: Duration) -> Self {
        Self {
            actions,
            inline_wait_limit,
        }
    }

    /// Run a step and return its logged outcome.
    pub async fn run(&self, step: &StepKind, ctx: &StepContext<'_>) -> StepResult {
        let result = match step {
            StepKind::Log(cfg) => Ok(self.run_log(cfg, ctx)),
            StepKind::Email(cfg) => self.run_email(cfg, ctx).await,
            StepKind::Wait(cfg) => Ok(self.run_wait(cfg).await),
            StepKind::Condition(cfg) => Ok(self.run_condition(cfg, ctx)),
            StepKind::Slack(cfg) => self.run_slack(cfg, ctx).await,
            StepKind::CreateTask(cfg) => self.run_create_task(cfg, ctx).await,
            StepKind::Http(cfg) => self.run_http(cfg, ctx).await,
            StepKind::Sms(cfg) => self.run_phone_message(cfg, ctx, PhoneChannel::Sms).await,
            StepKind::WhatsApp(cfg) => {
                self.run_phone_message(cfg, ctx, PhoneChannel::WhatsApp)
                    .await
            }
        };

        result.unwrap_or_else(|e: StepError| {
            tracing::warn!(
                execution_id = %ctx.execution_id,
                step_index = ctx.step_index,
                step_type = step.step_type(),
                error = %e,
                "step failed"
            );
            StepResult::failed(e.to_string())
        })
    }

    fn run_log(&self, cfg: &LogStep, ctx: &StepContext<'_>) -> StepResult {
        let message = replace_variables(&cfg.message, ctx.payload);
        tracing::info!(
            execution_id = %ctx.execution_id,
            step_index = ctx.step_index,
            message = %message,
            "workflow log"
        );
        StepResult::success(message)
    }

    async fn run_email(&self, cfg: &EmailStep, ctx: &StepContext<'_>) -> Result<StepResult, StepError> {
        let explicit = cfg
            .to
            .as_deref()
            .map(|to| replace_variables(to, ctx.payload).trim().to_string())
            .filter(|to| !to.is_empty() && !to.contains("{{"));
        let Some(to) = explicit.or_else(|| first_text_field(ctx.payload, &["email", "contactEmail"]))
        else {
            return Ok(StepResult::skipped("No email address found"));
        };

        let subject = replace_variables(
            non_empty(cfg.subject.as_deref()).unwrap_or(EmailStep::DEFAULT_SUBJECT),
            ctx.payload,
        );
        let body = replace_variables(
            non_empty(cfg.body.as_deref()).unwrap_or(EmailStep::DEFAULT_BODY),
            ctx.payload,
        );

        let receipt = self
            .actions
            .send_email(EmailMessage {
                to: to.clone(),
                subject: subject.clone(),
                body,
            })
            .await?;

        Ok(StepResult::success(format!(
            "Sent \"{subject}\" to {to} ({})",
            receipt.id
        )))
    }

    async fn run_wait(&self, cfg: &WaitStep) -> StepResult {
        let delay = Duration::from_secs(cfg.delay);
        if delay < self.inline_wait_limit {
            tokio::time::sleep(delay).await;
            return StepResult::success(format!("Waited {}s", cfg.delay));
        }

        StepResult {
            status: StepStatus::Scheduled,
            details: format!("Resuming in {}s", cfg.delay),
            flow: StepFlow::Defer(delay),
        }
    }

    fn run_condition(&self, cfg: &ConditionStep, ctx: &StepContext<'_>) -> StepResult {
        let outcome = evaluate_condition(cfg, ctx.payload);
        if outcome.matched {
            StepResult::new(StepStatus::True, outcome.details)
        } else {
            StepResult {
                status: StepStatus::False,
                details: format!("{} (Stopping Workflow)", outcome.details),
                flow: StepFlow::Halt,
            }
        }
    }

    async fn run_slack(&self, cfg: &SlackStep, ctx: &StepContext<'_>) -> Result<StepResult, StepError> {
        let Some(webhook_url) = non_empty(cfg.webhook_url.as_deref()) else {
            return Ok(StepResult::failed("Missing Webhook URL"));
        };

        self.actions
            .post_chat_message(ChatMessage {
                webhook_url: webhook_url.to_string(),
                text: replace_variables(&cfg.message, ctx.payload),
            })
            .await?;

        Ok(StepResult::success("Sent to Chat"))
    }

    async fn run_create_task(
        &self,
        cfg: &CreateTaskStep,
        ctx: &StepContext<'_>,
    ) -> Result<StepResult, StepError> {
        let assignee = first_text_field(ctx.payload, &["userId", "authorId", "assignedTo"]);
        let deal = first_text_field(ctx.payload, &["dealId", "id"]);
        let (Some(assignee_id), Some(deal_id)) = (assignee, deal) else {
            return Ok(StepResult::failed("Missing Deal ID or User ID"));
        };

        let title = replace_variables(
            non_empty(cfg.task_title.as_deref()).unwrap_or(CreateTaskStep::DEFAULT_TITLE),
            ctx.payload,
        );
        let description = non_empty(cfg.task_description.as_deref())
            .map(|d| replace_variables(d, ctx.payload));

        let task = self
            .actions
            .create_task(TaskRequest {
                company_id: ctx.company_id,
                execution_id: ctx.execution_id,
                deal_id,
                assignee_id,
                title,
                description,
                priority: cfg.priority,
            })
            .await?;

        Ok(StepResult::success(format!("Created Task: {}", task.title)))
    }

    async fn run_http(&self, cfg: &HttpStep, ctx: &StepContext<'_>) -> Result<StepResult, StepError> {
        let url = replace_variables(&cfg.url, ctx.payload);
        if url.trim().is_empty() {
            return Ok(StepResult::failed("Missing URL"));
        }

        let result = self
            .actions
            .http_request(HttpCall {
                url: url.clone(),
                method: cfg.method,
                body: ctx.payload.clone(),
            })
            .await?;

        let details = format!("{} {} -> {}", cfg.method, url, result.status);
        Ok(if result.is_success() {
            StepResult::success(details)
        } else {
            StepResult::failed(details)
        })
    }

    async fn run_phone_message(
        &self,
        cfg: &PhoneMessageStep,
        ctx: &StepContext<'_>,
        channel: PhoneChannel,
    ) -> Result<StepResult, StepError> {
        let to = replace_variables(&cfg.phone_number, ctx.payload)
            .trim()
            .to_string();
        if to.is_empty() || to.contains("{{") {
            return Ok(StepResult::failed("Missing Phone Number"));
        }

        let message = PhoneMessage {
            to: to.clone(),
            body: replace_variables(&cfg.message, ctx.payload),
        };
        let (receipt, label) = match channel {
            PhoneChannel::Sms => (self.actions.send_sms(message).await?, "SMS"),
            PhoneChannel::WhatsApp => (self.actions.send_whatsapp(message).await?, "WhatsApp"),
        };

        Ok(StepResult::success(format!("{label} to {to} ({})", receipt.id)))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingActions;
    use legacymark_types::workflow::ConditionOperator;
    use serde_json::json;

    fn runner(actions: Arc<RecordingActions>) -> StepRunner {
        StepRunner::new(actions, Duration::from_secs(10))
    }

    fn ctx(payload: &Value) -> StepContext<'_> {
        StepContext {
            execution_id: Uuid::now_v7(),
            company_id: CompanyId::new(),
            step_index: 0,
            payload,
        }
    }

    #[tokio::test]
    async fn test_log_renders_message() {
        let actions = Arc::new(RecordingActions::default());
        let payload = json!({"name": "Ana"});
        let step = StepKind::Log(LogStep {
            message: "New lead {{name}}".to_string(),
        });

        let result = runner(actions.clone()).run(&step, &ctx(&payload)).await;
        assert_eq!(result.status, StepStatus::Success);
        assert_eq!(result.details, "New lead Ana");
        assert!(actions.calls().is_empty());
    }

    #[tokio::test]
    async fn test_email_uses_payload_address_and_defaults() {
        let actions = Arc::new(RecordingActions::default());
        let payload = json!({"contactEmail": "ana@example.com"});
        let step = StepKind::Email(EmailStep::default());

        let result = runner(actions.clone()).run(&step, &ctx(&payload)).await;
        assert_eq!(result.status, StepStatus::Success);
        assert_eq!(
            actions.emails(),
            vec![EmailMessage {
                to: "ana@example.com".to_string(),
                subject: "Update".to_string(),
                body: "Notification".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_email_renders_templates() {
        let actions = Arc::new(RecordingActions::default());
        let payload = json!({"email": "ana@example.com", "name": "Ana"});
        let step = StepKind::Email(EmailStep {
            subject: Some("Welcome {{name}}".to_string()),
            body: Some("Hi {{name}}, thanks!".to_string()),
            to: None,
        });

        runner(actions.clone()).run(&step, &ctx(&payload)).await;
        let sent = actions.emails();
        assert_eq!(sent[0].subject, "Welcome Ana");
        assert_eq!(sent[0].body, "Hi Ana, thanks!");
    }

    #[tokio::test]
    async fn test_email_without_recipient_is_skipped() {
        let actions = Arc::new(RecordingActions::default());
        let payload = json!({"name": "Ana"});
        let step = StepKind::Email(EmailStep {
            to: Some("{{email}}".to_string()),
            ..Default::default()
        });

        let result = runner(actions.clone()).run(&step, &ctx(&payload)).await;
        assert_eq!(result.status, StepStatus::Skipped);
        assert_eq!(result.details, "No email address found");
        assert!(actions.emails().is_empty());
    }

    #[tokio::test]
    async fn test_email_send_failure_is_failed_result() {
        let actions = Arc::new(RecordingActions::failing_email("mailbox unavailable"));
        let payload = json!({"email": "ana@example.com"});
        let step = StepKind::Email(EmailStep::default());

        let result = runner(actions).run(&step, &ctx(&payload)).await;
        assert_eq!(result.status, StepStatus::Failed);
        assert!(result.details.contains("mailbox unavailable"));
        assert_eq!(result.flow, StepFlow::Continue);
    }

    #[tokio::test]
    async fn test_short_wait_runs_inline() {
        let actions = Arc::new(RecordingActions::default());
        let payload = json!({});
        let result = runner(actions)
            .run(&StepKind::Wait(WaitStep { delay: 0 }), &ctx(&payload))
            .await;
        assert_eq!(result.status, StepStatus::Success);
        assert_eq!(result.flow, StepFlow::Continue);
    }

    #[tokio::test]
    async fn test_long_wait_is_deferred() {
        let actions = Arc::new(RecordingActions::default());
        let payload = json!({});
        let result = runner(actions)
            .run(&StepKind::Wait(WaitStep { delay: 3600 }), &ctx(&payload))
            .await;
        assert_eq!(result.status, StepStatus::Scheduled);
        assert_eq!(result.flow, StepFlow::Defer(Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn test_false_condition_halts() {
        let actions = Arc::new(RecordingActions::default());
        let payload = json!({"source": "web"});
        let step = StepKind::Condition(ConditionStep {
            variable: "source".to_string(),
            operator: ConditionOperator::Equals,
            value: json!("api"),
        });

        let result = runner(actions).run(&step, &ctx(&payload)).await;
        assert_eq!(result.status, StepStatus::False);
        assert_eq!(result.flow, StepFlow::Halt);
        assert!(result.details.ends_with("(Stopping Workflow)"));
    }

    #[tokio::test]
    async fn test_slack_without_url_fails() {
        let actions = Arc::new(RecordingActions::default());
        let payload = json!({});
        let step = StepKind::Slack(SlackStep {
            webhook_url: None,
            message: "hi".to_string(),
        });

        let result = runner(actions.clone()).run(&step, &ctx(&payload)).await;
        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.details, "Missing Webhook URL");
        assert!(actions.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_task_requires_deal_and_user() {
        let actions = Arc::new(RecordingActions::default());
        let step = StepKind::CreateTask(CreateTaskStep::default());

        let payload = json!({"userId": "u1"});
        let result = runner(actions.clone()).run(&step, &ctx(&payload)).await;
        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.details, "Missing Deal ID or User ID");

        let payload = json!({"authorId": "u1", "id": "deal-9", "name": "Acme"});
        let step = StepKind::CreateTask(CreateTaskStep {
            task_title: Some("Follow up {{name}}".to_string()),
            ..Default::default()
        });
        let result = runner(actions.clone()).run(&step, &ctx(&payload)).await;
        assert_eq!(result.status, StepStatus::Success);
        assert_eq!(result.details, "Created Task: Follow up Acme");

        let tasks = actions.tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].deal_id, "deal-9");
        assert_eq!(tasks[0].assignee_id, "u1");
        assert_eq!(tasks[0].priority, TaskPriority::Medium);
    }

    #[tokio::test]
    async fn test_http_status_decides_outcome() {
        let actions = Arc::new(RecordingActions::with_http_status(503));
        let payload = json!({"id": "42"});
        let step = StepKind::Http(HttpStep {
            url: "https://crm.example.com/leads/{{id}}".to_string(),
            method: HttpMethod::Post,
        });

        let result = runner(actions).run(&step, &ctx(&payload)).await;
        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.details, "POST https://crm.example.com/leads/42 -> 503");
    }

    #[tokio::test]
    async fn test_phone_messages() {
        let actions = Arc::new(RecordingActions::default());
        let payload = json!({"phone": "+15550100"});

        let sms = StepKind::Sms(PhoneMessageStep {
            phone_number: "{{phone}}".to_string(),
            message: "Hi".to_string(),
        });
        let result = runner(actions.clone()).run(&sms, &ctx(&payload)).await;
        assert_eq!(result.status, StepStatus::Success);
        assert!(result.details.starts_with("SMS to +15550100"));

        let whatsapp = StepKind::WhatsApp(PhoneMessageStep::default());
        let result = runner(actions.clone()).run(&whatsapp, &ctx(&payload)).await;
        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.details, "Missing Phone Number");
        assert_eq!(actions.calls(), vec!["sms:+15550100".to_string()]);
    }
}
