//! Workflow domain types for LegacyMark.
//!
//! A `Workflow` binds a trigger type to an ordered list of typed steps. Steps
//! travel over the wire as `{type, config}` objects and are parsed into the
//! closed `StepKind` sum type, so an unknown type or malformed config is
//! rejected when the workflow is saved rather than when it runs. This module
//! also contains execution tracking types (`WorkflowExecution`,
//! `ExecutionLogEntry`).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::company::CompanyId;

// ---------------------------------------------------------------------------
// Trigger types
// ---------------------------------------------------------------------------

pub const TRIGGER_FORM_SUBMISSION: &str = "FORM_SUBMISSION";
pub const TRIGGER_DEAL_STAGE_CHANGED: &str = "DEAL_STAGE_CHANGED";
pub const TRIGGER_TEST: &str = "TEST_TRIGGER";

/// Recorded on executions started through `POST /api/webhooks/{id}`.
pub const TRIGGER_WEBHOOK: &str = "WEBHOOK";

/// Recorded on executions started by hand from the CLI.
pub const TRIGGER_MANUAL: &str = "MANUAL";

/// Canonical form of a trigger type: trimmed and upper-cased.
pub fn normalize_trigger_type(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A named, ordered sequence of automation steps tied to a trigger type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// UUIDv7 assigned on creation.
    pub id: Uuid,
    /// Owning company (tenant partition key).
    pub company_id: CompanyId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Event type that starts this workflow (e.g. `FORM_SUBMISSION`).
    pub trigger_type: String,
    /// Free-form trigger settings. `targetStage` and `webhookSecret` are
    /// interpreted by the engine; other keys are kept as-is.
    #[serde(default = "empty_object")]
    pub trigger_config: Value,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Deal stage this workflow is restricted to, if any.
    pub fn target_stage(&self) -> Option<&str> {
        self.trigger_config
            .get("targetStage")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Shared secret for HMAC verification of webhook deliveries.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.trigger_config
            .get("webhookSecret")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Whether a trigger payload passes this workflow's trigger filters.
    ///
    /// Currently the only filter is `targetStage`, compared against the
    /// payload's `stage` field.
    pub fn accepts_payload(&self, payload: &Value) -> bool {
        match self.target_stage() {
            Some(target) => payload.get("stage").and_then(Value::as_str) == Some(target),
            None => true,
        }
    }
}

pub fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Create/update request for a workflow, in wire form.
///
/// Steps stay untyped here; the workflow service parses each one into a
/// `StepDefinition` and reports the index of the first malformed step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowInput {
    pub name: String,
    pub description: Option<String>,
    pub trigger_type: String,
    pub trigger_config: Option<Value>,
    pub steps: Vec<Value>,
    pub is_active: Option<bool>,
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// A single typed step with its failure policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStep", into = "RawStep")]
pub struct StepDefinition {
    pub kind: StepKind,
    /// Keep running the remaining steps when this one fails. The run still
    /// ends `FAILED`.
    pub continue_on_error: bool,
}

impl StepDefinition {
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            continue_on_error: false,
        }
    }

    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    /// Parse a step from its wire form, returning a human-readable error.
    pub fn parse(value: Value) -> Result<Self, String> {
        serde_json::from_value(value).map_err(|e| e.to_string())
    }
}

/// Wire form of a step: `{type, config, continueOnError}`.
///
/// `delay` is also accepted at the top level for WAIT steps saved by older
/// editors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStep {
    #[serde(rename = "type")]
    step_type: String,
    #[serde(default)]
    config: Value,
    #[serde(default, skip_serializing)]
    delay: Option<u64>,
    #[serde(default, skip_serializing_if = "is_false")]
    continue_on_error: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl TryFrom<RawStep> for StepDefinition {
    type Error = String;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let step_type = normalize_trigger_type(&raw.step_type);
        if step_type.is_empty() {
            return Err("step type is required".to_string());
        }

        let mut config = match raw.config {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => return Err(format!("{step_type} config must be an object, got {other}")),
        };
        if let Some(delay) = raw.delay {
            config.entry("delay").or_insert(Value::from(delay));
        }

        let tagged = serde_json::json!({ "type": step_type, "config": config });
        let kind: StepKind = serde_json::from_value(tagged)
            .map_err(|e| format!("invalid {step_type} step: {e}"))?;

        Ok(Self {
            kind,
            continue_on_error: raw.continue_on_error,
        })
    }
}

impl From<StepDefinition> for RawStep {
    fn from(step: StepDefinition) -> Self {
        Self {
            step_type: step.kind.step_type().to_string(),
            config: step.kind.config_value(),
            delay: None,
            continue_on_error: step.continue_on_error,
        }
    }
}

/// The closed set of step kinds, each with its own typed configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    Log(LogStep),
    Email(EmailStep),
    Wait(WaitStep),
    Condition(ConditionStep),
    Slack(SlackStep),
    CreateTask(CreateTaskStep),
    Http(HttpStep),
    Sms(PhoneMessageStep),
    #[serde(rename = "WHATSAPP")]
    WhatsApp(PhoneMessageStep),
}

impl StepKind {
    /// The wire `type` tag.
    pub fn step_type(&self) -> &'static str {
        match self {
            StepKind::Log(_) => "LOG",
            StepKind::Email(_) => "EMAIL",
            StepKind::Wait(_) => "WAIT",
            StepKind::Condition(_) => "CONDITION",
            StepKind::Slack(_) => "SLACK",
            StepKind::CreateTask(_) => "CREATE_TASK",
            StepKind::Http(_) => "HTTP",
            StepKind::Sms(_) => "SMS",
            StepKind::WhatsApp(_) => "WHATSAPP",
        }
    }

    /// The step's configuration as a JSON object.
    pub fn config_value(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut tagged)) => tagged.remove("config").unwrap_or_else(empty_object),
            _ => empty_object(),
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.step_type())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStep {
    #[serde(default)]
    pub message: String,
}

/// EMAIL: subject and body are `{{key}}` templates rendered against the
/// trigger payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Explicit recipient template. When absent the payload's `email` or
    /// `contactEmail` is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl EmailStep {
    pub const DEFAULT_SUBJECT: &'static str = "Update";
    pub const DEFAULT_BODY: &'static str = "Notification";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitStep {
    /// Delay in seconds.
    #[serde(default)]
    pub delay: u64,
}

impl WaitStep {
    /// Longest accepted delay: one year.
    pub const MAX_DELAY_SECS: u64 = 365 * 24 * 60 * 60;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionStep {
    /// Payload field to inspect.
    pub variable: String,
    pub operator: ConditionOperator,
    /// Compared against the payload field's string form.
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Contains,
    Equals,
    StartsWith,
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionOperator::Contains => write!(f, "contains"),
            ConditionOperator::Equals => write!(f, "equals"),
            ConditionOperator::StartsWith => write!(f, "starts_with"),
        }
    }
}

/// SLACK: posts to an incoming-webhook URL. Discord webhook URLs work too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_description: Option<String>,
    #[serde(default)]
    pub priority: crate::task::TaskPriority,
}

impl CreateTaskStep {
    pub const DEFAULT_TITLE: &'static str = "New Task";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpStep {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// SMS and WHATSAPP share the same shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneMessageStep {
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub message: String,
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

/// Lifecycle of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Created and running (or about to run) steps.
    Pending,
    /// Parked on a long WAIT step until `resume_at`.
    Waiting,
    Success,
    Failed,
    /// A CONDITION step evaluated false and stopped the run.
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Success | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "PENDING"),
            ExecutionStatus::Waiting => write!(f, "WAITING"),
            ExecutionStatus::Success => write!(f, "SUCCESS"),
            ExecutionStatus::Failed => write!(f, "FAILED"),
            ExecutionStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(ExecutionStatus::Pending),
            "WAITING" => Ok(ExecutionStatus::Waiting),
            "SUCCESS" => Ok(ExecutionStatus::Success),
            "FAILED" => Ok(ExecutionStatus::Failed),
            "CANCELLED" => Ok(ExecutionStatus::Cancelled),
            other => Err(format!("invalid execution status: '{other}'")),
        }
    }
}

/// Outcome of a single step as recorded in the execution log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
    /// CONDITION matched.
    True,
    /// CONDITION did not match; the run stops here.
    False,
    /// WAIT deferred; the run resumes later.
    Scheduled,
}

impl StepStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepStatus::Failed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Success => write!(f, "SUCCESS"),
            StepStatus::Failed => write!(f, "FAILED"),
            StepStatus::Skipped => write!(f, "SKIPPED"),
            StepStatus::True => write!(f, "TRUE"),
            StepStatus::False => write!(f, "FALSE"),
            StepStatus::Scheduled => write!(f, "SCHEDULED"),
        }
    }
}

/// One entry of an execution's log trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    pub step_index: usize,
    #[serde(rename = "type")]
    pub step_type: String,
    pub status: StepStatus,
    #[serde(default)]
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionLogEntry {
    pub fn new(step_index: usize, step_type: &str, status: StepStatus, details: String) -> Self {
        Self {
            step_index,
            step_type: step_type.to_string(),
            status,
            details,
            timestamp: Utc::now(),
        }
    }
}

/// One recorded run of a workflow against a trigger payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    /// Denormalized for listings.
    pub workflow_name: String,
    pub company_id: CompanyId,
    pub status: ExecutionStatus,
    pub trigger_type: String,
    pub trigger_payload: Value,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub logs: Vec<ExecutionLogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Step to continue from when a WAITING execution resumes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    /// A fresh PENDING execution of `workflow`.
    pub fn pending(workflow: &Workflow, trigger_type: &str, payload: Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            workflow_id: workflow.id,
            workflow_name: workflow.name.clone(),
            company_id: workflow.company_id,
            status: ExecutionStatus::Pending,
            trigger_type: trigger_type.to_string(),
            trigger_payload: payload,
            started_at: Utc::now(),
            completed_at: None,
            logs: Vec::new(),
            error: None,
            next_step_index: None,
            resume_at: None,
        }
    }
}
