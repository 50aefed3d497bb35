//! Live `ActionContext` wiring workflow steps to real services.
//!
//! [`LiveActionContext`] implements the `ActionContext` trait from
//! legacymark-core:
//! - email through the Resend HTTP API (logged mock send without a key)
//! - Slack/Discord incoming webhooks
//! - generic HTTP calls for `HTTP` steps
//! - mock SMS and WhatsApp senders
//! - CRM tasks written through a `TaskRepository`

mod chat;
mod email;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use legacymark_core::repository::task::TaskRepository;
use legacymark_core::workflow::step_runner::{
    ActionContext, ActionError, ActionFuture, ChatMessage, DeliveryReceipt, EmailMessage,
    HttpCall, HttpCallResult, PhoneMessage, TaskRequest,
};
use legacymark_types::config::{EmailConfig, HttpClientConfig};
use legacymark_types::task::{Task, TaskStatus};
use legacymark_types::workflow::HttpMethod;
use secrecy::SecretString;
use uuid::Uuid;

const USER_AGENT: &str = concat!("legacymark-automation/", env!("CARGO_PKG_VERSION"));

/// Real action context backed by one shared `reqwest::Client`.
pub struct LiveActionContext<T: TaskRepository> {
    http_client: reqwest::Client,
    email: EmailConfig,
    resend_api_key: Option<SecretString>,
    tasks: Arc<T>,
}

impl<T: TaskRepository> LiveActionContext<T> {
    pub fn new(
        http: &HttpClientConfig,
        email: EmailConfig,
        resend_api_key: Option<SecretString>,
        tasks: Arc<T>,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http_client,
            email,
            resend_api_key,
            tasks,
        })
    }
}

fn mock_message_id(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::now_v7().simple())
}

fn transport(e: reqwest::Error) -> ActionError {
    ActionError::Transport(e.to_string())
}

impl<T: TaskRepository + 'static> ActionContext for LiveActionContext<T> {
    fn send_email(&self, message: EmailMessage) -> ActionFuture<'_, DeliveryReceipt> {
        Box::pin(async move {
            match &self.resend_api_key {
                Some(key) => email::send_via_resend(&self.http_client, &self.email, key, &message).await,
                None => {
                    tracing::info!(
                        to = %message.to,
                        subject = %message.subject,
                        "no email API key configured; logging mock send"
                    );
                    Ok(DeliveryReceipt {
                        id: mock_message_id("mock_"),
                    })
                }
            }
        })
    }

    fn post_chat_message(&self, message: ChatMessage) -> ActionFuture<'_, ()> {
        Box::pin(async move {
            let response = self
                .http_client
                .post(&message.webhook_url)
                .json(&chat::webhook_body(&message))
                .send()
                .await
                .map_err(transport)?;

            let status = response.status();
            if !status.is_success() {
                return Err(ActionError::Rejected(format!(
                    "chat webhook returned {}",
                    status.as_u16()
                )));
            }
            Ok(())
        })
    }

    fn http_request(&self, call: HttpCall) -> ActionFuture<'_, HttpCallResult> {
        Box::pin(async move {
            let request = match call.method {
                HttpMethod::Get => self.http_client.get(&call.url),
                HttpMethod::Post => self.http_client.post(&call.url).json(&call.body),
            };
            let response = request.send().await.map_err(transport)?;

            tracing::debug!(url = %call.url, method = %call.method, status = response.status().as_u16(), "http step call");
            Ok(HttpCallResult {
                status: response.status().as_u16(),
            })
        })
    }

    fn send_sms(&self, message: PhoneMessage) -> ActionFuture<'_, DeliveryReceipt> {
        Box::pin(async move {
            tracing::info!(to = %message.to, "mock SMS sent");
            Ok(DeliveryReceipt {
                id: mock_message_id("SM"),
            })
        })
    }

    fn send_whatsapp(&self, message: PhoneMessage) -> ActionFuture<'_, DeliveryReceipt> {
        Box::pin(async move {
            tracing::info!(to = %message.to, "mock WhatsApp message sent");
            Ok(DeliveryReceipt {
                id: mock_message_id("WAM"),
            })
        })
    }

    fn create_task(&self, request: TaskRequest) -> ActionFuture<'_, Task> {
        Box::pin(async move {
            let task = Task {
                id: Uuid::now_v7(),
                company_id: request.company_id,
                deal_id: request.deal_id,
                assignee_id: request.assignee_id,
                title: request.title,
                description: request.description,
                priority: request.priority,
                status: TaskStatus::Todo,
                execution_id: Some(request.execution_id),
                created_at: Utc::now(),
            };
            self.tasks
                .create_task(&task)
                .await
                .map_err(|e| ActionError::Storage(e.to_string()))?;

            tracing::info!(task_id = %task.id, deal_id = %task.deal_id, "task created");
            Ok(task)
        })
    }
}
