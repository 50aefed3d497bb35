//! Inbound webhook deliveries: `POST /api/webhooks/{workflowId}`.
//!
//! No API key is required; the workflow id in the URL is the address. When the workflow's trigger config carries a
//! `webhookSecret`, the raw body must be signed with it.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use legacymark_infra::signature::verify_webhook_signature;
use legacymark_types::workflow::{empty_object, ExecutionStatus, TRIGGER_WEBHOOK};

use crate::http::error::AppError;
use crate::http::handlers::id_from_path;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAccepted {
    pub message: &'static str,
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
}

/// POST /api/webhooks/{workflowId} - Run one workflow with the body as payload.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAccepted>>, AppError> {
    let timer = RequestTimer::start();
    let workflow_id = id_from_path(&workflow_id, "Workflow not found")?;

    let workflow = state.executor.load_runnable(workflow_id).await?;

    if let Some(secret) = workflow.webhook_secret() {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        verify_webhook_signature(secret, &body, signature).map_err(|e| {
            tracing::warn!(workflow_id = %workflow_id, error = %e, "webhook signature rejected");
            AppError::Unauthorized("Invalid webhook signature".to_string())
        })?;
    }

    let payload = parse_payload(&body)?;
    let outcome = state
        .dispatcher
        .execute_direct(workflow_id, TRIGGER_WEBHOOK, payload)
        .await?;

    tracing::info!(
        request_id = timer.request_id(),
        workflow_id = %workflow_id,
        execution_id = %outcome.execution_id,
        status = %outcome.status,
        "webhook processed"
    );

    Ok(Json(timer.finish(WebhookAccepted {
        message: "Workflow triggered",
        execution_id: outcome.execution_id,
        status: outcome.status,
    })))
}

/// Empty bodies become `{}`; anything else must be valid JSON.
fn parse_payload(body: &[u8]) -> Result<Value, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(empty_object());
    }
    serde_json::from_slice(body).map_err(|_| AppError::Validation("Invalid JSON body".to_string()))
}
