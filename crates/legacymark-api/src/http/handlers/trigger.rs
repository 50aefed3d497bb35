//! Generic trigger endpoint: `POST /api/automation/trigger`.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use legacymark_core::workflow::dispatcher::TriggerResult;
use legacymark_types::company::TenantContext;
use legacymark_types::workflow::empty_object;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::handlers::tenant_from_path;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TriggerRequest {
    #[serde(rename = "type")]
    trigger_type: Option<String>,
    data: Value,
    company_id: Option<String>,
}

impl TriggerRequest {
    /// Only the top-level `companyId` scopes the dispatch; `data` is passed
    /// through to the runs untouched.
    fn tenant(&self) -> Result<Option<TenantContext>, AppError> {
        self.company_id.as_deref().map(tenant_from_path).transpose()
    }
}

/// POST /api/automation/trigger - Start every active workflow matching `type`.
///
/// Runs are spawned in the background; the response lists what was started.
pub async fn trigger(
    State(state): State<AppState>,
    _auth: Authenticated,
    body: Bytes,
) -> Result<Json<ApiResponse<TriggerResult>>, AppError> {
    let timer = RequestTimer::start();

    let request: TriggerRequest = if body.is_empty() {
        TriggerRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|_| AppError::Validation("Invalid JSON body".to_string()))?
    };
    let tenant = request.tenant()?;

    let payload = match request.data {
        Value::Null => empty_object(),
        data => data,
    };

    let result = state
        .dispatcher
        .trigger(
            tenant.as_ref(),
            request.trigger_type.as_deref().unwrap_or_default(),
            payload,
        )
        .await?;

    Ok(Json(timer.finish(result)))
}
