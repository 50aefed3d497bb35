//! Execution history handlers, scoped to `/api/companies/{companyId}`.

use axum::extract::{Path, Query, State};
use axum::Json;

use legacymark_types::workflow::WorkflowExecution;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::query::LimitQuery;
use crate::http::handlers::{id_from_path, tenant_from_path};
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// GET /executions - The company's latest executions across all workflows.
pub async fn recent_executions(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(company_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<WorkflowExecution>>>, AppError> {
    let timer = RequestTimer::start();
    let tenant = tenant_from_path(&company_id)?;

    let executions = state
        .workflow_service
        .recent_executions(&tenant, query.limit)
        .await?;
    Ok(Json(timer.finish(executions)))
}

/// GET /executions/{id} - One execution with its step log.
pub async fn get_execution(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path((company_id, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<WorkflowExecution>>, AppError> {
    let timer = RequestTimer::start();
    let tenant = tenant_from_path(&company_id)?;
    let id = id_from_path(&id, "Execution not found")?;

    let execution = state.workflow_service.get_execution(&tenant, id).await?;
    Ok(Json(timer.finish(execution)))
}
