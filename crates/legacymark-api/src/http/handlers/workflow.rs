//! Workflow administration handlers, scoped to `/api/companies/{companyId}`.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use legacymark_types::workflow::{Workflow, WorkflowExecution, WorkflowInput};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::query::LimitQuery;
use crate::http::handlers::{id_from_path, tenant_from_path};
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// Page size for `GET /workflows/{id}/executions` without `?limit=`.
const DEFAULT_EXECUTION_PAGE: u32 = 20;

const WORKFLOW_NOT_FOUND: &str = "Workflow not found";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: Uuid,
    pub deleted: bool,
}

/// GET /workflows - All workflows of the company.
pub async fn list_workflows(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(company_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Workflow>>>, AppError> {
    let timer = RequestTimer::start();
    let tenant = tenant_from_path(&company_id)?;

    let workflows = state.workflow_service.list(&tenant).await?;
    Ok(Json(timer.finish(workflows)))
}

/// POST /workflows - Create a workflow (inactive unless `isActive` is set).
pub async fn create_workflow(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(company_id): Path<String>,
    Json(body): Json<WorkflowInput>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let timer = RequestTimer::start();
    let tenant = tenant_from_path(&company_id)?;

    let workflow = state.workflow_service.create(&tenant, body).await?;
    Ok(Json(timer.finish(workflow)))
}

/// GET /workflows/latest - Most recently created workflow, or `null`.
pub async fn latest_workflow(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(company_id): Path<String>,
) -> Result<Json<ApiResponse<Option<Workflow>>>, AppError> {
    let timer = RequestTimer::start();
    let tenant = tenant_from_path(&company_id)?;

    let workflow = state.workflow_service.latest(&tenant).await?;
    Ok(Json(timer.finish(workflow)))
}

pub async fn get_workflow(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path((company_id, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let timer = RequestTimer::start();
    let tenant = tenant_from_path(&company_id)?;
    let id = id_from_path(&id, WORKFLOW_NOT_FOUND)?;

    let workflow = state.workflow_service.get(&tenant, id).await?;
    Ok(Json(timer.finish(workflow)))
}

/// PUT /workflows/{id} - Replace name, trigger and steps.
pub async fn update_workflow(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path((company_id, id)): Path<(String, String)>,
    Json(body): Json<WorkflowInput>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let timer = RequestTimer::start();
    let tenant = tenant_from_path(&company_id)?;
    let id = id_from_path(&id, WORKFLOW_NOT_FOUND)?;

    let workflow = state.workflow_service.update(&tenant, id, body).await?;
    Ok(Json(timer.finish(workflow)))
}

/// DELETE /workflows/{id} - Delete a workflow and its execution history.
pub async fn delete_workflow(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path((company_id, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Deleted>>, AppError> {
    let timer = RequestTimer::start();
    let tenant = tenant_from_path(&company_id)?;
    let id = id_from_path(&id, WORKFLOW_NOT_FOUND)?;

    state.workflow_service.delete(&tenant, id).await?;
    Ok(Json(timer.finish(Deleted { id, deleted: true })))
}

/// POST /workflows/{id}/toggle - Activate or deactivate.
pub async fn toggle_workflow(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path((company_id, id)): Path<(String, String)>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<ApiResponse<Workflow>>, AppError> {
    let timer = RequestTimer::start();
    let tenant = tenant_from_path(&company_id)?;
    let id = id_from_path(&id, WORKFLOW_NOT_FOUND)?;

    let workflow = state
        .workflow_service
        .set_active(&tenant, id, body.is_active)
        .await?;
    Ok(Json(timer.finish(workflow)))
}

/// GET /workflows/{id}/executions - Execution history, newest first.
pub async fn list_workflow_executions(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path((company_id, id)): Path<(String, String)>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<WorkflowExecution>>>, AppError> {
    let timer = RequestTimer::start();
    let tenant = tenant_from_path(&company_id)?;
    let id = id_from_path(&id, WORKFLOW_NOT_FOUND)?;

    let executions = state
        .workflow_service
        .list_executions(&tenant, id, query.limit.unwrap_or(DEFAULT_EXECUTION_PAGE))
        .await?;
    Ok(Json(timer.finish(executions)))
}
