//! Axum router configuration with middleware.
//!
//! Routes live under `/api/`. Middleware: request stamping, CORS, request tracing.

use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::http::response::stamp_request;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Inbound events
        .route("/webhooks/{workflow_id}", post(handlers::webhook::receive_webhook))
        .route("/automation/trigger", post(handlers::trigger::trigger))
        // Workflow administration
        .route(
            "/companies/{company_id}/workflows",
            get(handlers::workflow::list_workflows).post(handlers::workflow::create_workflow),
        )
        .route(
            "/companies/{company_id}/workflows/latest",
            get(handlers::workflow::latest_workflow),
        )
        .route(
            "/companies/{company_id}/workflows/{id}",
            get(handlers::workflow::get_workflow)
                .put(handlers::workflow::update_workflow)
                .delete(handlers::workflow::delete_workflow),
        )
        .route(
            "/companies/{company_id}/workflows/{id}/toggle",
            post(handlers::workflow::toggle_workflow),
        )
        .route(
            "/companies/{company_id}/workflows/{id}/executions",
            get(handlers::workflow::list_workflow_executions),
        )
        // Execution history
        .route(
            "/companies/{company_id}/executions",
            get(handlers::execution::recent_executions),
        )
        .route(
            "/companies/{company_id}/executions/{id}",
            get(handlers::execution::get_execution),
        );

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .layer(from_fn(stamp_request))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
