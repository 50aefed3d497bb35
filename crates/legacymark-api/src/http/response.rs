//! Envelope response format for all API responses.
//!
//! ```json
//! {
//!   "success": true,
//!   "data": { ... },
//!   "meta": { "request_id": "...", "timestamp": "...", "response_time_ms": 5 }
//! }
//! ```
//!
//! Failures carry `"success": false` and an `error` object instead of `data`.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorDetail>,

    pub meta: ApiMeta,
}

/// Metadata included in every response.
#[derive(Debug, Serialize)]
pub struct ApiMeta {
    /// Unique request identifier for tracing.
    pub request_id: String,
    /// RFC 3339 timestamp of the response.
    pub timestamp: String,
    pub response_time_ms: u64,
}

impl ApiMeta {
    pub fn new(request_id: String, response_time_ms: u64) -> Self {
        Self {
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            response_time_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, request_id: String, response_time_ms: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: ApiMeta::new(request_id, response_time_ms),
        }
    }
}

tokio::task_local! {
    static CURRENT_REQUEST: RequestTimer;
}

/// Middleware stamping each request with an id and start time, shared by the
/// success envelope and any error envelope produced while serving it.
pub async fn stamp_request(request: Request, next: Next) -> Response {
    CURRENT_REQUEST.scope(RequestTimer::fresh(), next.run(request)).await
}

/// Request id and start time of the request being served.
#[derive(Debug, Clone)]
pub struct RequestTimer {
    request_id: String,
    start: Instant,
}

impl RequestTimer {
    /// The current request's stamp, or a new one outside `stamp_request`.
    pub fn start() -> Self {
        CURRENT_REQUEST
            .try_with(Clone::clone)
            .unwrap_or_else(|_| Self::fresh())
    }

    fn fresh() -> Self {
        Self {
            request_id: uuid::Uuid::now_v7().to_string(),
            start: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn meta(&self) -> ApiMeta {
        ApiMeta::new(self.request_id.clone(), self.elapsed_ms())
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wrap `data` in a success envelope stamped with the elapsed time.
    pub fn finish<T: Serialize>(self, data: T) -> ApiResponse<T> {
        let elapsed = self.elapsed_ms();
        ApiResponse::success(data, self.request_id, elapsed)
    }
}
