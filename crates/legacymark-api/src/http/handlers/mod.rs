//! Route handlers, grouped by resource.

pub mod execution;
pub mod trigger;
pub mod webhook;
pub mod workflow;

use legacymark_types::company::{CompanyId, TenantContext};
use uuid::Uuid;

use crate::http::error::AppError;

/// Tenant from a `{companyId}` path segment.
pub(crate) fn tenant_from_path(company_id: &str) -> Result<TenantContext, AppError> {
    company_id
        .parse::<CompanyId>()
        .map(TenantContext::new)
        .map_err(|_| AppError::Validation(format!("Invalid companyId '{company_id}'")))
}

/// Resource id from a path segment; anything unparseable cannot exist.
pub(crate) fn id_from_path(raw: &str, not_found: &str) -> Result<Uuid, AppError> {
    raw.parse().map_err(|_| AppError::NotFound(not_found.to_string()))
}
