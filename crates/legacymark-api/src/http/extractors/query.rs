//! Query parameter extractors for list endpoints.

use serde::Deserialize;

/// `?limit=` for execution listings. Services clamp the value.
#[derive(Debug, Deserialize, Default)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}
