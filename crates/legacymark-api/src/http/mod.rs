//! HTTP/REST API layer for LegacyMark automation.
//!
//! Axum-based API: inbound webhooks, the generic trigger endpoint and
//! company-scoped workflow administration, with envelope responses and
//! `x-api-key` authentication on everything except webhooks and `/health`.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
