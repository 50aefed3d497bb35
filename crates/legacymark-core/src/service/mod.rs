//! Service layer orchestrating repository traits for tenant-scoped operations.

pub mod workflow;
