//! Shared domain types for LegacyMark.
//!
//! This crate contains the domain types used across the automation engine:
//! companies (tenants), workflows and their typed steps, executions with their
//! log trail, CRM tasks, configuration, and the associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod company;
pub mod config;
pub mod error;
pub mod task;
pub mod workflow;
