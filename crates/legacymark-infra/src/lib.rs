//! Infrastructure layer for LegacyMark.
//!
//! Contains implementations of the ports defined in `legacymark-core`: SQLite
//! storage for workflows, executions and tasks, the live `ActionContext`
//! (email, chat webhooks, HTTP calls, SMS/WhatsApp), configuration loading and
//! request signature checks.

pub mod actions;
pub mod config;
pub mod signature;
pub mod sqlite;
