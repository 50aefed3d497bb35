//! Workflow engine and repository trait definitions for LegacyMark.
//!
//! This crate defines the "ports" (repository traits and the `ActionContext`
//! collaborator trait) that the infrastructure layer implements, plus the
//! engine itself: step runner, executor, trigger dispatcher and resume poller.
//! It depends only on `legacymark-types` -- never on `legacymark-infra` or any
//! database/IO crate.

pub mod repository;
pub mod service;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
