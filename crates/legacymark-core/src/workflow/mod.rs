//! Workflow engine: template rendering, condition evaluation, the step runner,
//! the sequential executor, trigger dispatch and the delayed resume poller.

pub mod condition;
pub mod dispatcher;
pub mod executor;
pub mod scheduler;
pub mod step_runner;
pub mod template;
