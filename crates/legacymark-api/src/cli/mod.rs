//! CLI command definitions for the `lmark` binary.
//!
//! Uses clap derive macros for argument parsing. Resource commands follow a
//! noun-verb pattern (e.g., `lmark workflow list`, `lmark tasks list`).

pub mod tasks;
pub mod trigger;
pub mod workflow;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use comfy_table::{Cell, Color};
use console::style;
use legacymark_types::company::{CompanyId, TenantContext};
use legacymark_types::workflow::ExecutionStatus;

/// Run and administer LegacyMark workflow automations.
#[derive(Parser)]
#[command(name = "lmark", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server and the delayed-resume poller.
    Serve {
        /// Port to listen on (defaults to `server.port` from config.toml).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to `server.host` from config.toml).
        #[arg(long)]
        host: Option<String>,
    },

    /// Manage workflows and inspect their executions.
    #[command(alias = "wf")]
    Workflow {
        #[command(subcommand)]
        action: workflow::WorkflowCommand,
    },

    /// Dispatch a trigger event and wait for every matching run.
    Trigger {
        /// Trigger type, e.g. FORM_SUBMISSION (case-insensitive).
        #[arg(value_name = "TYPE")]
        trigger_type: String,

        /// Trigger payload as a JSON object.
        #[arg(long, default_value = "{}")]
        data: String,

        /// Only consider workflows of this company.
        #[arg(long, env = COMPANY_ENV)]
        company: Option<String>,
    },

    /// Inspect CRM tasks created by workflows.
    Tasks {
        #[command(subcommand)]
        action: tasks::TasksCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

pub const COMPANY_ENV: &str = "LEGACYMARK_COMPANY_ID";

/// `--company` for commands that act on behalf of one tenant.
#[derive(Args, Debug, Clone)]
pub struct CompanyArg {
    /// Company id (UUID) that owns the resources.
    #[arg(long, env = COMPANY_ENV)]
    pub company: String,
}

impl CompanyArg {
    pub fn tenant(&self) -> anyhow::Result<TenantContext> {
        parse_tenant(&self.company)
    }
}

pub fn parse_tenant(raw: &str) -> anyhow::Result<TenantContext> {
    let company_id: CompanyId = raw
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid company id '{raw}': expected a UUID"))?;
    Ok(TenantContext::new(company_id))
}

pub fn parse_json_arg(raw: &str, what: &str) -> anyhow::Result<serde_json::Value> {
    serde_json::from_str(raw).map_err(|e| anyhow::anyhow!("invalid {what} JSON: {e}"))
}

pub(crate) fn status_cell(status: &ExecutionStatus) -> Cell {
    let cell = Cell::new(status.to_string());
    match status {
        ExecutionStatus::Success => cell.fg(Color::Green),
        ExecutionStatus::Failed => cell.fg(Color::Red),
        ExecutionStatus::Waiting | ExecutionStatus::Pending => cell.fg(Color::Yellow),
        ExecutionStatus::Cancelled => cell.fg(Color::DarkGrey),
    }
}

pub(crate) fn print_empty(message: &str) {
    println!();
    println!("  {} {}", style("i").blue().bold(), message);
    println!();
}
