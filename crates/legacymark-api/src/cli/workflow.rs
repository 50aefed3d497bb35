//! Workflow CLI commands: create, list, show, enable/disable, delete, run,
//! executions and logs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use uuid::Uuid;

use legacymark_types::workflow::{StepStatus, Workflow, WorkflowInput, TRIGGER_MANUAL};

use crate::cli::{parse_json_arg, print_empty, status_cell, CompanyArg};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// Create a workflow from a JSON definition file.
    Create {
        #[command(flatten)]
        company: CompanyArg,

        /// JSON file with `name`, `triggerType`, `triggerConfig`, `steps`.
        file: PathBuf,
    },

    /// List the company's workflows.
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        company: CompanyArg,
    },

    /// Show a workflow definition.
    Show {
        #[command(flatten)]
        company: CompanyArg,
        id: Uuid,
    },

    /// Activate a workflow so triggers start it.
    Enable {
        #[command(flatten)]
        company: CompanyArg,
        id: Uuid,
    },

    /// Deactivate a workflow.
    Disable {
        #[command(flatten)]
        company: CompanyArg,
        id: Uuid,
    },

    /// Delete a workflow and its execution history.
    #[command(alias = "rm")]
    Delete {
        #[command(flatten)]
        company: CompanyArg,
        id: Uuid,

        /// Required; deletion cannot be undone.
        #[arg(long)]
        force: bool,
    },

    /// Run one workflow now, bypassing trigger matching.
    Run {
        #[command(flatten)]
        company: CompanyArg,
        id: Uuid,

        /// Trigger payload as a JSON object.
        #[arg(long, default_value = "{}")]
        payload: String,
    },

    /// List recent executions of a workflow.
    Executions {
        #[command(flatten)]
        company: CompanyArg,
        id: Uuid,

        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Show the step log of one execution.
    Logs {
        #[command(flatten)]
        company: CompanyArg,
        execution_id: Uuid,
    },
}

pub async fn handle(state: &AppState, action: WorkflowCommand, json: bool) -> Result<()> {
    match action {
        WorkflowCommand::Create { company, file } => create_workflow(state, &company, &file, json).await,
        WorkflowCommand::List { company } => list_workflows(state, &company, json).await,
        WorkflowCommand::Show { company, id } => show_workflow(state, &company, id, json).await,
        WorkflowCommand::Enable { company, id } => set_active(state, &company, id, true, json).await,
        WorkflowCommand::Disable { company, id } => set_active(state, &company, id, false, json).await,
        WorkflowCommand::Delete { company, id, force } => {
            delete_workflow(state, &company, id, force, json).await
        }
        WorkflowCommand::Run { company, id, payload } => {
            run_workflow(state, &company, id, &payload, json).await
        }
        WorkflowCommand::Executions { company, id, limit } => {
            list_executions(state, &company, id, limit, json).await
        }
        WorkflowCommand::Logs { company, execution_id } => {
            show_logs(state, &company, execution_id, json).await
        }
    }
}

async fn create_workflow(state: &AppState, company: &CompanyArg, file: &Path, json: bool) -> Result<()> {
    let tenant = company.tenant()?;
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let input: WorkflowInput = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid workflow definition", file.display()))?;

    let workflow = state.workflow_service.create(&tenant, input).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflow)?);
        return Ok(());
    }

    println!();
    println!("  {} Workflow created", style("✓").green().bold());
    println!();
    print_summary(&workflow);
    if !workflow.is_active {
        println!(
            "  Activate it with: {}",
            style(format!("lmark workflow enable --company {} {}", tenant.company_id, workflow.id)).yellow()
        );
        println!();
    }
    Ok(())
}

async fn list_workflows(state: &AppState, company: &CompanyArg, json: bool) -> Result<()> {
    let tenant = company.tenant()?;
    let workflows = state.workflow_service.list(&tenant).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflows)?);
        return Ok(());
    }

    if workflows.is_empty() {
        print_empty(&format!(
            "No workflows found. Create one with: {}",
            style("lmark workflow create --company <id> <file.json>").yellow()
        ));
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Trigger").fg(Color::White),
        Cell::new("Steps").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("ID").fg(Color::White),
    ]);

    for workflow in &workflows {
        table.add_row(vec![
            Cell::new(&workflow.name).fg(Color::Cyan),
            Cell::new(&workflow.trigger_type),
            Cell::new(workflow.steps.len()),
            active_cell(workflow.is_active),
            Cell::new(workflow.id).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} workflow{}",
        style(workflows.len()).bold(),
        if workflows.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

async fn show_workflow(state: &AppState, company: &CompanyArg, id: Uuid, json: bool) -> Result<()> {
    let tenant = company.tenant()?;
    let workflow = state.workflow_service.get(&tenant, id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflow)?);
        return Ok(());
    }

    println!();
    print_summary(&workflow);

    println!("  {}", style("── Steps ──").dim());
    for (index, step) in workflow.steps.iter().enumerate() {
        let flag = if step.continue_on_error {
            style(" (continue on error)").dim().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:>2}. {}{} {}",
            index,
            style(step.kind.step_type()).bold(),
            flag,
            style(step.kind.config_value()).dim()
        );
    }
    println!();
    Ok(())
}

async fn set_active(state: &AppState, company: &CompanyArg, id: Uuid, active: bool, json: bool) -> Result<()> {
    let tenant = company.tenant()?;
    let workflow = state.workflow_service.set_active(&tenant, id, active).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflow)?);
        return Ok(());
    }

    let verb = if active { "enabled" } else { "disabled" };
    println!();
    println!(
        "  {} Workflow '{}' {}",
        style("✓").green().bold(),
        style(&workflow.name).cyan(),
        verb
    );
    println!();
    Ok(())
}

async fn delete_workflow(
    state: &AppState,
    company: &CompanyArg,
    id: Uuid,
    force: bool,
    json: bool,
) -> Result<()> {
    let tenant = company.tenant()?;
    let workflow = state.workflow_service.get(&tenant, id).await?;

    if !force {
        anyhow::bail!(
            "refusing to delete workflow '{}' and its execution history without --force",
            workflow.name
        );
    }

    state.workflow_service.delete(&tenant, id).await?;

    if json {
        println!("{}", serde_json::json!({ "id": id, "deleted": true }));
        return Ok(());
    }

    println!();
    println!(
        "  {} Workflow '{}' deleted",
        style("✓").green().bold(),
        style(&workflow.name).cyan()
    );
    println!();
    Ok(())
}

async fn run_workflow(
    state: &AppState,
    company: &CompanyArg,
    id: Uuid,
    payload: &str,
    json: bool,
) -> Result<()> {
    let tenant = company.tenant()?;
    // Ownership check; the executor itself is tenant-agnostic
    state.workflow_service.get(&tenant, id).await?;
    let payload = parse_json_arg(payload, "payload")?;

    let outcome = state
        .dispatcher
        .execute_direct(id, TRIGGER_MANUAL, payload)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Execution {} finished as {}",
        style("▶").cyan().bold(),
        style(outcome.execution_id).dim(),
        style(outcome.status).bold()
    );
    println!("  {}  {}", style("Steps run:").bold(), outcome.steps_run);
    if let Some(error) = &outcome.error {
        println!("  {}      {}", style("Error:").bold(), style(error).red());
    }
    println!();
    Ok(())
}

async fn list_executions(
    state: &AppState,
    company: &CompanyArg,
    id: Uuid,
    limit: u32,
    json: bool,
) -> Result<()> {
    let tenant = company.tenant()?;
    let executions = state.workflow_service.list_executions(&tenant, id, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&executions)?);
        return Ok(());
    }

    if executions.is_empty() {
        print_empty("No executions yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Execution").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Trigger").fg(Color::White),
        Cell::new("Started").fg(Color::White),
        Cell::new("Steps").fg(Color::White),
        Cell::new("Error").fg(Color::White),
    ]);

    for execution in &executions {
        table.add_row(vec![
            Cell::new(execution.id).fg(Color::DarkGrey),
            status_cell(&execution.status),
            Cell::new(&execution.trigger_type),
            Cell::new(execution.started_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(execution.logs.len()),
            Cell::new(execution.error.as_deref().unwrap_or("")).fg(Color::Red),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

async fn show_logs(state: &AppState, company: &CompanyArg, execution_id: Uuid, json: bool) -> Result<()> {
    let tenant = company.tenant()?;
    let execution = state.workflow_service.get_execution(&tenant, execution_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&execution)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {} {}",
        style(&execution.workflow_name).cyan().bold(),
        style("·").dim(),
        style(execution.status).bold()
    );
    if let Some(resume_at) = execution.resume_at {
        println!("  {} {}", style("Resumes at:").bold(), resume_at.to_rfc3339());
    }
    if let Some(error) = &execution.error {
        println!("  {} {}", style("Error:").bold(), style(error).red());
    }
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Details").fg(Color::White),
        Cell::new("At").fg(Color::White),
    ]);

    for entry in &execution.logs {
        let status = Cell::new(entry.status.to_string());
        let status = match entry.status {
            StepStatus::Failed => status.fg(Color::Red),
            StepStatus::False | StepStatus::Skipped => status.fg(Color::Yellow),
            _ => status.fg(Color::Green),
        };
        table.add_row(vec![
            Cell::new(entry.step_index),
            Cell::new(&entry.step_type),
            status,
            Cell::new(&entry.details),
            Cell::new(entry.timestamp.format("%H:%M:%S%.3f")).fg(Color::DarkGrey),
        ]);
    }

    println!("{table}");
    println!();
    Ok(())
}

fn print_summary(workflow: &Workflow) {
    println!("  {}  {}", style("Name:").bold(), style(&workflow.name).cyan());
    if let Some(description) = &workflow.description {
        println!("  {}  {}", style("Desc:").bold(), style(description).dim());
    }
    println!("  {}  {}", style("Trigger:").bold(), workflow.trigger_type);
    if let Some(stage) = workflow.target_stage() {
        println!("  {}  {}", style("Stage:").bold(), stage);
    }
    println!(
        "  {}  {}",
        style("Status:").bold(),
        if workflow.is_active {
            style("● active").green()
        } else {
            style("○ inactive").yellow()
        }
    );
    println!("  {}  {}", style("ID:").bold(), style(workflow.id).dim());
    println!();
}

fn active_cell(active: bool) -> Cell {
    if active {
        Cell::new("● active").fg(Color::Green)
    } else {
        Cell::new("○ inactive").fg(Color::Yellow)
    }
}
