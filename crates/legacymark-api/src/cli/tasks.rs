//! `lmark tasks`: CRM tasks created by `CREATE_TASK` steps.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};

use legacymark_core::repository::task::TaskRepository;
use legacymark_types::task::TaskPriority;

use crate::cli::{print_empty, CompanyArg};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum TasksCommand {
    /// List the company's most recent tasks.
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        company: CompanyArg,

        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

pub async fn handle(state: &AppState, action: TasksCommand, json: bool) -> Result<()> {
    match action {
        TasksCommand::List { company, limit } => list_tasks(state, &company, limit, json).await,
    }
}

async fn list_tasks(state: &AppState, company: &CompanyArg, limit: u32, json: bool) -> Result<()> {
    let tenant = company.tenant()?;
    let tasks = state.task_repo.list_tasks(&tenant.company_id, limit.max(1)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    if tasks.is_empty() {
        print_empty("No tasks yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Title").fg(Color::White),
        Cell::new("Priority").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Deal").fg(Color::White),
        Cell::new("Assignee").fg(Color::White),
        Cell::new("Created").fg(Color::White),
    ]);

    for task in &tasks {
        let priority = Cell::new(task.priority.to_string());
        let priority = match task.priority {
            TaskPriority::Urgent | TaskPriority::High => priority.fg(Color::Red),
            TaskPriority::Medium => priority.fg(Color::Yellow),
            TaskPriority::Low => priority.fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(&task.title).fg(Color::Cyan),
            priority,
            Cell::new(task.status.to_string()),
            Cell::new(&task.deal_id),
            Cell::new(&task.assignee_id),
            Cell::new(task.created_at.format("%Y-%m-%d %H:%M")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}
