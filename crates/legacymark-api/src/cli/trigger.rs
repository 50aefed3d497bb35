//! `lmark trigger`: dispatch an event the way the HTTP endpoint does, but wait
//! for every run to settle before printing the result.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use legacymark_core::workflow::dispatcher::STATUS_ERROR;

use crate::cli::{parse_json_arg, parse_tenant, print_empty};
use crate::state::AppState;

pub async fn trigger(
    state: &AppState,
    trigger_type: &str,
    data: &str,
    company: Option<&str>,
    json: bool,
) -> Result<()> {
    let payload = parse_json_arg(data, "data")?;
    let tenant = company.map(parse_tenant).transpose()?;

    let result = state
        .dispatcher
        .trigger_and_wait(tenant.as_ref(), trigger_type, payload)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.details.is_empty() {
        print_empty(&format!(
            "No active workflows match trigger {}",
            style(trigger_type.trim().to_uppercase()).bold()
        ));
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Workflow").fg(Color::White),
        Cell::new("Execution").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Error").fg(Color::White),
    ]);

    for detail in &result.details {
        let status = Cell::new(&detail.status);
        let status = match detail.status.as_str() {
            "SUCCESS" => status.fg(Color::Green),
            "FAILED" => status.fg(Color::Red),
            s if s == STATUS_ERROR => status.fg(Color::Red),
            _ => status.fg(Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(detail.workflow_id).fg(Color::Cyan),
            Cell::new(
                detail
                    .execution_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            )
            .fg(Color::DarkGrey),
            status,
            Cell::new(detail.error.as_deref().unwrap_or("")),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} workflow{} executed",
        style(result.executed).bold(),
        if result.executed == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}
