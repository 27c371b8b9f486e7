//! Read-only commands over stored checkpoints and configuration.

use anyhow::{Result, anyhow};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use sqlflow_types::checkpoint::Checkpoint;

use super::render::{pending_list, print_run, status_cell};
use crate::state::AppState;

async fn latest(state: &AppState, thread_id: &str) -> Result<Checkpoint> {
    state
        .checkpoints
        .load_latest(thread_id)
        .await?
        .ok_or_else(|| anyhow!("No run found for thread '{thread_id}'"))
}

// ---------------------------------------------------------------------------
// State / pending
// ---------------------------------------------------------------------------

pub async fn show_state(state: &AppState, thread_id: &str, json: bool) -> Result<()> {
    let checkpoint = latest(state, thread_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&checkpoint)?);
        return Ok(());
    }

    println!();
    println!(
        "  Thread {}  v{}  {}  {}",
        style(&checkpoint.thread_id).cyan(),
        checkpoint.version,
        checkpoint.status,
        style(checkpoint.created_at.format("%Y-%m-%d %H:%M:%S")).dim()
    );
    println!("  Next:     {}", pending_list(&checkpoint.pending));
    println!();
    print_run(&checkpoint.run);
    println!();
    Ok(())
}

pub async fn show_pending(state: &AppState, thread_id: &str, json: bool) -> Result<()> {
    let checkpoint = latest(state, thread_id).await?;

    if json {
        let out = serde_json::json!({
            "thread_id": checkpoint.thread_id,
            "status": checkpoint.status.to_string(),
            "pending": checkpoint.pending,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if checkpoint.pending.is_empty() {
        println!("  Nothing pending ({}).", checkpoint.status);
    } else {
        for node in &checkpoint.pending {
            println!("  {node}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

pub async fn show_history(state: &AppState, thread_id: &str, limit: u32, json: bool) -> Result<()> {
    let history = state.checkpoints.history(thread_id, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        println!();
        println!("  No checkpoints for thread '{thread_id}'.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Version").fg(Color::Cyan),
            Cell::new("Status"),
            Cell::new("Next"),
            Cell::new("Attempt"),
            Cell::new("Checks"),
            Cell::new("Created"),
        ]);

    for checkpoint in &history {
        let run = &checkpoint.run;
        let checks = format!(
            "schema {} / exec {}",
            if run.schema_validation_status { "ok" } else { "-" },
            if run.execution_validation_status { "ok" } else { "-" },
        );
        table.add_row(vec![
            Cell::new(checkpoint.version),
            status_cell(checkpoint.status),
            Cell::new(pending_list(&checkpoint.pending)),
            Cell::new(run.attempt_count),
            Cell::new(checks),
            Cell::new(checkpoint.created_at.format("%Y-%m-%d %H:%M:%S")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Suspended
// ---------------------------------------------------------------------------

pub async fn list_suspended(state: &AppState, json: bool) -> Result<()> {
    let suspended = state.checkpoints.list_suspended().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&suspended)?);
        return Ok(());
    }

    if suspended.is_empty() {
        println!();
        println!("  No runs are waiting for feedback.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Thread").fg(Color::Cyan),
            Cell::new("Version"),
            Cell::new("Waiting At"),
            Cell::new("Since"),
        ]);

    for summary in &suspended {
        table.add_row(vec![
            Cell::new(&summary.thread_id).fg(Color::Cyan),
            Cell::new(summary.version),
            Cell::new(pending_list(&summary.pending)),
            Cell::new(summary.created_at.format("%Y-%m-%d %H:%M:%S")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Effective configuration. Only secret variable names are shown, never values.
pub fn show_config(state: &AppState, json: bool) -> Result<()> {
    let config = &state.config;

    if json {
        let out = serde_json::json!({
            "data_dir": state.data_dir.display().to_string(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let engine = &config.engine;
    let rounds = match engine.feedback_round_limit() {
        Some(limit) => limit.to_string(),
        None => "unbounded".to_string(),
    };

    println!();
    println!("  Data dir:        {}", style(state.data_dir.display()).cyan());
    println!("  LLM:             {} @ {}", config.llm.model, config.llm.base_url);
    println!("  Embeddings:      {} @ {}", config.embedding.model, config.embedding.base_url);
    println!("  Qdrant:          {}", config.qdrant.url);
    println!("  Metabase:        {}", config.metabase.url);
    println!("  Max attempts:    {}", engine.max_attempts);
    println!("  Feedback rounds: {rounds}");
    println!();

    if config.databases.is_empty() {
        println!("  No databases configured.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Client").fg(Color::Cyan),
            Cell::new("Database"),
            Cell::new("Metabase Id"),
        ]);
    for mapping in &config.databases {
        table.add_row(vec![
            Cell::new(&mapping.client),
            Cell::new(&mapping.database),
            Cell::new(mapping.metabase_database_id),
        ]);
    }
    println!("{table}");
    println!();
    Ok(())
}
