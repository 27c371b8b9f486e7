//! Shared output helpers for run handles and checkpoints.

use comfy_table::{Cell, Color};
use console::style;
use serde_json::{Value, json};

use sqlflow_core::workflow::engine::RunHandle;
use sqlflow_types::checkpoint::RunStatus;
use sqlflow_types::node::NodeId;
use sqlflow_types::run::WorkflowRun;

pub fn status_cell(status: RunStatus) -> Cell {
    match status {
        RunStatus::Running => Cell::new("● running").fg(Color::Yellow),
        RunStatus::Suspended => Cell::new("◐ suspended").fg(Color::Cyan),
        RunStatus::Completed => Cell::new("✓ completed").fg(Color::Green),
    }
}

pub fn pending_list(pending: &[NodeId]) -> String {
    if pending.is_empty() {
        return "-".to_string();
    }
    pending
        .iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// JSON view of a run handle for `--json`.
pub fn handle_json(handle: &RunHandle) -> Value {
    json!({
        "thread_id": handle.thread_id,
        "status": handle.status.to_string(),
        "version": handle.version,
        "pending": handle.pending,
        "run": handle.run,
    })
}

/// Styled summary of where a run stands after `start` or `resume`.
pub fn print_handle(handle: &RunHandle) {
    let run = &handle.run;

    println!();
    match handle.status {
        RunStatus::Suspended => println!(
            "  {} Run '{}' is waiting for feedback (checkpoint v{})",
            style("◐").cyan().bold(),
            style(&handle.thread_id).cyan(),
            handle.version
        ),
        RunStatus::Completed => println!(
            "  {} Run '{}' completed (checkpoint v{})",
            style("✓").green().bold(),
            style(&handle.thread_id).cyan(),
            handle.version
        ),
        RunStatus::Running => println!(
            "  {} Run '{}' paused mid-flight at v{}, next: {}",
            style("●").yellow().bold(),
            style(&handle.thread_id).cyan(),
            handle.version,
            pending_list(&handle.pending)
        ),
    }
    println!();

    print_run(run);

    if handle.status == RunStatus::Suspended {
        println!();
        println!(
            "  Reply with: {}",
            style(format!(
                "sqlflow resume {} --feedback \"<chart type>\"",
                handle.thread_id
            ))
            .dim()
        );
    }
    println!();
}

/// Question, SQL, validation, and visualization details of a run.
pub fn print_run(run: &WorkflowRun) {
    if let Some(question) = run.question() {
        println!("  Question: {question}");
    }
    match &run.sql_query {
        Some(sql) => println!("  SQL:      {}", style(sql).white().bold()),
        None => println!("  SQL:      {}", style("(none)").dim()),
    }
    println!("  Attempt:  {}", run.attempt_count);

    let check = |ok: bool| {
        if ok {
            format!("{}", style("✓").green())
        } else {
            format!("{}", style("✗").red())
        }
    };
    println!("  {} schema check", check(run.schema_validation_status));
    println!("  {} execution check", check(run.execution_validation_status));
    for error in run.validation_errors() {
        println!("    {}", style(error).red());
    }
    if let Some(error) = &run.generation_error {
        println!("  {} {}", style("generation failed:").red(), error);
    }

    if let Some(artifact) = &run.visualization {
        let charts: Vec<&str> = artifact.chart_types.iter().map(|c| c.label()).collect();
        println!();
        println!("  Chart:    {}", style(charts.join(", ")).cyan());
        println!("  Columns:  {}", artifact.columns.join(", "));
        println!("  Rows:     {}", artifact.row_count);
        for warning in &artifact.validation_warnings {
            println!("  {} {}", style("warning:").yellow(), warning);
        }
    } else if let Some(candidate) = &run.visualization_candidate {
        println!();
        println!(
            "  Suggested: {}",
            style(candidate.recommended_visualization.join(", ")).cyan()
        );
        if !candidate.description.is_empty() {
            println!("             {}", style(&candidate.description).dim());
        }
    }

    for failure in &run.node_failures {
        println!(
            "  {} {} (attempt {}): {}",
            style("node failed:").red(),
            failure.node,
            failure.attempt,
            failure.error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlflow_types::run::UserInfo;

    #[test]
    fn pending_list_joins_node_names() {
        assert_eq!(pending_list(&[]), "-");
        assert_eq!(
            pending_list(&[NodeId::ValidateSchema, NodeId::ValidateExecution]),
            "validate_schema, validate_execution"
        );
    }

    #[test]
    fn handle_json_carries_status_and_pending() {
        let handle = RunHandle {
            thread_id: "t-1".into(),
            status: RunStatus::Suspended,
            version: 5,
            pending: vec![NodeId::HumanFeedback],
            run: WorkflowRun::new("t-1", "total sales", UserInfo::default(), vec![]),
        };
        let value = handle_json(&handle);
        assert_eq!(value["status"], "suspended");
        assert_eq!(value["version"], 5);
        assert_eq!(value["pending"][0], "human_feedback");
        assert_eq!(value["run"]["thread_id"], "t-1");
    }
}
