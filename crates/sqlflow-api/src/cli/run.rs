//! `start` and `resume`: drive the workflow engine.

use anyhow::Result;

use sqlflow_core::workflow::engine::{ResumeInput, RunHandle};
use sqlflow_types::run::{DatabaseSelection, UserInfo};

use super::render;
use crate::state::AppState;

pub struct StartArgs {
    pub question: String,
    pub client: String,
    pub databases: Vec<String>,
    pub email: Option<String>,
    pub thread: Option<String>,
}

/// Start a run for a question. Thread ids default to a time-ordered UUID.
pub async fn start(state: &AppState, args: StartArgs, json: bool, quiet: bool) -> Result<()> {
    let engine = state.engine()?;

    let thread_id = args
        .thread
        .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
    let user_info = UserInfo {
        user_name: args.client,
        email: args.email,
    };
    let databases = args
        .databases
        .into_iter()
        .map(|database_name| DatabaseSelection {
            database_name,
            description: None,
        })
        .collect();

    let handle = engine
        .start(&thread_id, &args.question, user_info, databases)
        .await?;
    report(&handle, json, quiet)
}

/// Resume a run, passing feedback when it is waiting for some.
pub async fn resume(
    state: &AppState,
    thread_id: &str,
    feedback: Option<String>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let engine = state.engine()?;
    let input = ResumeInput { feedback };
    let handle = engine.resume(thread_id, input).await?;
    report(&handle, json, quiet)
}

fn report(handle: &RunHandle, json: bool, quiet: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&render::handle_json(handle))?);
    } else if quiet {
        println!("{} {}", handle.thread_id, handle.status);
    } else {
        render::print_handle(handle);
    }
    Ok(())
}
