//! Subtask commands.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Subcommand;
use wt_core::{SubTask, SubTaskId, TaskId};
use wt_db::Database;

use super::util::truncate;

#[derive(Debug, Subcommand)]
pub enum SubtaskAction {
    /// Add a checklist item to a task.
    Add { task_id: String, title: String },
    /// Show a task's checklist in the order it was written.
    List {
        task_id: String,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Tick an item off.
    Done { subtask_id: String },
    /// Untick an item.
    Reopen { subtask_id: String },
    /// Delete an item.
    Remove { subtask_id: String },
}

pub fn run<W: Write>(writer: &mut W, db: &mut Database, action: &SubtaskAction) -> Result<()> {
    match action {
        SubtaskAction::Add { task_id, title } => {
            let subtask = db
                .create_subtask(&TaskId::new(task_id.as_str())?, title)
                .context("failed to create subtask")?;
            writeln!(writer, "Created subtask {} ({})", subtask.title, subtask.id)?;
        }
        SubtaskAction::List { task_id, json } => {
            let subtasks = db
                .list_subtasks(&TaskId::new(task_id.as_str())?)
                .with_context(|| format!("failed to list subtasks of {task_id}"))?;
            if *json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&subtasks)?)?;
            } else {
                write_subtasks(writer, &subtasks)?;
            }
        }
        SubtaskAction::Done { subtask_id } => {
            let subtask = set_done(db, subtask_id, true)?;
            writeln!(writer, "Done: {}", subtask.title)?;
        }
        SubtaskAction::Reopen { subtask_id } => {
            let subtask = set_done(db, subtask_id, false)?;
            writeln!(writer, "Reopened: {}", subtask.title)?;
        }
        SubtaskAction::Remove { subtask_id } => {
            db.delete_subtask(&SubTaskId::new(subtask_id.as_str())?)
                .with_context(|| format!("failed to remove subtask {subtask_id}"))?;
            writeln!(writer, "Removed subtask {subtask_id}")?;
        }
    }
    Ok(())
}

fn set_done(db: &mut Database, subtask_id: &str, done: bool) -> Result<SubTask> {
    db.set_subtask_done(&SubTaskId::new(subtask_id)?, done)
        .with_context(|| format!("failed to update subtask {subtask_id}"))
}

fn write_subtasks<W: Write>(writer: &mut W, subtasks: &[SubTask]) -> Result<()> {
    if subtasks.is_empty() {
        writeln!(writer, "No subtasks.")?;
        return Ok(());
    }
    for subtask in subtasks {
        let mark = if subtask.is_done { "x" } else { " " };
        writeln!(
            writer,
            "[{mark}] {:<40}  {}",
            truncate(&subtask.title, 40),
            subtask.id
        )?;
    }
    let done = subtasks.iter().filter(|subtask| subtask.is_done).count();
    writeln!(writer, "{done} of {} done", subtasks.len())?;
    Ok(())
}
