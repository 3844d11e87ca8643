//! Timer commands: start, pause, resume, stop and status.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use wt_core::{TaskId, Timer, TimerState, User};
use wt_db::Database;

use super::util::{format_instant, format_minutes};

#[derive(Debug, Subcommand)]
pub enum TimerAction {
    /// Start timing a task. A running timer is stopped and recorded first.
    Start { task_id: String },
    /// Pause the running timer.
    Pause,
    /// Resume the paused timer.
    Resume,
    /// Stop the timer and record a time entry.
    Stop,
    /// Show the current timer.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// The current timer with display context.
#[derive(Debug, Serialize)]
pub struct TimerStatus {
    #[serde(flatten)]
    pub timer: Timer,
    pub state: TimerState,
    pub elapsed_minutes: u32,
    pub task_title: String,
    pub project_name: String,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    user: &User,
    action: &TimerAction,
) -> Result<()> {
    match action {
        TimerAction::Start { task_id } => {
            let task_id = TaskId::new(task_id.as_str())?;
            let started = db
                .start_timer(&user.id, &task_id)
                .context("failed to start timer")?;
            if let Some(previous) = &started.replaced {
                let title = task_title(db, &previous.task_id)?;
                writeln!(
                    writer,
                    "Stopped previous timer: {} recorded on {title}",
                    format_minutes(u64::from(previous.duration_minutes))
                )?;
            }
            let title = task_title(db, &started.timer.task_id)?;
            writeln!(writer, "Started timer on {title}")?;
        }
        TimerAction::Pause => {
            let timer = db.pause_timer(&user.id).context("failed to pause timer")?;
            let elapsed = timer.elapsed_minutes(db.now());
            writeln!(
                writer,
                "Timer paused at {}",
                format_minutes(u64::from(elapsed))
            )?;
        }
        TimerAction::Resume => {
            let timer = db.resume_timer(&user.id).context("failed to resume timer")?;
            writeln!(
                writer,
                "Timer resumed ({} paused so far)",
                format_minutes(u64::from(timer.paused_duration))
            )?;
        }
        TimerAction::Stop => {
            let entry = db.stop_timer(&user.id).context("failed to stop timer")?;
            let title = task_title(db, &entry.task_id)?;
            writeln!(
                writer,
                "Recorded {} on {title}",
                format_minutes(u64::from(entry.duration_minutes))
            )?;
        }
        TimerAction::Status { json } => {
            let status = timer_status(db, user)?;
            if *json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&status)?)?;
            } else {
                write_status(writer, status.as_ref())?;
            }
        }
    }
    Ok(())
}

/// Looks up the user's timer without changing it.
pub fn timer_status(db: &Database, user: &User) -> Result<Option<TimerStatus>> {
    let Some(timer) = db.active_timer(&user.id)? else {
        return Ok(None);
    };
    let task = db.task(&timer.task_id)?;
    let project = db.project(&task.project_id)?;
    Ok(Some(TimerStatus {
        state: timer.state(),
        elapsed_minutes: timer.elapsed_minutes(db.now()),
        timer,
        task_title: task.title,
        project_name: project.name,
    }))
}

fn write_status<W: Write>(writer: &mut W, status: Option<&TimerStatus>) -> Result<()> {
    let Some(status) = status else {
        writeln!(writer, "No active timer.")?;
        writeln!(writer)?;
        writeln!(writer, "Hint: Run 'wt timer start <task>' to start one.")?;
        return Ok(());
    };
    match status.timer.paused_at {
        Some(paused_at) => writeln!(
            writer,
            "Timer: paused since {} UTC",
            format_instant(paused_at)
        )?,
        None => writeln!(writer, "Timer: running")?,
    }
    writeln!(
        writer,
        "Task:    {} ({})",
        status.task_title, status.project_name
    )?;
    writeln!(
        writer,
        "Started: {} UTC",
        format_instant(status.timer.started_at)
    )?;
    writeln!(
        writer,
        "Elapsed: {}",
        format_minutes(u64::from(status.elapsed_minutes))
    )?;
    if status.timer.paused_duration > 0 {
        writeln!(
            writer,
            "Paused:  {}",
            format_minutes(u64::from(status.timer.paused_duration))
        )?;
    }
    Ok(())
}

fn task_title(db: &Database, task_id: &TaskId) -> Result<String> {
    Ok(db.task(task_id)?.title)
}
