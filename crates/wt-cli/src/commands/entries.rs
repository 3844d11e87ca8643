//! Time entry commands.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Subcommand;
use wt_core::{NewTimeEntry, ProjectId, TaskId, TimeEntryId, User, parse_date};
use wt_db::{Database, EntryFilter, TimeEntryRow};

use super::util::{format_instant, format_minutes, parse_datetime, truncate};

#[derive(Debug, Subcommand)]
pub enum EntriesAction {
    /// Record time manually.
    Add {
        task_id: String,
        /// When the work started (RFC 3339, "YYYY-MM-DD HH:MM" UTC, or "2 hours ago").
        #[arg(long)]
        start: String,
        /// When the work ended. Omit to leave the entry running.
        #[arg(long)]
        end: Option<String>,
        /// Duration in minutes; must agree with --start/--end when both are given.
        #[arg(long)]
        minutes: Option<u32>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List your entries, most recent first.
    List {
        #[arg(long)]
        task: Option<String>,
        #[arg(long)]
        project: Option<String>,
        /// First day to include (YYYY-MM-DD).
        #[arg(long)]
        from: Option<String>,
        /// Last day to include (YYYY-MM-DD).
        #[arg(long)]
        to: Option<String>,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Stop a running entry.
    Stop { entry_id: String },
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    user: &User,
    action: &EntriesAction,
) -> Result<()> {
    match action {
        EntriesAction::Add {
            task_id,
            start,
            end,
            minutes,
            description,
        } => {
            let now = db.now();
            let mut input = NewTimeEntry::new(
                TaskId::new(task_id.as_str())?,
                parse_datetime(start, now)?,
            )
            .description(description.as_str());
            if let Some(end) = end {
                input = input.ended_at(parse_datetime(end, now)?);
            }
            if let Some(minutes) = minutes {
                input = input.duration_minutes(*minutes);
            }
            let entry = db
                .create_time_entry(&user.id, input)
                .context("failed to record time entry")?;
            if entry.is_running() {
                writeln!(writer, "Started entry {}", entry.id)?;
            } else {
                writeln!(
                    writer,
                    "Recorded entry {}: {}",
                    entry.id,
                    format_minutes(u64::from(entry.duration_minutes))
                )?;
            }
        }
        EntriesAction::List {
            task,
            project,
            from,
            to,
            json,
        } => {
            let filter = EntryFilter {
                task_id: task.as_deref().map(TaskId::new).transpose()?,
                project_id: project.as_deref().map(ProjectId::new).transpose()?,
                start_date: from
                    .as_deref()
                    .map(|value| parse_date("from", value))
                    .transpose()?,
                end_date: to
                    .as_deref()
                    .map(|value| parse_date("to", value))
                    .transpose()?,
            };
            let rows = db
                .list_time_entries(&user.id, &filter)
                .context("failed to list time entries")?;
            if *json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&rows)?)?;
            } else {
                write_entries(writer, &rows)?;
            }
        }
        EntriesAction::Stop { entry_id } => {
            let id = TimeEntryId::new(entry_id.as_str())?;
            let entry = db
                .stop_time_entry(&user.id, &id)
                .with_context(|| format!("failed to stop entry {entry_id}"))?;
            writeln!(
                writer,
                "Entry {} stopped: {}",
                entry.id,
                format_minutes(u64::from(entry.duration_minutes))
            )?;
        }
    }
    Ok(())
}

fn write_entries<W: Write>(writer: &mut W, rows: &[TimeEntryRow]) -> Result<()> {
    if rows.is_empty() {
        writeln!(writer, "No time entries.")?;
        return Ok(());
    }
    writeln!(
        writer,
        "{:<16}  {:>8}  {:<32}  Entry",
        "Started", "Duration", "Project / Task"
    )?;
    writeln!(
        writer,
        "────────────────  ────────  ────────────────────────────────  ─────"
    )?;
    for row in rows {
        let duration = if row.is_running {
            "running".to_string()
        } else {
            format_minutes(u64::from(row.entry.duration_minutes))
        };
        let location = truncate(&format!("{} / {}", row.project_name, row.task_title), 32);
        writeln!(
            writer,
            "{:<16}  {:>8}  {:<32}  {}",
            format_instant(row.entry.started_at),
            duration,
            location,
            row.entry.id
        )?;
    }
    Ok(())
}
