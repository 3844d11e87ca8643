//! Calendar event commands.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Subcommand;
use wt_core::{EventId, EventType, ProjectId, TaskId, User, parse_date};
use wt_db::{Database, EventFilter, EventRow, NewEvent};

use super::util::{format_instant, format_minutes, parse_datetime, truncate};

#[derive(Debug, Subcommand)]
pub enum EventAction {
    /// Put an event on your calendar.
    Add {
        title: String,
        /// When it starts (RFC 3339, "YYYY-MM-DD HH:MM" UTC, or "2 hours ago").
        #[arg(long)]
        start: String,
        /// When it ends; may equal --start.
        #[arg(long)]
        end: String,
        #[arg(long = "type", default_value_t)]
        event_type: EventType,
        #[arg(long)]
        all_day: bool,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        task: Option<String>,
        /// Display colour as #RRGGBB.
        #[arg(long)]
        color: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List your events, earliest first.
    List {
        /// Only events starting on or after this day (YYYY-MM-DD).
        #[arg(long)]
        from: Option<String>,
        /// Only events ending on or before this day (YYYY-MM-DD).
        #[arg(long)]
        to: Option<String>,
        #[arg(long = "type")]
        event_type: Option<EventType>,
        #[arg(long)]
        project: Option<String>,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete one of your events.
    Remove { event_id: String },
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    user: &User,
    action: &EventAction,
) -> Result<()> {
    match action {
        EventAction::Add {
            title,
            start,
            end,
            event_type,
            all_day,
            location,
            project,
            task,
            color,
            description,
        } => {
            let now = db.now();
            let input = NewEvent {
                title: title.clone(),
                description: description.clone(),
                event_type: *event_type,
                starts_at: parse_datetime(start, now)?,
                ends_at: parse_datetime(end, now)?,
                all_day: *all_day,
                location: location.clone(),
                project_id: project.as_deref().map(ProjectId::new).transpose()?,
                task_id: task.as_deref().map(TaskId::new).transpose()?,
                color: color.clone(),
            };
            let event = db
                .create_event(&user.id, input)
                .context("failed to create event")?;
            writeln!(writer, "Created event {} ({})", event.title, event.id)?;
        }
        EventAction::List {
            from,
            to,
            event_type,
            project,
            json,
        } => {
            let filter = EventFilter {
                start_date: from
                    .as_deref()
                    .map(|value| parse_date("from", value))
                    .transpose()?,
                end_date: to
                    .as_deref()
                    .map(|value| parse_date("to", value))
                    .transpose()?,
                event_type: *event_type,
                project_id: project.as_deref().map(ProjectId::new).transpose()?,
            };
            let rows = db
                .list_events(&user.id, &filter)
                .context("failed to list events")?;
            if *json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&rows)?)?;
            } else {
                write_events(writer, &rows)?;
            }
        }
        EventAction::Remove { event_id } => {
            db.delete_event(&user.id, &EventId::new(event_id.as_str())?)
                .with_context(|| format!("failed to remove event {event_id}"))?;
            writeln!(writer, "Removed event {event_id}")?;
        }
    }
    Ok(())
}

fn write_events<W: Write>(writer: &mut W, rows: &[EventRow]) -> Result<()> {
    if rows.is_empty() {
        writeln!(writer, "No events.")?;
        return Ok(());
    }
    writeln!(
        writer,
        "{:<16}  {:>8}  {:<8}  {:<32}  Event",
        "Starts", "Length", "Type", "Title"
    )?;
    writeln!(
        writer,
        "────────────────  ────────  ────────  ────────────────────────────────  ─────"
    )?;
    for row in rows {
        let length = if row.event.all_day {
            "all day".to_string()
        } else {
            format_minutes(u64::from(row.duration_minutes))
        };
        let label = match &row.project_name {
            Some(project) => format!("{} ({project})", row.event.title),
            None => row.event.title.clone(),
        };
        writeln!(
            writer,
            "{:<16}  {:>8}  {:<8}  {:<32}  {}",
            format_instant(row.event.starts_at),
            length,
            row.event.event_type,
            truncate(&label, 32),
            row.event.id
        )?;
    }
    Ok(())
}
