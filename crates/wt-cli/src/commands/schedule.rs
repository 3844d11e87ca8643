//! Weekly schedule commands.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{NaiveTime, Weekday};
use clap::Subcommand;
use wt_core::{EventType, Schedule, ScheduleId, User, ValidationError, parse_time_of_day};
use wt_db::{Database, NewSchedule};

use super::util::{format_minutes, truncate};

#[derive(Debug, Subcommand)]
pub enum ScheduleAction {
    /// Add a slot to your weekly template.
    Add {
        title: String,
        /// Day of the week: mon..sun, or 0..6 with Monday as 0.
        #[arg(long, value_parser = wt_core::parse_weekday)]
        day: Weekday,
        /// Start time as HH:MM.
        #[arg(long, value_parser = start_time)]
        start: NaiveTime,
        /// End time as HH:MM; must be after --start.
        #[arg(long, value_parser = end_time)]
        end: NaiveTime,
        /// Template the slot belongs to.
        #[arg(long, default_value = "Default week")]
        name: String,
        #[arg(long = "type", default_value_t)]
        event_type: EventType,
        /// Display colour as #RRGGBB.
        #[arg(long)]
        color: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        /// Create the slot switched off.
        #[arg(long)]
        inactive: bool,
    },
    /// Show your week, Monday first.
    List {
        /// Include switched-off slots.
        #[arg(long)]
        all: bool,
        /// Only this day of the week.
        #[arg(long, value_parser = wt_core::parse_weekday)]
        day: Option<Weekday>,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Switch a slot back on.
    Activate { schedule_id: String },
    /// Switch a slot off without deleting it.
    Deactivate { schedule_id: String },
    /// Delete a slot.
    Remove { schedule_id: String },
}

fn start_time(value: &str) -> Result<NaiveTime, ValidationError> {
    parse_time_of_day("start", value)
}

fn end_time(value: &str) -> Result<NaiveTime, ValidationError> {
    parse_time_of_day("end", value)
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    user: &User,
    action: &ScheduleAction,
) -> Result<()> {
    match action {
        ScheduleAction::Add {
            title,
            day,
            start,
            end,
            name,
            event_type,
            color,
            description,
            inactive,
        } => {
            let input = NewSchedule {
                name: name.clone(),
                day_of_week: *day,
                start_time: *start,
                end_time: *end,
                title: title.clone(),
                description: description.clone(),
                event_type: *event_type,
                color: color.clone(),
                is_active: !inactive,
            };
            let slot = db
                .create_schedule(&user.id, input)
                .context("failed to create schedule slot")?;
            writeln!(
                writer,
                "Created slot {} on {} ({})",
                slot.title,
                slot_time(&slot),
                slot.id
            )?;
        }
        ScheduleAction::List { all, day, json } => {
            let mut slots = db
                .list_schedules(&user.id, *all)
                .context("failed to list schedule")?;
            if let Some(day) = day {
                slots.retain(|slot| slot.day_of_week == *day);
            }
            if *json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&slots)?)?;
            } else {
                write_slots(writer, &slots)?;
            }
        }
        ScheduleAction::Activate { schedule_id } => {
            let slot = set_active(db, user, schedule_id, true)?;
            writeln!(writer, "Activated {} on {}", slot.title, slot_time(&slot))?;
        }
        ScheduleAction::Deactivate { schedule_id } => {
            let slot = set_active(db, user, schedule_id, false)?;
            writeln!(writer, "Deactivated {} on {}", slot.title, slot_time(&slot))?;
        }
        ScheduleAction::Remove { schedule_id } => {
            db.delete_schedule(&user.id, &ScheduleId::new(schedule_id.as_str())?)
                .with_context(|| format!("failed to remove slot {schedule_id}"))?;
            writeln!(writer, "Removed slot {schedule_id}")?;
        }
    }
    Ok(())
}

fn set_active(
    db: &mut Database,
    user: &User,
    schedule_id: &str,
    active: bool,
) -> Result<Schedule> {
    db.set_schedule_active(&user.id, &ScheduleId::new(schedule_id)?, active)
        .with_context(|| format!("failed to update slot {schedule_id}"))
}

/// "Mon 09:00-12:00".
fn slot_time(slot: &Schedule) -> String {
    format!(
        "{} {}-{}",
        slot.day_of_week,
        slot.start_time.format("%H:%M"),
        slot.end_time.format("%H:%M")
    )
}

fn write_slots<W: Write>(writer: &mut W, slots: &[Schedule]) -> Result<()> {
    if slots.is_empty() {
        writeln!(writer, "No schedule slots.")?;
        return Ok(());
    }
    for slot in slots {
        let state = if slot.is_active { "" } else { "  (inactive)" };
        writeln!(
            writer,
            "{}  {:>6}  {:<8}  {:<24}  {}{state}",
            slot_time(slot),
            format_minutes(u64::from(slot.duration_minutes())),
            slot.event_type,
            truncate(&slot.title, 24),
            slot.id
        )?;
    }
    Ok(())
}
