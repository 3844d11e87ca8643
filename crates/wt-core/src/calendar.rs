//! Calendar events and weekly schedule templates.
//!
//! An [`Event`] is a dated block on one user's calendar, optionally tied to
//! the project or task it was spent on. A [`Schedule`] is a recurring weekly
//! slot ("Mondays 09:00-12:00, focus") that describes how a user intends to
//! spend the week. Neither feeds time reports; tracked time only ever comes
//! from time entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::catalog::define_choice;
use crate::time_entry::whole_minutes;
use crate::types::{EventId, ProjectId, ScheduleId, TaskId, UserId, ValidationError};

/// Colour given to events and slots that do not name one.
pub const DEFAULT_COLOR: &str = "#3B82F6";

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

define_choice!(
    /// What a calendar block is used for.
    EventType, "event type", default = Work,
    {
        Work => "work",
        Meeting => "meeting",
        Break => "break",
        Personal => "personal",
        Focus => "focus",
        Other => "other",
    }
);

/// A block of time on a user's calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub user_id: UserId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub event_type: EventType,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Whole minutes between start and end, truncated.
    pub fn duration_minutes(&self) -> u32 {
        whole_minutes(self.starts_at, self.ends_at)
    }
}

/// One slot of a user's weekly template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub user_id: UserId,
    /// Name of the template this slot belongs to, e.g. "Default week".
    pub name: String,
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub event_type: EventType,
    pub color: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    pub fn duration_minutes(&self) -> u32 {
        let minutes = (self.end_time - self.start_time).num_minutes();
        u32::try_from(minutes.max(0)).unwrap_or(u32::MAX)
    }
}

/// Rejects an event whose end precedes its start. Zero-length events are allowed.
pub fn check_event_span(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if ends_at < starts_at {
        return Err(ValidationError::EndBeforeStart);
    }
    Ok(())
}

/// Rejects a weekly slot that does not end strictly after it starts.
pub fn check_slot(start: NaiveTime, end: NaiveTime) -> Result<(), ValidationError> {
    if end <= start {
        return Err(ValidationError::EmptySlot { start, end });
    }
    Ok(())
}

/// Normalises a `#RRGGBB` colour to upper case.
pub fn parse_color(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    let valid = trimmed.len() == 7
        && trimmed.starts_with('#')
        && trimmed[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(ValidationError::InvalidColor {
            value: value.to_string(),
        });
    }
    Ok(trimmed.to_ascii_uppercase())
}

/// Monday is 0, Sunday is 6.
pub const fn weekday_index(day: Weekday) -> u8 {
    match day {
        Weekday::Mon => 0,
        Weekday::Tue => 1,
        Weekday::Wed => 2,
        Weekday::Thu => 3,
        Weekday::Fri => 4,
        Weekday::Sat => 5,
        Weekday::Sun => 6,
    }
}

pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    WEEK.get(usize::from(index)).copied()
}

/// Accepts `0`..`6` (Monday first) or an English day name such as `mon` or `Tuesday`.
pub fn parse_weekday(value: &str) -> Result<Weekday, ValidationError> {
    let trimmed = value.trim();
    let parsed = match trimmed.parse::<u8>() {
        Ok(index) => weekday_from_index(index),
        Err(_) => trimmed.parse::<Weekday>().ok(),
    };
    parsed.ok_or_else(|| ValidationError::InvalidWeekday {
        value: value.to_string(),
    })
}

/// Parses `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(field: &'static str, value: &str) -> Result<NaiveTime, ValidationError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| ValidationError::InvalidTime {
            field,
            value: value.to_string(),
        })
}
