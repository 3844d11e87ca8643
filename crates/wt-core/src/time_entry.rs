//! Recorded spans of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{TaskId, TimeEntryId, UserId, ValidationError};

/// Whole minutes from `start` to `end`, rounded down.
///
/// Spans where `end` precedes `start` count as zero.
pub fn whole_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    let seconds = end.signed_duration_since(start).num_seconds();
    clamp_minutes(seconds.div_euclid(60))
}

pub(crate) fn clamp_minutes(minutes: i64) -> u32 {
    u32::try_from(minutes.max(0)).unwrap_or(u32::MAX)
}

/// A span of time a user spent on a task.
///
/// An entry without `ended_at` is running. Running entries only come from
/// manual creation; entries produced by a timer are always closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: TimeEntryId,
    pub task_id: TaskId,
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl TimeEntry {
    pub const fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Closes a running entry at `now`.
    ///
    /// Returns `false` without touching the entry if it is already closed.
    pub fn stop(&mut self, now: DateTime<Utc>) -> bool {
        if self.ended_at.is_some() {
            return false;
        }
        self.ended_at = Some(now);
        self.duration_minutes = whole_minutes(self.started_at, now);
        true
    }
}

/// Input for a manually created entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTimeEntry {
    pub task_id: TaskId,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub description: String,
}

impl NewTimeEntry {
    pub const fn new(task_id: TaskId, started_at: DateTime<Utc>) -> Self {
        Self {
            task_id,
            started_at,
            ended_at: None,
            duration_minutes: None,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn ended_at(mut self, ended_at: DateTime<Utc>) -> Self {
        self.ended_at = Some(ended_at);
        self
    }

    #[must_use]
    pub const fn duration_minutes(mut self, minutes: u32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Checks the timestamps and settles the stored duration.
    ///
    /// Closed entries derive their duration from the timestamps; a supplied
    /// duration must agree with it. Running entries keep the supplied
    /// duration, or zero.
    pub fn resolve_duration(&self) -> Result<u32, ValidationError> {
        let Some(ended_at) = self.ended_at else {
            return Ok(self.duration_minutes.unwrap_or(0));
        };
        if ended_at < self.started_at {
            return Err(ValidationError::EndBeforeStart);
        }
        let computed = whole_minutes(self.started_at, ended_at);
        match self.duration_minutes {
            Some(supplied) if supplied != computed => {
                Err(ValidationError::DurationMismatch { supplied, computed })
            }
            _ => Ok(computed),
        }
    }
}
