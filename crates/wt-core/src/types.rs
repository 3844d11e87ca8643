//! Core type definitions with validation.

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A status/priority/category value outside the allowed set.
    #[error("invalid {field}: {value} (expected one of: {allowed})")]
    InvalidChoice {
        field: &'static str,
        value: String,
        allowed: String,
    },

    /// A date that is not `YYYY-MM-DD`.
    #[error("invalid date for {field}: {value} (expected YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },

    /// A date range whose start lies after its end.
    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    /// A span whose end precedes its start.
    #[error("ended_at must not be before started_at")]
    EndBeforeStart,

    /// A supplied duration that disagrees with the supplied timestamps.
    #[error("duration of {supplied} minutes does not match the {computed} minutes between the timestamps")]
    DurationMismatch { supplied: u32, computed: u32 },

    /// A display colour that is not `#RRGGBB`.
    #[error("invalid color: {value} (expected #RRGGBB)")]
    InvalidColor { value: String },

    /// A day name or number that is not a weekday.
    #[error("invalid weekday: {value} (expected mon..sun or 0..6)")]
    InvalidWeekday { value: String },

    /// A time of day that is not `HH:MM` or `HH:MM:SS`.
    #[error("invalid time for {field}: {value} (expected HH:MM)")]
    InvalidTime { field: &'static str, value: String },

    /// A weekly slot that does not end after it starts.
    #[error("slot end {end} must be after start {start}")]
    EmptySlot { start: NaiveTime, end: NaiveTime },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated user identifier.
    ///
    /// This is the record identity, not the human-facing `personal_identifier`.
    UserId, "user ID"
);

define_string_id!(
    /// A validated project identifier.
    ProjectId, "project ID"
);

define_string_id!(
    /// A validated task identifier.
    TaskId, "task ID"
);

define_string_id!(
    /// A validated time entry identifier.
    TimeEntryId, "time entry ID"
);

define_string_id!(
    /// A validated subtask identifier.
    SubTaskId, "subtask ID"
);

define_string_id!(
    /// A validated calendar event identifier.
    EventId, "event ID"
);

define_string_id!(
    /// A validated weekly schedule slot identifier.
    ScheduleId, "schedule ID"
);

/// Parses a `YYYY-MM-DD` date, naming the offending field on failure.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_rejects_empty() {
        assert!(TaskId::new("").is_err());
        assert!(TaskId::new("   ").is_err());
        assert!(TaskId::new("task-1").is_ok());
    }

    #[test]
    fn user_id_serde_roundtrip() {
        let id = UserId::new("user-123").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"user-123\"");
        let parsed: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn time_entry_id_serde_rejects_empty() {
        let result: Result<TimeEntryId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn project_id_as_ref() {
        let id = ProjectId::new("project-9").unwrap();
        let s: &str = id.as_ref();
        assert_eq!(s, "project-9");
    }

    #[test]
    fn parse_date_accepts_iso_dates() {
        assert_eq!(
            parse_date("start_date", "2025-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
    }

    #[test]
    fn parse_date_rejects_other_formats() {
        let err = parse_date("end_date", "03/01/2025").unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidDate {
                field: "end_date",
                value: "03/01/2025".to_string(),
            }
        );
        assert!(parse_date("end_date", "2025-02-30").is_err());
    }
}
