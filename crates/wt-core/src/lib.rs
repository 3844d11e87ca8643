//! Core domain logic for the work tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Catalog records: users, projects, tasks and subtasks with their status vocabularies
//! - Calendar: per-user events and weekly schedule templates
//! - Timer: the per-user start/pause/resume/stop state machine
//! - Time entries: completed (or manually running) spans of work
//! - Reporting: aggregating a user's entries over an inclusive date range
//!
//! Nothing here touches storage. Every time-dependent operation takes the
//! current instant explicitly, usually obtained from a [`Clock`].

pub mod calendar;
pub mod catalog;
pub mod clock;
pub mod report;
pub mod time_entry;
pub mod timer;
pub mod types;

pub use calendar::{
    DEFAULT_COLOR, Event, EventType, Schedule, check_event_span, check_slot, parse_color,
    parse_time_of_day, parse_weekday, weekday_from_index, weekday_index,
};
pub use catalog::{
    Priority, Project, ProjectCategory, ProjectStatus, SubTask, Task, TaskStatus, User,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use report::{
    ProjectTotal, ReportEntry, ReportPeriod, ReportRange, ReportSummary, TaskTotal, TimeReport,
    build_report,
};
pub use time_entry::{NewTimeEntry, TimeEntry, whole_minutes};
pub use timer::{CompletedSpan, Timer, TimerState};
pub use types::{
    EventId, ProjectId, ScheduleId, SubTaskId, TaskId, TimeEntryId, UserId, ValidationError,
    parse_date,
};
