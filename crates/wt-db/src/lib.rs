//! Storage layer for the work tracker.
//!
//! Provides persistence for users, projects, tasks, subtasks, time entries,
//! timers, calendar events and weekly schedules using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! This means a `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization. Open one instance per thread;
//! SQLite serializes writers across connections.
//!
//! # Units of Work
//!
//! Every mutation runs in its own `BEGIN IMMEDIATE` transaction. The write lock is
//! taken up front, so two connections racing to start a timer for the same user
//! cannot both read "no timer" and then both insert.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`). Because every row uses the same width and
//! the `Z` suffix, lexicographic ordering matches chronological ordering and range
//! filters can compare strings directly. Dates are stored as `YYYY-MM-DD`.
//!
//! Instants are cut to milliseconds on the way in, before any minute arithmetic,
//! so a record returned by a write is identical to the one read back later.
//!
//! ## One Timer Per User
//!
//! The `timers` table is keyed by `user_id`. A second timer for the same user is
//! rejected by the primary key, which surfaces as [`DbError::ConstraintViolation`].
//! A `CHECK` keeps `is_paused` and `paused_at` in agreement.
//!
//! ## Weekdays
//!
//! `schedules.day_of_week` is an integer from 0 (Monday) to 6 (Sunday), so
//! ordering by it walks the week in calendar order.

mod calendar;
mod catalog;
mod entries;
#[cfg(test)]
mod test_support;
mod timers;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior, ffi};
use thiserror::Error;
use uuid::Uuid;
use wt_core::{Clock, SystemClock, ValidationError};

pub use calendar::{EventFilter, EventRow, NewEvent, NewSchedule};
pub use catalog::{NewProject, NewTask, NewUser, TaskFilter};
pub use entries::{EntryFilter, TimeEntryRow};
pub use timers::TimerStart;

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The caller asked for a record that does not exist (or is not theirs).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    /// The request was rejected before any mutation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A core validation rule rejected the request.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    /// A storage-level uniqueness rule rejected the write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for {record_id}: {timestamp}")]
    TimestampParse {
        record_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored value that no longer matches the domain vocabulary.
    #[error("corrupt row {record_id}: {message}")]
    CorruptRow { record_id: String, message: String },
    /// Failed to encode or decode a JSON column.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a [`DbError`] for callers that map errors to
/// responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    ConstraintViolation,
    Storage,
}

impl DbError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidInput(_) | Self::Validation(_) => ErrorKind::InvalidInput,
            Self::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            Self::Sqlite(_)
            | Self::TimestampParse { .. }
            | Self::CorruptRow { .. }
            | Self::Json(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
    clock: Box<dyn Clock>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn,
            clock: Box::new(SystemClock),
        };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            clock: Box::new(SystemClock),
        };
        db.init()?;
        Ok(db)
    }

    /// Replaces the clock used by operations that do not take an explicit instant.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// The current instant according to this database's clock, at storage
    /// precision.
    pub fn now(&self) -> DateTime<Utc> {
        stored_instant(self.clock.now())
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                personal_identifier TEXT NOT NULL UNIQUE,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                client TEXT NOT NULL DEFAULT '',
                deadline TEXT,
                status TEXT NOT NULL DEFAULT 'active'
                    CHECK (status IN ('planned', 'active', 'paused', 'done')),
                category TEXT NOT NULL DEFAULT 'dev'
                    CHECK (category IN ('dev', 'design', 'integration', 'maintenance')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_projects_created ON projects(created_at);

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                assignee_id TEXT,
                status TEXT NOT NULL DEFAULT 'todo'
                    CHECK (status IN ('todo', 'doing', 'done')),
                priority TEXT NOT NULL DEFAULT 'medium'
                    CHECK (priority IN ('low', 'medium', 'high', 'urgent')),
                due_date TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
                FOREIGN KEY (assignee_id) REFERENCES users(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_updated ON tasks(updated_at);

            -- ended_at NULL means the entry is still running
            CREATE TABLE IF NOT EXISTS time_entries (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                duration_minutes INTEGER NOT NULL DEFAULT 0 CHECK (duration_minutes >= 0),
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_time_entries_user_started
                ON time_entries(user_id, started_at);
            CREATE INDEX IF NOT EXISTS idx_time_entries_task ON time_entries(task_id);

            -- One slot per user
            CREATE TABLE IF NOT EXISTS timers (
                user_id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                paused_duration INTEGER NOT NULL DEFAULT 0 CHECK (paused_duration >= 0),
                is_paused INTEGER NOT NULL DEFAULT 0,
                paused_at TEXT,
                CHECK ((is_paused <> 0) = (paused_at IS NOT NULL)),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS subtasks (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                title TEXT NOT NULL,
                is_done INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_subtasks_task ON subtasks(task_id);

            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                event_type TEXT NOT NULL DEFAULT 'work'
                    CHECK (event_type IN ('work', 'meeting', 'break', 'personal', 'focus', 'other')),
                starts_at TEXT NOT NULL,
                ends_at TEXT NOT NULL,
                all_day INTEGER NOT NULL DEFAULT 0,
                location TEXT NOT NULL DEFAULT '',
                project_id TEXT,
                task_id TEXT,
                color TEXT NOT NULL DEFAULT '#3B82F6',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK (ends_at >= starts_at),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE SET NULL,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_user_starts ON events(user_id, starts_at);

            CREATE TABLE IF NOT EXISTS schedules (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                day_of_week INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                event_type TEXT NOT NULL DEFAULT 'work'
                    CHECK (event_type IN ('work', 'meeting', 'break', 'personal', 'focus', 'other')),
                color TEXT NOT NULL DEFAULT '#3B82F6',
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                CHECK (end_time > start_time),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_schedules_user_day
                ON schedules(user_id, day_of_week, start_time);
            ",
        )?;
        Ok(())
    }

    /// Starts a unit of work that holds the write lock from the first statement.
    fn write_tx(&mut self) -> Result<Transaction<'_>, DbError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn parse_timestamp(timestamp: &str, record_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            record_id: record_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn parse_optional_timestamp(
    timestamp: Option<&str>,
    record_id: &str,
) -> Result<Option<DateTime<Utc>>, DbError> {
    timestamp
        .map(|value| parse_timestamp(value, record_id))
        .transpose()
}

/// Drops precision finer than the stored millisecond.
fn stored_instant(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.trunc_subsecs(3)
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_stored_date(value: Option<&str>, record_id: &str) -> Result<Option<NaiveDate>, DbError> {
    value
        .map(|value| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|err| DbError::CorruptRow {
                record_id: record_id.to_string(),
                message: format!("invalid date {value}: {err}"),
            })
        })
        .transpose()
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn format_time_of_day(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

fn parse_stored_time(value: &str, record_id: &str) -> Result<NaiveTime, DbError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S").map_err(|err| DbError::CorruptRow {
        record_id: record_id.to_string(),
        message: format!("invalid time {value}: {err}"),
    })
}

/// Parses a stored vocabulary value or identifier, blaming the row on failure.
fn parse_stored<T, E: std::fmt::Display>(
    result: Result<T, E>,
    record_id: &str,
) -> Result<T, DbError> {
    result.map_err(|err| DbError::CorruptRow {
        record_id: record_id.to_string(),
        message: err.to_string(),
    })
}

/// Maps a primary-key or unique-index failure to [`DbError::ConstraintViolation`].
fn map_unique_violation(err: rusqlite::Error, message: impl FnOnce() -> String) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            DbError::ConstraintViolation(message())
        }
        _ => DbError::Sqlite(err),
    }
}
