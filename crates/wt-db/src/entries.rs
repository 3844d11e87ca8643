//! Time entries and the report built from them.
//!
//! Every query here is scoped to one owner. An entry that belongs to someone
//! else is reported as missing, never as forbidden.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;
use tracing::{debug, info};
use wt_core::{
    NewTimeEntry, ProjectId, ReportEntry, ReportRange, TaskId, TimeEntry, TimeEntryId,
    TimeReport, UserId, build_report,
};

use crate::catalog::row_exists;
use crate::{
    Database, DbError, format_timestamp, new_id, parse_optional_timestamp, parse_stored,
    parse_timestamp, stored_instant,
};

const ENTRY_COLUMNS: &str = "e.id, e.task_id, e.user_id, e.started_at, e.ended_at, \
                             e.duration_minutes, e.description, e.created_at";

/// Optional narrowing for [`Database::list_time_entries`].
///
/// Date bounds are inclusive and compare against the UTC date of `started_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub task_id: Option<TaskId>,
    pub project_id: Option<ProjectId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// A time entry with the names needed to display it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeEntryRow {
    #[serde(flatten)]
    pub entry: TimeEntry,
    pub task_title: String,
    pub project_id: ProjectId,
    pub project_name: String,
    pub is_running: bool,
}

impl Database {
    /// Records a manual time entry for `user`.
    ///
    /// With `ended_at` the duration comes from the timestamps; without it the
    /// entry is left running.
    pub fn create_time_entry(
        &mut self,
        user: &UserId,
        mut input: NewTimeEntry,
    ) -> Result<TimeEntry, DbError> {
        input.started_at = stored_instant(input.started_at);
        input.ended_at = input.ended_at.map(stored_instant);
        let duration_minutes = input.resolve_duration()?;
        let entry = TimeEntry {
            id: parse_stored(TimeEntryId::new(new_id()), "time entry")?,
            task_id: input.task_id,
            user_id: user.clone(),
            started_at: input.started_at,
            ended_at: input.ended_at,
            duration_minutes,
            description: input.description.trim().to_string(),
            created_at: self.now(),
        };

        let tx = self.write_tx()?;
        if !row_exists(&tx, "tasks", entry.task_id.as_str())? {
            return Err(DbError::InvalidInput(format!("unknown task: {}", entry.task_id)));
        }
        insert_entry(&tx, &entry)?;
        tx.commit()?;

        info!(
            entry_id = %entry.id,
            user_id = %user,
            task_id = %entry.task_id,
            running = entry.is_running(),
            "created time entry"
        );
        Ok(entry)
    }

    pub fn time_entry(&self, user: &UserId, id: &TimeEntryId) -> Result<TimeEntry, DbError> {
        load_entry(&self.conn, user, id)?.ok_or_else(|| DbError::not_found("time entry", id))
    }

    /// Stops a running entry now. Stopping a stopped entry changes nothing.
    pub fn stop_time_entry(
        &mut self,
        user: &UserId,
        id: &TimeEntryId,
    ) -> Result<TimeEntry, DbError> {
        let now = self.now();
        self.stop_time_entry_at(user, id, now)
    }

    pub fn stop_time_entry_at(
        &mut self,
        user: &UserId,
        id: &TimeEntryId,
        now: DateTime<Utc>,
    ) -> Result<TimeEntry, DbError> {
        let now = stored_instant(now);
        let tx = self.write_tx()?;
        let mut entry =
            load_entry(&tx, user, id)?.ok_or_else(|| DbError::not_found("time entry", id))?;
        if !entry.stop(now) {
            debug!(entry_id = %id, "time entry already stopped");
            return Ok(entry);
        }
        tx.execute(
            "UPDATE time_entries SET ended_at = ?1, duration_minutes = ?2 WHERE id = ?3",
            params![
                entry.ended_at.map(format_timestamp),
                entry.duration_minutes,
                entry.id.as_str(),
            ],
        )?;
        tx.commit()?;

        info!(
            entry_id = %id,
            duration_minutes = entry.duration_minutes,
            "stopped time entry"
        );
        Ok(entry)
    }

    /// Lists `user`'s entries matching `filter`, most recent first.
    pub fn list_time_entries(
        &self,
        user: &UserId,
        filter: &EntryFilter,
    ) -> Result<Vec<TimeEntryRow>, DbError> {
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            ReportRange::new(start, end)?;
        }

        let mut clauses = vec!["e.user_id = ?"];
        let mut values = vec![user.to_string()];
        if let Some(task_id) = &filter.task_id {
            clauses.push("e.task_id = ?");
            values.push(task_id.to_string());
        }
        if let Some(project_id) = &filter.project_id {
            clauses.push("t.project_id = ?");
            values.push(project_id.to_string());
        }
        if let Some(start) = filter.start_date {
            clauses.push("e.started_at >= ?");
            values.push(format_timestamp(day_start(start)));
        }
        if let Some(end) = filter.end_date {
            clauses.push("e.started_at < ?");
            values.push(format_timestamp(day_start(end + Duration::days(1))));
        }

        let sql = format!(
            "
            SELECT {ENTRY_COLUMNS}, t.title, p.id, p.name
            FROM time_entries e
            JOIN tasks t ON t.id = e.task_id
            JOIN projects p ON p.id = t.project_id
            WHERE {}
            ORDER BY e.started_at DESC, e.id DESC
            ",
            clauses.join(" AND ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((
                EntryRow::from_row(row)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, String>(10)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (entry, task_title, project_id, project_name) = row?;
            let entry = entry.into_entry()?;
            entries.push(TimeEntryRow {
                project_id: parse_stored(ProjectId::new(project_id), entry.id.as_str())?,
                is_running: entry.is_running(),
                entry,
                task_title,
                project_name,
            });
        }
        Ok(entries)
    }

    /// Builds `user`'s time report from optional `YYYY-MM-DD` bounds.
    ///
    /// Missing bounds default to the seven days ending today (UTC). Bounds are
    /// validated before anything is read.
    pub fn report(
        &self,
        user: &UserId,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<TimeReport, DbError> {
        let today = self.now().date_naive();
        let range = ReportRange::resolve(start_date, end_date, today)?;
        self.report_for_range(user, range)
    }

    pub fn report_for_range(
        &self,
        user: &UserId,
        range: ReportRange,
    ) -> Result<TimeReport, DbError> {
        let (start, end) = range.utc_bounds();
        let mut stmt = self.conn.prepare(
            "
            SELECT e.id, e.task_id, t.title, p.id, p.name, e.started_at, e.duration_minutes
            FROM time_entries e
            JOIN tasks t ON t.id = e.task_id
            JOIN projects p ON p.id = t.project_id
            WHERE e.user_id = ?1 AND e.started_at >= ?2 AND e.started_at < ?3
            ",
        )?;
        let rows = stmt.query_map(
            params![user.as_str(), format_timestamp(start), format_timestamp(end)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            },
        )?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, task_id, task_title, project_id, project_name, started_at, minutes) = row?;
            entries.push(ReportEntry {
                task_id: parse_stored(TaskId::new(task_id), &id)?,
                task_title,
                project_id: parse_stored(ProjectId::new(project_id), &id)?,
                project_name,
                started_at: parse_timestamp(&started_at, &id)?,
                duration_minutes: parse_stored(u32::try_from(minutes), &id)?,
            });
        }

        debug!(
            user_id = %user,
            start = %range.start,
            end = %range.end,
            entries = entries.len(),
            "building report"
        );
        Ok(build_report(range, &entries))
    }
}

pub(crate) fn insert_entry(conn: &Connection, entry: &TimeEntry) -> Result<(), DbError> {
    conn.execute(
        "
        INSERT INTO time_entries
            (id, task_id, user_id, started_at, ended_at, duration_minutes, description, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ",
        params![
            entry.id.as_str(),
            entry.task_id.as_str(),
            entry.user_id.as_str(),
            format_timestamp(entry.started_at),
            entry.ended_at.map(format_timestamp),
            entry.duration_minutes,
            entry.description,
            format_timestamp(entry.created_at),
        ],
    )?;
    Ok(())
}

fn load_entry(
    conn: &Connection,
    user: &UserId,
    id: &TimeEntryId,
) -> Result<Option<TimeEntry>, DbError> {
    conn.query_row(
        &format!("SELECT {ENTRY_COLUMNS} FROM time_entries e WHERE e.id = ?1 AND e.user_id = ?2"),
        [id.as_str(), user.as_str()],
        EntryRow::from_row,
    )
    .optional()?
    .map(EntryRow::into_entry)
    .transpose()
}

pub(crate) fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}

struct EntryRow {
    id: String,
    task_id: String,
    user_id: String,
    started_at: String,
    ended_at: Option<String>,
    duration_minutes: i64,
    description: String,
    created_at: String,
}

impl EntryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            task_id: row.get(1)?,
            user_id: row.get(2)?,
            started_at: row.get(3)?,
            ended_at: row.get(4)?,
            duration_minutes: row.get(5)?,
            description: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_entry(self) -> Result<TimeEntry, DbError> {
        let id = &self.id;
        Ok(TimeEntry {
            id: parse_stored(TimeEntryId::new(id.as_str()), id)?,
            task_id: parse_stored(TaskId::new(self.task_id.as_str()), id)?,
            user_id: parse_stored(UserId::new(self.user_id.as_str()), id)?,
            started_at: parse_timestamp(&self.started_at, id)?,
            ended_at: parse_optional_timestamp(self.ended_at.as_deref(), id)?,
            duration_minutes: parse_stored(u32::try_from(self.duration_minutes), id)?,
            created_at: parse_timestamp(&self.created_at, id)?,
            description: self.description,
        })
    }
}
