//! Calendar events and weekly schedule slots.
//!
//! Both belong to exactly one user and every query is scoped to that owner.
//! Someone else's event or slot is reported as missing.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;
use tracing::{debug, info};
use wt_core::{
    DEFAULT_COLOR, Event, EventId, EventType, ProjectId, ReportRange, Schedule, ScheduleId,
    TaskId, UserId, check_event_span, check_slot, parse_color, weekday_from_index, weekday_index,
};

use crate::catalog::row_exists;
use crate::entries::day_start;
use crate::{
    Database, DbError, format_time_of_day, format_timestamp, new_id, parse_stored,
    parse_stored_time, parse_timestamp, stored_instant,
};

const EVENT_COLUMNS: &str = "e.id, e.user_id, e.title, e.description, e.event_type, \
                             e.starts_at, e.ends_at, e.all_day, e.location, e.project_id, \
                             e.task_id, e.color, e.created_at, e.updated_at";

const SCHEDULE_COLUMNS: &str = "id, user_id, name, day_of_week, start_time, end_time, title, \
                                description, event_type, color, is_active, created_at";

/// Input for [`Database::create_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub event_type: EventType,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub all_day: bool,
    pub location: String,
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    /// `#RRGGBB`; the default blue when unset.
    pub color: Option<String>,
}

impl NewEvent {
    pub fn new(
        title: impl Into<String>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            event_type: EventType::default(),
            starts_at,
            ends_at,
            all_day: false,
            location: String::new(),
            project_id: None,
            task_id: None,
            color: None,
        }
    }
}

/// Optional narrowing for [`Database::list_events`].
///
/// Date bounds are inclusive UTC days: `start_date` keeps events starting on
/// or after that day, `end_date` keeps events ending on or before it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub event_type: Option<EventType>,
    pub project_id: Option<ProjectId>,
}

/// An event with its length and the names of what it is linked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRow {
    #[serde(flatten)]
    pub event: Event,
    pub duration_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_title: Option<String>,
}

/// Input for [`Database::create_schedule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSchedule {
    pub name: String,
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub title: String,
    pub description: String,
    pub event_type: EventType,
    pub color: Option<String>,
    pub is_active: bool,
}

impl NewSchedule {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        day_of_week: Weekday,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Self {
        Self {
            name: name.into(),
            day_of_week,
            start_time,
            end_time,
            title: title.into(),
            description: String::new(),
            event_type: EventType::default(),
            color: None,
            is_active: true,
        }
    }
}

impl Database {
    /// Puts an event on `user`'s calendar.
    ///
    /// Linked projects and tasks must exist; they are unlinked again if later
    /// deleted.
    pub fn create_event(&mut self, user: &UserId, input: NewEvent) -> Result<Event, DbError> {
        let title = non_blank(&input.title, "event title")?;
        let starts_at = stored_instant(input.starts_at);
        let ends_at = stored_instant(input.ends_at);
        check_event_span(starts_at, ends_at)?;
        let now = self.now();
        let event = Event {
            id: parse_stored(EventId::new(new_id()), "event")?,
            user_id: user.clone(),
            title,
            description: input.description.trim().to_string(),
            event_type: input.event_type,
            starts_at,
            ends_at,
            all_day: input.all_day,
            location: input.location.trim().to_string(),
            project_id: input.project_id,
            task_id: input.task_id,
            color: resolve_color(input.color.as_deref())?,
            created_at: now,
            updated_at: now,
        };

        let tx = self.write_tx()?;
        require_user(&tx, user)?;
        if let Some(project_id) = &event.project_id {
            if !row_exists(&tx, "projects", project_id.as_str())? {
                return Err(DbError::InvalidInput(format!("unknown project: {project_id}")));
            }
        }
        if let Some(task_id) = &event.task_id {
            if !row_exists(&tx, "tasks", task_id.as_str())? {
                return Err(DbError::InvalidInput(format!("unknown task: {task_id}")));
            }
        }
        tx.execute(
            "
            INSERT INTO events
                (id, user_id, title, description, event_type, starts_at, ends_at, all_day,
                 location, project_id, task_id, color, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ",
            params![
                event.id.as_str(),
                event.user_id.as_str(),
                event.title,
                event.description,
                event.event_type.as_str(),
                format_timestamp(event.starts_at),
                format_timestamp(event.ends_at),
                event.all_day,
                event.location,
                event.project_id.as_ref().map(ProjectId::as_str),
                event.task_id.as_ref().map(TaskId::as_str),
                event.color,
                format_timestamp(event.created_at),
                format_timestamp(event.updated_at),
            ],
        )?;
        tx.commit()?;

        info!(
            event_id = %event.id,
            user_id = %user,
            event_type = %event.event_type,
            "created event"
        );
        Ok(event)
    }

    pub fn event(&self, user: &UserId, id: &EventId) -> Result<Event, DbError> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = ?1 AND e.user_id = ?2"
                ),
                [id.as_str(), user.as_str()],
                EventRecord::from_row,
            )
            .optional()?
            .ok_or_else(|| DbError::not_found("event", id))?
            .into_event()
    }

    /// Lists `user`'s events matching `filter`, earliest first.
    pub fn list_events(
        &self,
        user: &UserId,
        filter: &EventFilter,
    ) -> Result<Vec<EventRow>, DbError> {
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            ReportRange::new(start, end)?;
        }

        let mut clauses = vec!["e.user_id = ?"];
        let mut values = vec![user.to_string()];
        if let Some(start) = filter.start_date {
            clauses.push("e.starts_at >= ?");
            values.push(format_timestamp(day_start(start)));
        }
        if let Some(end) = filter.end_date {
            clauses.push("e.ends_at < ?");
            values.push(format_timestamp(day_start(end + Duration::days(1))));
        }
        if let Some(event_type) = filter.event_type {
            clauses.push("e.event_type = ?");
            values.push(event_type.as_str().to_string());
        }
        if let Some(project_id) = &filter.project_id {
            clauses.push("e.project_id = ?");
            values.push(project_id.to_string());
        }

        let sql = format!(
            "
            SELECT {EVENT_COLUMNS}, p.name, t.title
            FROM events e
            LEFT JOIN projects p ON p.id = e.project_id
            LEFT JOIN tasks t ON t.id = e.task_id
            WHERE {}
            ORDER BY e.starts_at, e.id
            ",
            clauses.join(" AND ")
        );
        debug!(%sql, "listing events");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((
                EventRecord::from_row(row)?,
                row.get::<_, Option<String>>(14)?,
                row.get::<_, Option<String>>(15)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (record, project_name, task_title) = row?;
            let event = record.into_event()?;
            events.push(EventRow {
                duration_minutes: event.duration_minutes(),
                event,
                project_name,
                task_title,
            });
        }
        Ok(events)
    }

    pub fn delete_event(&mut self, user: &UserId, id: &EventId) -> Result<(), DbError> {
        let tx = self.write_tx()?;
        let deleted = tx.execute(
            "DELETE FROM events WHERE id = ?1 AND user_id = ?2",
            [id.as_str(), user.as_str()],
        )?;
        if deleted == 0 {
            return Err(DbError::not_found("event", id));
        }
        tx.commit()?;
        info!(event_id = %id, user_id = %user, "deleted event");
        Ok(())
    }

    /// Adds a slot to `user`'s weekly template.
    pub fn create_schedule(
        &mut self,
        user: &UserId,
        input: NewSchedule,
    ) -> Result<Schedule, DbError> {
        let name = non_blank(&input.name, "schedule name")?;
        let title = non_blank(&input.title, "schedule title")?;
        check_slot(input.start_time, input.end_time)?;
        let schedule = Schedule {
            id: parse_stored(ScheduleId::new(new_id()), "schedule")?,
            user_id: user.clone(),
            name,
            day_of_week: input.day_of_week,
            start_time: input.start_time,
            end_time: input.end_time,
            title,
            description: input.description.trim().to_string(),
            event_type: input.event_type,
            color: resolve_color(input.color.as_deref())?,
            is_active: input.is_active,
            created_at: self.now(),
        };

        let tx = self.write_tx()?;
        require_user(&tx, user)?;
        tx.execute(
            "
            INSERT INTO schedules
                (id, user_id, name, day_of_week, start_time, end_time, title, description,
                 event_type, color, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
            params![
                schedule.id.as_str(),
                schedule.user_id.as_str(),
                schedule.name,
                weekday_index(schedule.day_of_week),
                format_time_of_day(schedule.start_time),
                format_time_of_day(schedule.end_time),
                schedule.title,
                schedule.description,
                schedule.event_type.as_str(),
                schedule.color,
                schedule.is_active,
                format_timestamp(schedule.created_at),
            ],
        )?;
        tx.commit()?;

        info!(
            schedule_id = %schedule.id,
            user_id = %user,
            day = %schedule.day_of_week,
            "created schedule"
        );
        Ok(schedule)
    }

    pub fn schedule(&self, user: &UserId, id: &ScheduleId) -> Result<Schedule, DbError> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?1 AND user_id = ?2"
                ),
                [id.as_str(), user.as_str()],
                ScheduleRecord::from_row,
            )
            .optional()?
            .ok_or_else(|| DbError::not_found("schedule", id))?
            .into_schedule()
    }

    /// Lists `user`'s weekly template from Monday morning to Sunday night.
    ///
    /// Inactive slots are left out unless `include_inactive` is set.
    pub fn list_schedules(
        &self,
        user: &UserId,
        include_inactive: bool,
    ) -> Result<Vec<Schedule>, DbError> {
        let active_clause = if include_inactive { "" } else { "AND is_active = 1" };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE user_id = ?1 {active_clause} \
             ORDER BY day_of_week, start_time, id"
        ))?;
        let rows = stmt.query_map([user.as_str()], ScheduleRecord::from_row)?;
        let mut schedules = Vec::new();
        for row in rows {
            schedules.push(row?.into_schedule()?);
        }
        Ok(schedules)
    }

    /// Switches a slot on or off without deleting it.
    pub fn set_schedule_active(
        &mut self,
        user: &UserId,
        id: &ScheduleId,
        active: bool,
    ) -> Result<Schedule, DbError> {
        let tx = self.write_tx()?;
        let updated = tx.execute(
            "UPDATE schedules SET is_active = ?1 WHERE id = ?2 AND user_id = ?3",
            params![active, id.as_str(), user.as_str()],
        )?;
        if updated == 0 {
            return Err(DbError::not_found("schedule", id));
        }
        tx.commit()?;
        info!(schedule_id = %id, active, "updated schedule");
        self.schedule(user, id)
    }

    pub fn delete_schedule(&mut self, user: &UserId, id: &ScheduleId) -> Result<(), DbError> {
        let tx = self.write_tx()?;
        let deleted = tx.execute(
            "DELETE FROM schedules WHERE id = ?1 AND user_id = ?2",
            [id.as_str(), user.as_str()],
        )?;
        if deleted == 0 {
            return Err(DbError::not_found("schedule", id));
        }
        tx.commit()?;
        info!(schedule_id = %id, user_id = %user, "deleted schedule");
        Ok(())
    }
}

fn non_blank(value: &str, what: &str) -> Result<String, DbError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DbError::InvalidInput(format!("{what} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn resolve_color(color: Option<&str>) -> Result<String, DbError> {
    Ok(color
        .map(parse_color)
        .transpose()?
        .unwrap_or_else(|| DEFAULT_COLOR.to_string()))
}

fn require_user(conn: &Connection, user: &UserId) -> Result<(), DbError> {
    if row_exists(conn, "users", user.as_str())? {
        Ok(())
    } else {
        Err(DbError::InvalidInput(format!("unknown user: {user}")))
    }
}

struct EventRecord {
    id: String,
    user_id: String,
    title: String,
    description: String,
    event_type: String,
    starts_at: String,
    ends_at: String,
    all_day: bool,
    location: String,
    project_id: Option<String>,
    task_id: Option<String>,
    color: String,
    created_at: String,
    updated_at: String,
}

impl EventRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            event_type: row.get(4)?,
            starts_at: row.get(5)?,
            ends_at: row.get(6)?,
            all_day: row.get(7)?,
            location: row.get(8)?,
            project_id: row.get(9)?,
            task_id: row.get(10)?,
            color: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn into_event(self) -> Result<Event, DbError> {
        let id = &self.id;
        Ok(Event {
            id: parse_stored(EventId::new(id.as_str()), id)?,
            user_id: parse_stored(UserId::new(self.user_id.as_str()), id)?,
            event_type: parse_stored(self.event_type.parse(), id)?,
            starts_at: parse_timestamp(&self.starts_at, id)?,
            ends_at: parse_timestamp(&self.ends_at, id)?,
            project_id: self
                .project_id
                .as_deref()
                .map(|project| parse_stored(ProjectId::new(project), id))
                .transpose()?,
            task_id: self
                .task_id
                .as_deref()
                .map(|task| parse_stored(TaskId::new(task), id))
                .transpose()?,
            created_at: parse_timestamp(&self.created_at, id)?,
            updated_at: parse_timestamp(&self.updated_at, id)?,
            title: self.title,
            description: self.description,
            all_day: self.all_day,
            location: self.location,
            color: self.color,
        })
    }
}

struct ScheduleRecord {
    id: String,
    user_id: String,
    name: String,
    day_of_week: u8,
    start_time: String,
    end_time: String,
    title: String,
    description: String,
    event_type: String,
    color: String,
    is_active: bool,
    created_at: String,
}

impl ScheduleRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            day_of_week: row.get(3)?,
            start_time: row.get(4)?,
            end_time: row.get(5)?,
            title: row.get(6)?,
            description: row.get(7)?,
            event_type: row.get(8)?,
            color: row.get(9)?,
            is_active: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    fn into_schedule(self) -> Result<Schedule, DbError> {
        let id = &self.id;
        let day_of_week =
            weekday_from_index(self.day_of_week).ok_or_else(|| DbError::CorruptRow {
                record_id: id.clone(),
                message: format!("invalid day_of_week {}", self.day_of_week),
            })?;
        Ok(Schedule {
            id: parse_stored(ScheduleId::new(id.as_str()), id)?,
            user_id: parse_stored(UserId::new(self.user_id.as_str()), id)?,
            day_of_week,
            start_time: parse_stored_time(&self.start_time, id)?,
            end_time: parse_stored_time(&self.end_time, id)?,
            event_type: parse_stored(self.event_type.parse(), id)?,
            created_at: parse_timestamp(&self.created_at, id)?,
            name: self.name,
            title: self.title,
            description: self.description,
            color: self.color,
            is_active: self.is_active,
        })
    }
}
