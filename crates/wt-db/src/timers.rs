//! Persistence for the per-user timer.
//!
//! Each operation loads the user's timer, applies the core state machine and
//! writes the result back inside one `BEGIN IMMEDIATE` transaction. Stopping
//! a timer (explicitly or by starting another one) turns it into a time entry
//! and removes the row in the same transaction.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use tracing::{debug, info};
use wt_core::{TaskId, TimeEntry, TimeEntryId, Timer, UserId};

use crate::catalog::row_exists;
use crate::entries::insert_entry;
use crate::{
    Database, DbError, format_timestamp, map_unique_violation, new_id, parse_optional_timestamp,
    parse_stored, parse_timestamp, stored_instant,
};

/// Outcome of [`Database::start_timer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerStart {
    pub timer: Timer,
    /// The entry recorded for the timer this one replaced, if there was one.
    pub replaced: Option<TimeEntry>,
}

impl Database {
    /// Returns the user's timer, if any. Never modifies anything.
    pub fn active_timer(&self, user: &UserId) -> Result<Option<Timer>, DbError> {
        load_timer(&self.conn, user)
    }

    /// Starts a timer on `task`, stopping the user's current timer first.
    pub fn start_timer(&mut self, user: &UserId, task: &TaskId) -> Result<TimerStart, DbError> {
        let now = self.now();
        self.start_timer_at(user, task, now)
    }

    pub fn start_timer_at(
        &mut self,
        user: &UserId,
        task: &TaskId,
        now: DateTime<Utc>,
    ) -> Result<TimerStart, DbError> {
        let now = stored_instant(now);
        let tx = self.write_tx()?;
        if !row_exists(&tx, "tasks", task.as_str())? {
            return Err(DbError::InvalidInput(format!("unknown task: {task}")));
        }
        let replaced = match load_timer(&tx, user)? {
            Some(previous) => Some(finish_timer(&tx, previous, now)?),
            None => None,
        };
        let timer = Timer::start(user.clone(), task.clone(), now);
        insert_timer_row(&tx, &timer)?;
        tx.commit()?;

        info!(
            user_id = %user,
            task_id = %task,
            replaced = ?replaced.as_ref().map(|entry| &entry.id),
            "started timer"
        );
        Ok(TimerStart { timer, replaced })
    }

    pub fn pause_timer(&mut self, user: &UserId) -> Result<Timer, DbError> {
        let now = self.now();
        self.pause_timer_at(user, now)
    }

    /// Pauses the user's timer. Pausing a paused timer changes nothing.
    pub fn pause_timer_at(&mut self, user: &UserId, now: DateTime<Utc>) -> Result<Timer, DbError> {
        let now = stored_instant(now);
        let tx = self.write_tx()?;
        let mut timer = load_timer(&tx, user)?.ok_or_else(|| DbError::not_found("timer", user))?;
        if !timer.pause(now) {
            debug!(user_id = %user, "timer already paused");
            return Ok(timer);
        }
        update_timer_row(&tx, &timer)?;
        tx.commit()?;
        info!(user_id = %user, "paused timer");
        Ok(timer)
    }

    pub fn resume_timer(&mut self, user: &UserId) -> Result<Timer, DbError> {
        let now = self.now();
        self.resume_timer_at(user, now)
    }

    /// Resumes the user's timer. Resuming a running timer changes nothing.
    pub fn resume_timer_at(
        &mut self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Timer, DbError> {
        let now = stored_instant(now);
        let tx = self.write_tx()?;
        let mut timer = load_timer(&tx, user)?.ok_or_else(|| DbError::not_found("timer", user))?;
        if !timer.resume(now) {
            debug!(user_id = %user, "timer already running");
            return Ok(timer);
        }
        update_timer_row(&tx, &timer)?;
        tx.commit()?;
        info!(
            user_id = %user,
            paused_minutes = timer.paused_duration,
            "resumed timer"
        );
        Ok(timer)
    }

    pub fn stop_timer(&mut self, user: &UserId) -> Result<TimeEntry, DbError> {
        let now = self.now();
        self.stop_timer_at(user, now)
    }

    /// Stops the user's timer and records the worked time as an entry.
    pub fn stop_timer_at(
        &mut self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<TimeEntry, DbError> {
        let now = stored_instant(now);
        let tx = self.write_tx()?;
        let timer = load_timer(&tx, user)?.ok_or_else(|| DbError::not_found("timer", user))?;
        let entry = finish_timer(&tx, timer, now)?;
        tx.commit()?;
        info!(
            user_id = %user,
            entry_id = %entry.id,
            duration_minutes = entry.duration_minutes,
            "stopped timer"
        );
        Ok(entry)
    }

    /// Stores `timer` as-is, without replacing an existing one.
    ///
    /// A second timer for the same user is a
    /// [`DbError::ConstraintViolation`]. Used for imports and restores; live
    /// callers go through [`Database::start_timer`].
    pub fn insert_timer(&mut self, timer: &Timer) -> Result<(), DbError> {
        let timer = Timer {
            started_at: stored_instant(timer.started_at),
            paused_at: timer.paused_at.map(stored_instant),
            ..timer.clone()
        };
        let tx = self.write_tx()?;
        insert_timer_row(&tx, &timer)?;
        tx.commit()?;
        Ok(())
    }
}

/// Turns `timer` into a closed entry and deletes its row.
fn finish_timer(conn: &Connection, timer: Timer, now: DateTime<Utc>) -> Result<TimeEntry, DbError> {
    let user_id = timer.user_id.clone();
    let task_id = timer.task_id.clone();
    let span = timer.finish(now);
    let entry = TimeEntry {
        id: parse_stored(TimeEntryId::new(new_id()), "time entry")?,
        task_id,
        user_id,
        started_at: span.started_at,
        ended_at: Some(span.ended_at),
        duration_minutes: span.duration_minutes,
        description: String::new(),
        created_at: now,
    };
    insert_entry(conn, &entry)?;
    conn.execute(
        "DELETE FROM timers WHERE user_id = ?1",
        [entry.user_id.as_str()],
    )?;
    Ok(entry)
}

fn load_timer(conn: &Connection, user: &UserId) -> Result<Option<Timer>, DbError> {
    conn.query_row(
        "
        SELECT user_id, task_id, started_at, paused_duration, paused_at
        FROM timers
        WHERE user_id = ?1
        ",
        [user.as_str()],
        TimerRow::from_row,
    )
    .optional()?
    .map(TimerRow::into_timer)
    .transpose()
}

fn insert_timer_row(conn: &Connection, timer: &Timer) -> Result<(), DbError> {
    conn.execute(
        "
        INSERT INTO timers (user_id, task_id, started_at, paused_duration, is_paused, paused_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
        params![
            timer.user_id.as_str(),
            timer.task_id.as_str(),
            format_timestamp(timer.started_at),
            timer.paused_duration,
            timer.is_paused(),
            timer.paused_at.map(format_timestamp),
        ],
    )
    .map_err(|err| {
        map_unique_violation(err, || {
            format!("user {} already has a timer", timer.user_id)
        })
    })?;
    Ok(())
}

fn update_timer_row(conn: &Connection, timer: &Timer) -> Result<(), DbError> {
    conn.execute(
        "
        UPDATE timers
        SET paused_duration = ?1, is_paused = ?2, paused_at = ?3
        WHERE user_id = ?4
        ",
        params![
            timer.paused_duration,
            timer.is_paused(),
            timer.paused_at.map(format_timestamp),
            timer.user_id.as_str(),
        ],
    )?;
    Ok(())
}

struct TimerRow {
    user_id: String,
    task_id: String,
    started_at: String,
    paused_duration: i64,
    paused_at: Option<String>,
}

impl TimerRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            task_id: row.get(1)?,
            started_at: row.get(2)?,
            paused_duration: row.get(3)?,
            paused_at: row.get(4)?,
        })
    }

    fn into_timer(self) -> Result<Timer, DbError> {
        let id = &self.user_id;
        Ok(Timer {
            user_id: parse_stored(UserId::new(id.as_str()), id)?,
            task_id: parse_stored(TaskId::new(self.task_id.as_str()), id)?,
            started_at: parse_timestamp(&self.started_at, id)?,
            paused_duration: parse_stored(u32::try_from(self.paused_duration), id)?,
            paused_at: parse_optional_timestamp(self.paused_at.as_deref(), id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use wt_core::Clock;

    use super::*;
    use crate::test_support::{Fixture, ts};
    use crate::{EntryFilter, ErrorKind, NewTask};

    fn t0() -> DateTime<Utc> {
        ts("2025-01-06T09:00:00Z")
    }

    fn minutes(n: i64) -> DateTime<Utc> {
        t0() + Duration::minutes(n)
    }

    fn entry_count(fx: &Fixture) -> usize {
        fx.db
            .list_time_entries(&fx.user, &EntryFilter::default())
            .unwrap()
            .len()
    }

    #[test]
    fn start_creates_running_timer() {
        let mut fx = Fixture::new();
        let started = fx.db.start_timer_at(&fx.user, &fx.task, t0()).unwrap();

        assert!(started.replaced.is_none());
        assert_eq!(started.timer.started_at, t0());
        assert_eq!(started.timer.paused_duration, 0);
        assert!(!started.timer.is_paused());
        assert_eq!(fx.db.active_timer(&fx.user).unwrap(), Some(started.timer));
    }

    #[test]
    fn sub_millisecond_instants_match_the_stored_timer() {
        let mut fx = Fixture::new();
        let now = t0() + Duration::microseconds(250_750);
        let started = fx.db.start_timer_at(&fx.user, &fx.task, now).unwrap();
        assert_eq!(started.timer.started_at, ts("2025-01-06T09:00:00.250Z"));
        assert_eq!(fx.db.active_timer(&fx.user).unwrap(), Some(started.timer));

        let paused = fx
            .db
            .pause_timer_at(&fx.user, minutes(1) + Duration::microseconds(249_999))
            .unwrap();
        assert_eq!(fx.db.active_timer(&fx.user).unwrap(), Some(paused));

        let entry = fx
            .db
            .stop_timer_at(&fx.user, minutes(2) + Duration::microseconds(250_999))
            .unwrap();
        assert_eq!(fx.db.time_entry(&fx.user, &entry.id).unwrap(), entry);
        assert_eq!(entry.ended_at, Some(ts("2025-01-06T09:02:00.250Z")));
    }

    #[test]
    fn start_uses_database_clock() {
        let mut fx = Fixture::new();
        let started = fx.db.start_timer(&fx.user, &fx.task).unwrap();
        assert_eq!(started.timer.started_at, fx.clock.now());
    }

    #[test]
    fn start_rejects_unknown_task() {
        let mut fx = Fixture::new();
        let err = fx
            .db
            .start_timer_at(&fx.user, &TaskId::new("missing").unwrap(), t0())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(fx.db.active_timer(&fx.user).unwrap().is_none());
    }

    #[test]
    fn pause_resume_stop_records_worked_minutes() {
        let mut fx = Fixture::new();
        fx.db.start_timer_at(&fx.user, &fx.task, t0()).unwrap();

        let paused = fx.db.pause_timer_at(&fx.user, minutes(30)).unwrap();
        assert!(paused.is_paused());
        assert_eq!(paused.paused_at, Some(minutes(30)));
        assert_eq!(fx.db.active_timer(&fx.user).unwrap(), Some(paused));

        let resumed = fx.db.resume_timer_at(&fx.user, minutes(45)).unwrap();
        assert!(!resumed.is_paused());
        assert_eq!(resumed.paused_duration, 15);

        let entry = fx.db.stop_timer_at(&fx.user, minutes(75)).unwrap();
        assert_eq!(entry.duration_minutes, 60);
        assert_eq!(entry.started_at, t0());
        assert_eq!(entry.ended_at, Some(minutes(75)));
        assert_eq!(entry.task_id, fx.task);
        assert!(entry.description.is_empty());

        assert!(fx.db.active_timer(&fx.user).unwrap().is_none());
        assert_eq!(fx.db.time_entry(&fx.user, &entry.id).unwrap(), entry);
    }

    #[test]
    fn repeated_pause_and_resume_are_no_ops() {
        let mut fx = Fixture::new();
        fx.db.start_timer_at(&fx.user, &fx.task, t0()).unwrap();

        let running = fx.db.resume_timer_at(&fx.user, minutes(5)).unwrap();
        assert_eq!(running.paused_duration, 0);

        let first = fx.db.pause_timer_at(&fx.user, minutes(10)).unwrap();
        let second = fx.db.pause_timer_at(&fx.user, minutes(20)).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.paused_at, Some(minutes(10)));
    }

    #[test]
    fn stop_while_paused_excludes_the_pause() {
        let mut fx = Fixture::new();
        fx.db.start_timer_at(&fx.user, &fx.task, t0()).unwrap();
        fx.db.pause_timer_at(&fx.user, minutes(40)).unwrap();
        let entry = fx.db.stop_timer_at(&fx.user, minutes(100)).unwrap();
        assert_eq!(entry.duration_minutes, 40);
        assert_eq!(entry.ended_at, Some(minutes(100)));
    }

    #[test]
    fn operations_without_timer_are_not_found() {
        let mut fx = Fixture::new();
        assert!(fx.db.active_timer(&fx.user).unwrap().is_none());
        assert_eq!(
            fx.db.pause_timer_at(&fx.user, t0()).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            fx.db.resume_timer_at(&fx.user, t0()).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            fx.db.stop_timer_at(&fx.user, t0()).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(entry_count(&fx), 0);
    }

    #[test]
    fn start_over_existing_timer_materializes_one_entry() {
        let mut fx = Fixture::new();
        let second_task = fx
            .db
            .create_task(NewTask::new(fx.project.clone(), "Write tests"))
            .unwrap();

        fx.db.start_timer_at(&fx.user, &fx.task, t0()).unwrap();
        fx.db.pause_timer_at(&fx.user, minutes(20)).unwrap();
        fx.db.resume_timer_at(&fx.user, minutes(25)).unwrap();

        let started = fx
            .db
            .start_timer_at(&fx.user, &second_task.id, minutes(50))
            .unwrap();
        let replaced = started.replaced.expect("previous timer recorded");
        assert_eq!(replaced.task_id, fx.task);
        assert_eq!(replaced.duration_minutes, 45);
        assert_eq!(replaced.ended_at, Some(minutes(50)));

        assert_eq!(entry_count(&fx), 1);
        let active = fx.db.active_timer(&fx.user).unwrap().unwrap();
        assert_eq!(active.task_id, second_task.id);
        assert_eq!(active.started_at, minutes(50));
    }

    #[test]
    fn timers_are_independent_per_user() {
        let mut fx = Fixture::new();
        let other = fx.add_user("other");
        fx.db.start_timer_at(&fx.user, &fx.task, t0()).unwrap();
        fx.db.start_timer_at(&other, &fx.task, minutes(5)).unwrap();

        let entry = fx.db.stop_timer_at(&other, minutes(35)).unwrap();
        assert_eq!(entry.user_id, other);
        assert_eq!(entry.duration_minutes, 30);
        assert_eq!(
            fx.db.active_timer(&fx.user).unwrap().map(|timer| timer.started_at),
            Some(t0())
        );
    }

    #[test]
    fn second_timer_row_is_a_constraint_violation() {
        let mut fx = Fixture::new();
        fx.db.start_timer_at(&fx.user, &fx.task, t0()).unwrap();

        let duplicate = Timer::start(fx.user.clone(), fx.task.clone(), minutes(1));
        let err = fx.db.insert_timer(&duplicate).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert_eq!(
            fx.db.active_timer(&fx.user).unwrap().map(|timer| timer.started_at),
            Some(t0())
        );
    }

    #[test]
    fn insert_timer_preserves_paused_state() {
        let mut fx = Fixture::new();
        let mut timer = Timer::start(fx.user.clone(), fx.task.clone(), t0());
        timer.paused_duration = 7;
        timer.pause(minutes(30));
        fx.db.insert_timer(&timer).unwrap();
        assert_eq!(fx.db.active_timer(&fx.user).unwrap(), Some(timer));
    }

    #[test]
    fn deleting_task_removes_its_timer() {
        let mut fx = Fixture::new();
        fx.db.start_timer_at(&fx.user, &fx.task, t0()).unwrap();
        fx.db.delete_task(&fx.task).unwrap();
        assert!(fx.db.active_timer(&fx.user).unwrap().is_none());
    }

    #[test]
    fn deleting_user_erases_timer_and_entries() {
        let mut fx = Fixture::new();
        fx.db.start_timer_at(&fx.user, &fx.task, t0()).unwrap();
        fx.db.stop_timer_at(&fx.user, minutes(10)).unwrap();
        fx.db.start_timer_at(&fx.user, &fx.task, minutes(20)).unwrap();

        fx.db.delete_user(&fx.user).unwrap();
        assert!(fx.db.active_timer(&fx.user).unwrap().is_none());
        assert_eq!(entry_count(&fx), 0);
    }

    #[test]
    fn concurrent_connections_keep_one_timer_per_user() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("wt.db");
        let mut fx = Fixture::open(&path);
        let mut second = Database::open(&path).unwrap();

        fx.db.start_timer_at(&fx.user, &fx.task, t0()).unwrap();
        let started = second.start_timer_at(&fx.user, &fx.task, minutes(10)).unwrap();
        assert_eq!(
            started.replaced.map(|entry| entry.duration_minutes),
            Some(10)
        );

        let duplicate = Timer::start(fx.user.clone(), fx.task.clone(), minutes(11));
        assert_eq!(
            fx.db.insert_timer(&duplicate).unwrap_err().kind(),
            ErrorKind::ConstraintViolation
        );
        assert_eq!(entry_count(&fx), 1);
        assert_eq!(
            fx.db.active_timer(&fx.user).unwrap().map(|timer| timer.started_at),
            Some(minutes(10))
        );
    }
}
