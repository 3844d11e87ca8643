//! The per-user work timer.
//!
//! A timer is either running or paused; stopping it ends its life and yields
//! a [`CompletedSpan`] that storage turns into a time entry.
//!
//! Elapsed time is computed lazily from the clock. Paused time is committed
//! eagerly: each resume folds the whole minutes spent paused into
//! `paused_duration`, so any number of pause/resume cycles loses at most the
//! sub-minute remainder of each pause.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time_entry::{clamp_minutes, whole_minutes};
use crate::types::{TaskId, UserId};

/// Observable state of a live timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Running,
    Paused,
}

/// A live timing session. At most one exists per user.
///
/// `paused_at` is the single source of truth for the paused state, which
/// keeps `is_paused() == paused_at.is_some()` true by construction. The
/// serialized form also carries `is_paused`; it is ignored when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "TimerRecord")]
pub struct Timer {
    pub user_id: UserId,
    pub task_id: TaskId,
    pub started_at: DateTime<Utc>,
    /// Accumulated paused time in whole minutes.
    pub paused_duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct TimerRecord {
    user_id: UserId,
    task_id: TaskId,
    started_at: DateTime<Utc>,
    paused_duration: u32,
    is_paused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    paused_at: Option<DateTime<Utc>>,
}

impl From<Timer> for TimerRecord {
    fn from(timer: Timer) -> Self {
        Self {
            is_paused: timer.is_paused(),
            user_id: timer.user_id,
            task_id: timer.task_id,
            started_at: timer.started_at,
            paused_duration: timer.paused_duration,
            paused_at: timer.paused_at,
        }
    }
}

/// What is left of a timer after it stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedSpan {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_minutes: u32,
}

impl Timer {
    /// Starts a running timer at `now`.
    pub const fn start(user_id: UserId, task_id: TaskId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            task_id,
            started_at: now,
            paused_duration: 0,
            paused_at: None,
        }
    }

    pub const fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub const fn state(&self) -> TimerState {
        if self.is_paused() {
            TimerState::Paused
        } else {
            TimerState::Running
        }
    }

    /// Pauses a running timer. Returns `false` if it was already paused.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_paused() {
            return false;
        }
        self.paused_at = Some(now);
        true
    }

    /// Resumes a paused timer, committing the paused minutes.
    ///
    /// Returns `false` if it was already running.
    pub fn resume(&mut self, now: DateTime<Utc>) -> bool {
        let Some(paused_at) = self.paused_at.take() else {
            return false;
        };
        self.paused_duration = self
            .paused_duration
            .saturating_add(whole_minutes(paused_at, now));
        true
    }

    /// Worked minutes so far, excluding paused time.
    ///
    /// While paused the span is frozen at `paused_at`, so the value does not
    /// move until the timer resumes. Never negative.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> u32 {
        let span_end = self.paused_at.unwrap_or(now);
        let span_seconds = span_end.signed_duration_since(self.started_at).num_seconds();
        let worked_seconds = span_seconds - i64::from(self.paused_duration) * 60;
        clamp_minutes(worked_seconds.div_euclid(60))
    }

    /// Stops the timer, resuming first if it is paused.
    pub fn finish(mut self, now: DateTime<Utc>) -> CompletedSpan {
        self.resume(now);
        CompletedSpan {
            started_at: self.started_at,
            ended_at: now,
            duration_minutes: self.elapsed_minutes(now),
        }
    }
}
