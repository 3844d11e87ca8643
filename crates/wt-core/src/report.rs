//! Time report aggregation.
//!
//! A report covers an inclusive range of UTC dates and summarises every entry
//! whose `started_at` date falls inside it. The per-project, per-task and
//! per-day breakdowns are accumulated in one pass over the same slice, so the
//! three views always agree with each other and with the summary.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ProjectId, TaskId, ValidationError, parse_date};

/// Inclusive date window a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportRange {
    /// Length of the default window, today included.
    pub const DEFAULT_DAYS: i64 = 7;

    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The default window: the seven days ending on `today`.
    pub fn ending_on(today: NaiveDate) -> Self {
        Self {
            start: today - Duration::days(Self::DEFAULT_DAYS - 1),
            end: today,
        }
    }

    /// Builds a range from optional `YYYY-MM-DD` bounds.
    ///
    /// A missing bound falls back to the default window ending on `today`.
    pub fn resolve(
        start: Option<&str>,
        end: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let default = Self::ending_on(today);
        let start = match start {
            Some(value) => parse_date("start_date", value)?,
            None => default.start,
        };
        let end = match end {
            Some(value) => parse_date("end_date", value)?,
            None => default.end,
        };
        Self::new(start, end)
    }

    /// Number of days in the range, both ends counted.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Half-open UTC instants `[start 00:00, day after end 00:00)`.
    pub fn utc_bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start.and_time(NaiveTime::default()).and_utc();
        let end = (self.end + Duration::days(1)).and_time(NaiveTime::default()).and_utc();
        (start, end)
    }
}

/// One time entry as seen by the report, joined with its task and project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub task_id: TaskId,
    pub task_title: String,
    pub project_id: ProjectId,
    pub project_name: String,
    pub started_at: DateTime<Utc>,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeReport {
    pub period: ReportPeriod,
    pub summary: ReportSummary,
    pub by_project: Vec<ProjectTotal>,
    pub by_task: Vec<TaskTotal>,
    /// ISO date to minutes. Days without entries are absent.
    pub by_day: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_minutes: u64,
    /// Rounded to two decimals.
    pub total_hours: f64,
    pub total_entries: usize,
    /// Minutes per day over the whole range, rounded to one decimal.
    pub avg_per_day: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTotal {
    pub project_id: ProjectId,
    pub project_name: String,
    pub total_minutes: u64,
    pub entry_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTotal {
    pub task_id: TaskId,
    pub task_title: String,
    pub project_name: String,
    pub total_minutes: u64,
    pub entry_count: usize,
}

/// Aggregates `entries` over `range`.
///
/// Entries whose start date lies outside the range are ignored.
pub fn build_report(range: ReportRange, entries: &[ReportEntry]) -> TimeReport {
    let mut by_project: HashMap<&ProjectId, ProjectTotal> = HashMap::new();
    let mut by_task: HashMap<&TaskId, TaskTotal> = HashMap::new();
    let mut by_day: BTreeMap<String, u64> = BTreeMap::new();
    let mut total_minutes: u64 = 0;
    let mut total_entries = 0;

    for entry in entries {
        let date = entry.started_at.date_naive();
        if !range.contains(date) {
            continue;
        }
        let minutes = u64::from(entry.duration_minutes);
        total_minutes += minutes;
        total_entries += 1;

        let project = by_project
            .entry(&entry.project_id)
            .or_insert_with(|| ProjectTotal {
                project_id: entry.project_id.clone(),
                project_name: entry.project_name.clone(),
                total_minutes: 0,
                entry_count: 0,
            });
        project.total_minutes += minutes;
        project.entry_count += 1;

        let task = by_task.entry(&entry.task_id).or_insert_with(|| TaskTotal {
            task_id: entry.task_id.clone(),
            task_title: entry.task_title.clone(),
            project_name: entry.project_name.clone(),
            total_minutes: 0,
            entry_count: 0,
        });
        task.total_minutes += minutes;
        task.entry_count += 1;

        *by_day.entry(date.format("%Y-%m-%d").to_string()).or_default() += minutes;
    }

    let mut by_project: Vec<ProjectTotal> = by_project.into_values().collect();
    by_project.sort_by(|a, b| {
        b.total_minutes
            .cmp(&a.total_minutes)
            .then_with(|| a.project_name.cmp(&b.project_name))
            .then_with(|| a.project_id.cmp(&b.project_id))
    });

    let mut by_task: Vec<TaskTotal> = by_task.into_values().collect();
    by_task.sort_by(|a, b| {
        b.total_minutes
            .cmp(&a.total_minutes)
            .then_with(|| a.task_title.cmp(&b.task_title))
            .then_with(|| a.task_id.cmp(&b.task_id))
    });

    TimeReport {
        period: ReportPeriod {
            start_date: range.start,
            end_date: range.end,
        },
        summary: summarize(total_minutes, total_entries, range.days()),
        by_project,
        by_task,
        by_day,
    }
}

#[allow(clippy::cast_precision_loss)]
fn summarize(total_minutes: u64, total_entries: usize, days: i64) -> ReportSummary {
    let days = days.max(1) as f64;
    let total = total_minutes as f64;
    ReportSummary {
        total_minutes,
        total_hours: round_to(total / 60.0, 2),
        total_entries,
        avg_per_day: round_to(total / days, 1),
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}
