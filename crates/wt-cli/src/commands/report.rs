//! Report command for summarising tracked time over a date range.
//!
//! This module implements `wt report`, which shows the acting user's time per
//! project, per task and per day. The default range is the seven days ending
//! today (UTC).

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use wt_core::{TimeReport, User};
use wt_db::Database;

use super::util::{format_minutes, plural, progress_bar, truncate};

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// First day to include (YYYY-MM-DD). Defaults to six days before --end.
    #[arg(long)]
    pub start: Option<String>,
    /// Last day to include (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub end: Option<String>,
    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &User,
    args: &ReportArgs,
) -> Result<()> {
    let report = db
        .report(&user.id, args.start.as_deref(), args.end.as_deref())
        .context("failed to build report")?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write!(writer, "{}", format_report(&report))?;
    }
    Ok(())
}

/// Formats the human-readable report output.
pub fn format_report(report: &TimeReport) -> String {
    let mut output = String::new();
    let days = (report.period.end_date - report.period.start_date).num_days() + 1;
    let days = usize::try_from(days).unwrap_or_default();

    writeln!(
        output,
        "TIME REPORT: {} to {} ({})",
        report.period.start_date,
        report.period.end_date,
        plural(days, "day", "days")
    )
    .unwrap();

    if report.summary.total_entries == 0 {
        writeln!(output).unwrap();
        writeln!(output, "No time recorded in this period.").unwrap();
        writeln!(output).unwrap();
        writeln!(output, "Hint: Run 'wt timer start <task>' to start tracking.").unwrap();
        return output;
    }

    let max_project = report
        .by_project
        .iter()
        .map(|project| project.total_minutes)
        .max()
        .unwrap_or(0);

    writeln!(output).unwrap();
    writeln!(output, "BY PROJECT").unwrap();
    writeln!(output, "──────────").unwrap();
    for project in &report.by_project {
        writeln!(
            output,
            "{:<24}  {:>7}  {}  {}",
            truncate(&project.project_name, 24),
            format_minutes(project.total_minutes),
            progress_bar(project.total_minutes, max_project),
            plural(project.entry_count, "entry", "entries")
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "BY TASK").unwrap();
    writeln!(output, "───────").unwrap();
    for task in &report.by_task {
        let label = format!("{} ({})", task.task_title, task.project_name);
        writeln!(
            output,
            "{:<36}  {:>7}  {}",
            truncate(&label, 36),
            format_minutes(task.total_minutes),
            plural(task.entry_count, "entry", "entries")
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "BY DAY").unwrap();
    writeln!(output, "──────").unwrap();
    for (day, minutes) in &report.by_day {
        writeln!(output, "{day}  {:>7}", format_minutes(*minutes)).unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "SUMMARY").unwrap();
    writeln!(output, "───────").unwrap();
    writeln!(
        output,
        "Total tracked:  {} ({:.2}h)",
        format_minutes(report.summary.total_minutes),
        report.summary.total_hours
    )
    .unwrap();
    writeln!(output, "Entries:        {}", report.summary.total_entries).unwrap();
    writeln!(
        output,
        "Daily average:  {:.1}m",
        report.summary.avg_per_day
    )
    .unwrap();

    output
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use insta::assert_snapshot;
    use wt_core::{ManualClock, NewTimeEntry, TaskId};
    use wt_db::{NewProject, NewTask, NewUser};

    use super::*;

    struct Setup {
        db: Database,
        user: User,
        api: TaskId,
        docs: TaskId,
        pages: TaskId,
    }

    fn setup() -> Setup {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 8, 18, 0, 0).unwrap());
        let mut db = Database::open_in_memory().unwrap().with_clock(clock);
        let user = db.create_user(NewUser::new("jdoe")).unwrap();
        let backend = db.create_project(NewProject::new("Backend")).unwrap().id;
        let frontend = db.create_project(NewProject::new("Frontend")).unwrap().id;
        let api = db
            .create_task(NewTask::new(backend.clone(), "Build API"))
            .unwrap()
            .id;
        let docs = db.create_task(NewTask::new(backend, "Write docs")).unwrap().id;
        let pages = db
            .create_task(NewTask::new(frontend, "Style pages"))
            .unwrap()
            .id;
        Setup {
            db,
            user,
            api,
            docs,
            pages,
        }
    }

    fn record(setup: &mut Setup, task: &TaskId, start: DateTime<Utc>, minutes: i64) {
        let input = NewTimeEntry::new(task.clone(), start).ended_at(start + Duration::minutes(minutes));
        setup.db.create_time_entry(&setup.user.id, input).unwrap();
    }

    fn report_text(setup: &Setup, start: Option<&str>, end: Option<&str>) -> String {
        let args = ReportArgs {
            start: start.map(String::from),
            end: end.map(String::from),
            json: false,
        };
        let mut output = Vec::new();
        run(&mut output, &setup.db, &setup.user, &args).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn report_empty_period() {
        let setup = setup();
        assert_snapshot!(report_text(&setup, None, None), @r"
        TIME REPORT: 2025-01-02 to 2025-01-08 (7 days)

        No time recorded in this period.

        Hint: Run 'wt timer start <task>' to start tracking.
        ");
    }

    #[test]
    fn report_breakdowns() {
        let mut setup = setup();
        let (api, docs, pages) = (setup.api.clone(), setup.docs.clone(), setup.pages.clone());
        let monday = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
        let tuesday = Utc.with_ymd_and_hms(2025, 1, 7, 9, 0, 0).unwrap();
        record(&mut setup, &api, monday, 120);
        record(&mut setup, &docs, monday + Duration::hours(5), 45);
        record(&mut setup, &pages, tuesday, 30);
        record(&mut setup, &api, tuesday + Duration::hours(2), 15);

        assert_snapshot!(report_text(&setup, None, None), @r"
        TIME REPORT: 2025-01-02 to 2025-01-08 (7 days)

        BY PROJECT
        ──────────
        Backend                     3h 0m  ██████████  3 entries
        Frontend                      30m  ██░░░░░░░░  1 entry

        BY TASK
        ───────
        Build API (Backend)                    2h 15m  2 entries
        Write docs (Backend)                      45m  1 entry
        Style pages (Frontend)                    30m  1 entry

        BY DAY
        ──────
        2025-01-06   2h 45m
        2025-01-07      45m

        SUMMARY
        ───────
        Total tracked:  3h 30m (3.50h)
        Entries:        4
        Daily average:  30.0m
        ");
    }

    #[test]
    fn report_single_day_average_equals_total() {
        let mut setup = setup();
        let api = setup.api.clone();
        record(&mut setup, &api, Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap(), 120);
        record(&mut setup, &api, Utc.with_ymd_and_hms(2025, 1, 6, 14, 0, 0).unwrap(), 45);

        let args = ReportArgs {
            start: Some("2025-01-06".to_string()),
            end: Some("2025-01-06".to_string()),
            json: true,
        };
        let mut output = Vec::new();
        run(&mut output, &setup.db, &setup.user, &args).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["period"]["start_date"], "2025-01-06");
        assert_eq!(value["summary"]["total_minutes"], 165);
        assert_eq!(value["summary"]["total_hours"], 2.75);
        assert_eq!(value["summary"]["avg_per_day"], 165.0);
        assert_eq!(value["by_day"]["2025-01-06"], 165);
    }

    #[test]
    fn report_rejects_inverted_range() {
        let setup = setup();
        let args = ReportArgs {
            start: Some("2025-01-08".to_string()),
            end: Some("2025-01-01".to_string()),
            json: false,
        };
        let err = run(&mut Vec::new(), &setup.db, &setup.user, &args).unwrap_err();
        assert_eq!(err.to_string(), "failed to build report");
        assert!(format!("{err:#}").contains("start date 2025-01-08 is after end date 2025-01-01"));
    }
}
