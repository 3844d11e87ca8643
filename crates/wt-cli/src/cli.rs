//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::entries::EntriesAction;
use crate::commands::event::EventAction;
use crate::commands::project::ProjectAction;
use crate::commands::report::ReportArgs;
use crate::commands::schedule::ScheduleAction;
use crate::commands::subtask::SubtaskAction;
use crate::commands::task::TaskAction;
use crate::commands::timer::TimerAction;
use crate::commands::user::UserAction;

/// Work tracker.
///
/// Tracks time against project tasks with a per-user start/pause/resume/stop
/// timer and summarises it in reports. Also keeps task checklists, a calendar
/// of events and a weekly schedule per user.
#[derive(Debug, Parser)]
#[command(name = "wt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Personal identifier of the acting user (overrides config `user`).
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage users.
    #[command(subcommand)]
    User(UserAction),

    /// Manage projects.
    #[command(subcommand)]
    Project(ProjectAction),

    /// Manage tasks.
    #[command(subcommand)]
    Task(TaskAction),

    /// Manage a task's checklist.
    #[command(subcommand)]
    Subtask(SubtaskAction),

    /// Control your timer.
    #[command(subcommand)]
    Timer(TimerAction),

    /// Record and inspect time entries.
    #[command(subcommand)]
    Entries(EntriesAction),

    /// Summarise tracked time.
    Report(ReportArgs),

    /// Manage your calendar events.
    #[command(subcommand)]
    Event(EventAction),

    /// Manage your weekly schedule.
    #[command(subcommand)]
    Schedule(ScheduleAction),
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_user_flag_after_subcommand() {
        let cli = Cli::parse_from(["wt", "timer", "status", "--user", "jdoe"]);
        assert_eq!(cli.user.as_deref(), Some("jdoe"));
        assert!(matches!(
            cli.command,
            Some(Commands::Timer(TimerAction::Status { json: false }))
        ));
    }

    #[test]
    fn invalid_task_status_is_rejected() {
        let err = Cli::try_parse_from(["wt", "task", "move", "task-1", "blocked"]).unwrap_err();
        assert!(err.to_string().contains("invalid task status: blocked"));
    }

    #[test]
    fn report_bounds_are_optional() {
        let cli = Cli::parse_from(["wt", "report", "--start", "2025-01-01", "--json"]);
        let Some(Commands::Report(args)) = cli.command else {
            panic!("expected report command");
        };
        assert_eq!(args.start.as_deref(), Some("2025-01-01"));
        assert_eq!(args.end, None);
        assert!(args.json);
    }

    #[test]
    fn schedule_slot_parses_day_and_times() {
        let cli = Cli::parse_from([
            "wt", "schedule", "add", "Deep work", "--day", "tue", "--start", "09:00", "--end",
            "11:30", "--type", "focus",
        ]);
        let Some(Commands::Schedule(ScheduleAction::Add {
            day,
            start,
            end,
            event_type,
            ..
        })) = cli.command
        else {
            panic!("expected schedule add");
        };
        assert_eq!(day, chrono::Weekday::Tue);
        assert_eq!(start.to_string(), "09:00:00");
        assert_eq!(end.to_string(), "11:30:00");
        assert_eq!(event_type, wt_core::EventType::Focus);
    }

    #[test]
    fn invalid_weekday_and_event_type_are_rejected() {
        let err = Cli::try_parse_from([
            "wt", "schedule", "add", "Focus", "--day", "someday", "--start", "09:00", "--end",
            "10:00",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("invalid weekday: someday"));

        let err = Cli::try_parse_from(["wt", "event", "list", "--type", "lunch"]).unwrap_err();
        assert!(err.to_string().contains("invalid event type: lunch"));
    }
}
