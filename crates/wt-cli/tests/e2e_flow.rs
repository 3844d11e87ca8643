//! End-to-end tests driving the `wt` binary.
//!
//! Each test gets its own HOME and database file so nothing leaks between runs.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn wt_binary() -> String {
    env!("CARGO_BIN_EXE_wt").to_string()
}

fn wt_command(home: &Path) -> Command {
    let mut command = Command::new(wt_binary());
    command
        .env("HOME", home)
        .env("WT_DATABASE_PATH", home.join("wt.db"))
        .env_remove("WT_USER")
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("XDG_DATA_HOME")
        .env_remove("RUST_LOG");
    command
}

fn wt(home: &Path, args: &[&str]) -> Output {
    wt_command(home).args(args).output().expect("failed to run wt")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "wt should succeed: {}",
        stderr(output)
    );
}

/// Pulls the ID out of "Created ... (<id>)".
fn created_id(output: &Output) -> String {
    assert_success(output);
    let text = stdout(output);
    let start = text.rfind('(').expect("id opening paren") + 1;
    let end = text.rfind(')').expect("id closing paren");
    text[start..end].to_string()
}

fn seed(home: &Path) -> String {
    assert_success(&wt(home, &["user", "add", "jdoe", "--first-name", "Jane"]));
    let project = created_id(&wt(home, &["project", "add", "Backend"]));
    created_id(&wt(home, &["task", "add", &project, "Build API"]))
}

#[test]
fn timer_flow_records_an_entry() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    let task = seed(home);

    let status = wt(home, &["--user", "jdoe", "timer", "status"]);
    assert_success(&status);
    assert!(stdout(&status).starts_with("No active timer."));

    let started = wt(home, &["timer", "start", &task, "--user", "jdoe"]);
    assert_success(&started);
    assert_eq!(stdout(&started), "Started timer on Build API\n");

    let status = wt(home, &["timer", "status", "--json", "--user", "jdoe"]);
    assert_success(&status);
    let value: serde_json::Value = serde_json::from_str(&stdout(&status)).unwrap();
    assert_eq!(value["state"], "running");
    assert_eq!(value["is_paused"], false);
    assert_eq!(value["task_id"], task.as_str());

    assert_success(&wt(home, &["timer", "pause", "--user", "jdoe"]));
    let status = wt(home, &["timer", "status", "--json", "--user", "jdoe"]);
    let value: serde_json::Value = serde_json::from_str(&stdout(&status)).unwrap();
    assert_eq!(value["is_paused"], true);
    assert!(value["paused_at"].is_string());
    assert_success(&wt(home, &["timer", "resume", "--user", "jdoe"]));

    let stopped = wt(home, &["timer", "stop", "--user", "jdoe"]);
    assert_success(&stopped);
    assert!(stdout(&stopped).ends_with("on Build API\n"));

    let entries = wt(home, &["entries", "list", "--json", "--user", "jdoe"]);
    assert_success(&entries);
    let value: serde_json::Value = serde_json::from_str(&stdout(&entries)).unwrap();
    assert_eq!(value.as_array().map(Vec::len), Some(1));
    assert_eq!(value[0]["is_running"], false);
    assert_eq!(value[0]["task_title"], "Build API");

    let report = wt(home, &["report", "--json", "--user", "jdoe"]);
    assert_success(&report);
    let value: serde_json::Value = serde_json::from_str(&stdout(&report)).unwrap();
    assert_eq!(value["summary"]["total_entries"], 1);
    assert_eq!(value["by_task"][0]["task_title"], "Build API");

    let again = wt(home, &["timer", "stop", "--user", "jdoe"]);
    assert!(!again.status.success());
    assert!(stderr(&again).contains("failed to stop timer"));
}

#[test]
fn acting_user_comes_from_environment() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    let task = seed(home);

    let output = wt_command(home)
        .env("WT_USER", "jdoe")
        .args(["timer", "start", &task])
        .output()
        .unwrap();
    assert_success(&output);

    let missing = wt(home, &["timer", "status"]);
    assert!(!missing.status.success());
    assert!(stderr(&missing).contains("no acting user"));

    let unknown = wt(home, &["timer", "status", "--user", "ghost"]);
    assert!(!unknown.status.success());
    assert!(stderr(&unknown).contains("unknown user ghost"));
}

#[test]
fn config_file_sets_database_and_user() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    let db_path = home.join("custom.db");
    let config_path = home.join("wt.toml");
    std::fs::write(
        &config_path,
        format!(
            "database_path = \"{}\"\nuser = \"jdoe\"\n",
            db_path.display()
        ),
    )
    .unwrap();

    let run = |args: &[&str]| {
        wt_command(home)
            .env_remove("WT_DATABASE_PATH")
            .arg("--config")
            .arg(&config_path)
            .args(args)
            .output()
            .unwrap()
    };

    assert_success(&run(&["user", "add", "jdoe"]));
    let report = run(&["report"]);
    assert_success(&report);
    assert!(stdout(&report).contains("No time recorded in this period."));
    assert!(db_path.exists());
}

#[test]
fn manual_entries_and_report_validation() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    let task = seed(home);

    let added = wt(
        home,
        &[
            "entries",
            "add",
            &task,
            "--start",
            "2025-01-06 09:00",
            "--end",
            "2025-01-06 11:00",
            "--user",
            "jdoe",
        ],
    );
    assert_success(&added);
    assert!(stdout(&added).ends_with(": 2h 0m\n"));

    let mismatch = wt(
        home,
        &[
            "entries",
            "add",
            &task,
            "--start",
            "2025-01-06 09:00",
            "--end",
            "2025-01-06 10:00",
            "--minutes",
            "90",
            "--user",
            "jdoe",
        ],
    );
    assert!(!mismatch.status.success());

    let report = wt(
        home,
        &[
            "report",
            "--start",
            "2025-01-06",
            "--end",
            "2025-01-06",
            "--user",
            "jdoe",
        ],
    );
    assert_success(&report);
    let text = stdout(&report);
    assert!(text.starts_with("TIME REPORT: 2025-01-06 to 2025-01-06 (1 day)"));
    assert!(text.contains("Total tracked:  2h 0m (2.00h)"));
    assert!(text.contains("Daily average:  120.0m"));

    let inverted = wt(
        home,
        &[
            "report",
            "--start",
            "2025-01-07",
            "--end",
            "2025-01-06",
            "--user",
            "jdoe",
        ],
    );
    assert!(!inverted.status.success());
    assert!(stderr(&inverted).contains("is after end date"));

    let malformed = wt(home, &["report", "--start", "Jan 6", "--user", "jdoe"]);
    assert!(!malformed.status.success());
    assert!(stderr(&malformed).contains("invalid date"));
}

#[test]
fn task_move_rejects_unknown_status() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    let task = seed(home);

    let moved = wt(home, &["task", "move", &task, "doing"]);
    assert_success(&moved);
    assert_eq!(stdout(&moved), "Moved Build API to doing\n");

    let rejected = wt(home, &["task", "move", &task, "blocked"]);
    assert!(!rejected.status.success());
    assert!(stderr(&rejected).contains("invalid task status: blocked"));
}

#[test]
fn subtasks_events_and_schedule() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    let task = seed(home);

    let subtask = created_id(&wt(home, &["subtask", "add", &task, "Design schema"]));
    assert_success(&wt(home, &["subtask", "add", &task, "Write routes"]));
    assert_success(&wt(home, &["subtask", "done", &subtask]));
    let checklist = wt(home, &["subtask", "list", &task]);
    assert_success(&checklist);
    let text = stdout(&checklist);
    assert!(text.starts_with("[x] Design schema"));
    assert!(text.ends_with("1 of 2 done\n"));

    let event = created_id(&wt(
        home,
        &[
            "event",
            "add",
            "Standup",
            "--start",
            "2025-01-06 09:00",
            "--end",
            "2025-01-06 09:15",
            "--type",
            "meeting",
            "--user",
            "jdoe",
        ],
    ));
    let events = wt(
        home,
        &[
            "event", "list", "--from", "2025-01-06", "--to", "2025-01-06", "--json", "--user",
            "jdoe",
        ],
    );
    assert_success(&events);
    let value: serde_json::Value = serde_json::from_str(&stdout(&events)).unwrap();
    assert_eq!(value[0]["id"], event.as_str());
    assert_eq!(value[0]["duration_minutes"], 15);

    let backwards = wt(
        home,
        &[
            "event",
            "add",
            "Oops",
            "--start",
            "2025-01-06 10:00",
            "--end",
            "2025-01-06 09:00",
            "--user",
            "jdoe",
        ],
    );
    assert!(!backwards.status.success());
    assert!(stderr(&backwards).contains("failed to create event"));

    let slot = created_id(&wt(
        home,
        &[
            "schedule", "add", "Deep work", "--day", "mon", "--start", "09:00", "--end",
            "12:00", "--user", "jdoe",
        ],
    ));
    assert_success(&wt(home, &["schedule", "deactivate", &slot, "--user", "jdoe"]));
    let week = wt(home, &["schedule", "list", "--user", "jdoe"]);
    assert_success(&week);
    assert_eq!(stdout(&week), "No schedule slots.\n");
    let week = wt(home, &["schedule", "list", "--all", "--user", "jdoe"]);
    assert!(stdout(&week).starts_with("Mon 09:00-12:00"));

    let bad_day = wt(
        home,
        &[
            "schedule", "add", "Focus", "--day", "someday", "--start", "09:00", "--end", "10:00",
            "--user", "jdoe",
        ],
    );
    assert!(!bad_day.status.success());
    assert!(stderr(&bad_day).contains("invalid weekday"));
}
