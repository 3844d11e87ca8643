//! Task commands.

use std::collections::HashMap;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Subcommand;
use wt_core::{Priority, ProjectId, Task, TaskId, TaskStatus};
use wt_db::{Database, NewTask, TaskFilter};

use super::util::truncate;

#[derive(Debug, Subcommand)]
pub enum TaskAction {
    /// Create a task in a project.
    Add {
        project_id: String,
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Personal identifier of the assignee.
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long, default_value_t)]
        status: TaskStatus,
        #[arg(long, default_value_t)]
        priority: Priority,
        /// Due date as YYYY-MM-DD.
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Tag to attach; repeat for several.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List tasks, most recently updated first.
    List {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
        /// Personal identifier of the assignee.
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        /// Case-insensitive text to find in title or description.
        #[arg(long)]
        search: Option<String>,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Move a task to another column (todo, doing, done).
    Move { task_id: String, status: TaskStatus },
}

pub fn run<W: Write>(writer: &mut W, db: &mut Database, action: &TaskAction) -> Result<()> {
    match action {
        TaskAction::Add {
            project_id,
            title,
            description,
            assignee,
            status,
            priority,
            due,
            tags,
        } => {
            let assignee = assignee
                .as_deref()
                .map(|identifier| db.find_user(identifier).map(|user| user.id))
                .transpose()
                .context("failed to resolve assignee")?;
            let task = db
                .create_task(NewTask {
                    project_id: ProjectId::new(project_id.as_str())?,
                    title: title.clone(),
                    description: description.clone(),
                    assignee,
                    status: *status,
                    priority: *priority,
                    due_date: *due,
                    tags: tags.clone(),
                })
                .context("failed to create task")?;
            writeln!(writer, "Created task {} ({})", task.title, task.id)?;
        }
        TaskAction::List {
            project,
            status,
            assignee,
            priority,
            search,
            json,
        } => {
            let filter = TaskFilter {
                project_id: project.as_deref().map(ProjectId::new).transpose()?,
                status: *status,
                assignee: assignee
                    .as_deref()
                    .map(|identifier| db.find_user(identifier).map(|user| user.id))
                    .transpose()
                    .context("failed to resolve assignee")?,
                priority: *priority,
                search: search.clone(),
            };
            let tasks = db.list_tasks(&filter)?;
            if *json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&tasks)?)?;
            } else {
                write_tasks(writer, db, &tasks)?;
            }
        }
        TaskAction::Move { task_id, status } => {
            let id = TaskId::new(task_id.as_str())?;
            let task = db
                .move_task(&id, *status)
                .with_context(|| format!("failed to move task {task_id}"))?;
            writeln!(writer, "Moved {} to {}", task.title, task.status)?;
        }
    }
    Ok(())
}

fn write_tasks<W: Write>(writer: &mut W, db: &Database, tasks: &[Task]) -> Result<()> {
    if tasks.is_empty() {
        writeln!(writer, "No tasks.")?;
        return Ok(());
    }
    let project_names: HashMap<ProjectId, String> = db
        .list_projects()?
        .into_iter()
        .map(|project| (project.id, project.name))
        .collect();

    for task in tasks {
        let project = project_names
            .get(&task.project_id)
            .map_or("?", String::as_str);
        let tags = if task.tags.is_empty() {
            String::new()
        } else {
            format!("[{}]", task.tags.join(", "))
        };
        let line = format!(
            "{}  {:<5}  {:<6}  {:<16}  {}  {}",
            task.id,
            task.status,
            task.priority,
            truncate(project, 16),
            task.title,
            tags
        );
        writeln!(writer, "{}", line.trim_end())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use insta::assert_snapshot;
    use wt_core::ManualClock;
    use wt_db::{NewProject, NewUser};

    use super::*;

    struct Setup {
        db: Database,
        clock: ManualClock,
        project: ProjectId,
    }

    fn setup() -> Setup {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap());
        let mut db = Database::open_in_memory().unwrap().with_clock(clock.clone());
        db.create_user(NewUser::new("jdoe")).unwrap();
        let project = db.create_project(NewProject::new("Backend")).unwrap().id;
        Setup { db, clock, project }
    }

    fn add(setup: &mut Setup, title: &str, priority: Priority, tags: &[&str]) -> TaskId {
        let action = TaskAction::Add {
            project_id: setup.project.to_string(),
            title: title.to_string(),
            description: String::new(),
            assignee: Some("jdoe".to_string()),
            status: TaskStatus::Todo,
            priority,
            due: None,
            tags: tags.iter().map(ToString::to_string).collect(),
        };
        run(&mut Vec::new(), &mut setup.db, &action).unwrap();
        setup.clock.advance(Duration::minutes(1));
        setup.db.list_tasks(&TaskFilter::default()).unwrap()[0].id.clone()
    }

    fn list(setup: &mut Setup, status: Option<TaskStatus>, search: Option<&str>) -> String {
        let action = TaskAction::List {
            project: None,
            status,
            assignee: None,
            priority: None,
            search: search.map(String::from),
            json: false,
        };
        let mut output = Vec::new();
        run(&mut output, &mut setup.db, &action).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn add_move_and_list() {
        let mut setup = setup();
        let api = add(&mut setup, "Build API", Priority::High, &["rust", "api"]);
        let docs = add(&mut setup, "Write docs", Priority::Low, &[]);

        let mut output = Vec::new();
        let action = TaskAction::Move {
            task_id: api.to_string(),
            status: TaskStatus::Doing,
        };
        run(&mut output, &mut setup.db, &action).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "Moved Build API to doing\n");

        let output = list(&mut setup, None, None)
            .replace(api.as_str(), "[API]")
            .replace(docs.as_str(), "[DOCS]");
        assert_snapshot!(output, @r"
        [API]  doing  high    Backend           Build API  [rust, api]
        [DOCS]  todo   low     Backend           Write docs
        ");
    }

    #[test]
    fn list_filters_by_status_and_search() {
        let mut setup = setup();
        add(&mut setup, "Build API", Priority::High, &[]);
        let docs = add(&mut setup, "Write docs", Priority::Low, &[]);

        let output = list(&mut setup, Some(TaskStatus::Doing), None);
        assert_eq!(output, "No tasks.\n");

        let output = list(&mut setup, None, Some("DOCS")).replace(docs.as_str(), "[DOCS]");
        assert_eq!(output, "[DOCS]  todo   low     Backend           Write docs\n");
    }

    #[test]
    fn add_with_unknown_project_fails() {
        let mut setup = setup();
        let action = TaskAction::Add {
            project_id: "missing".to_string(),
            title: "Orphan".to_string(),
            description: String::new(),
            assignee: None,
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            due: None,
            tags: Vec::new(),
        };
        let err = run(&mut Vec::new(), &mut setup.db, &action).unwrap_err();
        assert_eq!(err.to_string(), "failed to create task");
    }

    #[test]
    fn add_with_unknown_assignee_fails() {
        let mut setup = setup();
        let action = TaskAction::Add {
            project_id: setup.project.to_string(),
            title: "Orphan".to_string(),
            description: String::new(),
            assignee: Some("ghost".to_string()),
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            due: None,
            tags: Vec::new(),
        };
        let err = run(&mut Vec::new(), &mut setup.db, &action).unwrap_err();
        assert_eq!(err.to_string(), "failed to resolve assignee");
    }
}
