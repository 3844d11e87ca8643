//! Project commands.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Subcommand;
use wt_core::{Project, ProjectCategory, ProjectId, ProjectStatus};
use wt_db::{Database, NewProject};

use super::util::truncate;

#[derive(Debug, Subcommand)]
pub enum ProjectAction {
    /// Create a project.
    Add {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        client: String,
        /// Deadline as YYYY-MM-DD.
        #[arg(long)]
        deadline: Option<NaiveDate>,
        #[arg(long, default_value_t)]
        status: ProjectStatus,
        #[arg(long, default_value_t)]
        category: ProjectCategory,
    },
    /// List projects, newest first.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Change a project's status.
    Status {
        project_id: String,
        /// One of: planned, active, paused, done.
        status: ProjectStatus,
    },
}

pub fn run<W: Write>(writer: &mut W, db: &mut Database, action: &ProjectAction) -> Result<()> {
    match action {
        ProjectAction::Add {
            name,
            description,
            client,
            deadline,
            status,
            category,
        } => {
            let project = db
                .create_project(NewProject {
                    name: name.clone(),
                    description: description.clone(),
                    client: client.clone(),
                    deadline: *deadline,
                    status: *status,
                    category: *category,
                })
                .context("failed to create project")?;
            writeln!(writer, "Created project {} ({})", project.name, project.id)?;
        }
        ProjectAction::List { json } => {
            let projects = db.list_projects()?;
            if *json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&projects)?)?;
            } else {
                write_projects(writer, &projects)?;
            }
        }
        ProjectAction::Status { project_id, status } => {
            let id = ProjectId::new(project_id.as_str())?;
            let project = db
                .update_project_status(&id, *status)
                .with_context(|| format!("failed to update project {project_id}"))?;
            writeln!(writer, "Project {} is now {}", project.name, project.status)?;
        }
    }
    Ok(())
}

fn write_projects<W: Write>(writer: &mut W, projects: &[Project]) -> Result<()> {
    if projects.is_empty() {
        writeln!(writer, "No projects.")?;
        writeln!(writer)?;
        writeln!(writer, "Hint: Run 'wt project add <name>' to create one.")?;
        return Ok(());
    }
    for project in projects {
        let deadline = project
            .deadline
            .map(|date| format!("due {date}"))
            .unwrap_or_default();
        let line = format!(
            "{}  {:<24}  {:<7}  {:<11}  {:<16}  {}",
            project.id,
            truncate(&project.name, 24),
            project.status,
            project.category,
            truncate(&project.client, 16),
            deadline
        );
        writeln!(writer, "{}", line.trim_end())?;
    }
    Ok(())
}
