//! Users, projects, tasks and subtasks.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, info};
use wt_core::{
    Priority, Project, ProjectCategory, ProjectId, ProjectStatus, SubTask, SubTaskId, Task,
    TaskId, TaskStatus, User, UserId,
};

use crate::{
    Database, DbError, format_date, format_timestamp, map_unique_violation, new_id,
    parse_stored, parse_stored_date, parse_timestamp,
};

const USER_COLUMNS: &str = "id, personal_identifier, first_name, last_name, email, created_at";

const PROJECT_COLUMNS: &str =
    "id, name, description, client, deadline, status, category, created_at, updated_at";

const TASK_COLUMNS: &str = "id, project_id, title, description, assignee_id, status, priority, \
                            due_date, tags, created_at, updated_at";

const SUBTASK_COLUMNS: &str = "id, task_id, title, is_done, created_at";

/// Input for [`Database::create_user`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub personal_identifier: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl NewUser {
    pub fn new(personal_identifier: impl Into<String>) -> Self {
        Self {
            personal_identifier: personal_identifier.into(),
            ..Self::default()
        }
    }
}

/// Input for [`Database::create_project`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub client: String,
    pub deadline: Option<NaiveDate>,
    pub status: ProjectStatus,
    pub category: ProjectCategory,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Input for [`Database::create_task`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub project_id: ProjectId,
    pub title: String,
    pub description: String,
    pub assignee: Option<UserId>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub tags: Vec<String>,
}

impl NewTask {
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            description: String::new(),
            assignee: None,
            status: TaskStatus::default(),
            priority: Priority::default(),
            due_date: None,
            tags: Vec::new(),
        }
    }
}

/// Optional narrowing for [`Database::list_tasks`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub project_id: Option<ProjectId>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<UserId>,
    pub priority: Option<Priority>,
    /// Case-insensitive substring of the title or description.
    pub search: Option<String>,
}

impl Database {
    /// Registers a user. The personal identifier must be unique.
    pub fn create_user(&mut self, input: NewUser) -> Result<User, DbError> {
        let identifier = input.personal_identifier.trim().to_string();
        if identifier.is_empty() {
            return Err(DbError::InvalidInput(
                "personal identifier cannot be empty".to_string(),
            ));
        }
        let user = User {
            id: parse_stored(UserId::new(new_id()), "user")?,
            personal_identifier: identifier,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            email: input.email.trim().to_string(),
            created_at: self.now(),
        };

        let tx = self.write_tx()?;
        tx.execute(
            "
            INSERT INTO users (id, personal_identifier, first_name, last_name, email, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                user.id.as_str(),
                user.personal_identifier,
                user.first_name,
                user.last_name,
                user.email,
                format_timestamp(user.created_at),
            ],
        )
        .map_err(|err| {
            map_unique_violation(err, || {
                format!("user {} already exists", user.personal_identifier)
            })
        })?;
        tx.commit()?;

        info!(user_id = %user.id, identifier = %user.personal_identifier, "created user");
        Ok(user)
    }

    /// Looks a user up by personal identifier.
    pub fn find_user(&self, personal_identifier: &str) -> Result<User, DbError> {
        let identifier = personal_identifier.trim();
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE personal_identifier = ?1"),
                [identifier],
                UserRow::from_row,
            )
            .optional()?
            .ok_or_else(|| DbError::not_found("user", identifier))?
            .into_user()
    }

    pub fn user(&self, id: &UserId) -> Result<User, DbError> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id.as_str()],
                UserRow::from_row,
            )
            .optional()?
            .ok_or_else(|| DbError::not_found("user", id))?
            .into_user()
    }

    /// Lists users ordered by personal identifier.
    pub fn list_users(&self) -> Result<Vec<User>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY personal_identifier ASC"
        ))?;
        let rows = stmt.query_map([], UserRow::from_row)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?.into_user()?);
        }
        Ok(users)
    }

    /// Deletes a user together with their time entries and timer.
    pub fn delete_user(&mut self, id: &UserId) -> Result<(), DbError> {
        let tx = self.write_tx()?;
        let deleted = tx.execute("DELETE FROM users WHERE id = ?1", [id.as_str()])?;
        if deleted == 0 {
            return Err(DbError::not_found("user", id));
        }
        tx.commit()?;
        info!(user_id = %id, "deleted user");
        Ok(())
    }

    pub fn create_project(&mut self, input: NewProject) -> Result<Project, DbError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(DbError::InvalidInput("project name cannot be empty".to_string()));
        }
        let now = self.now();
        let project = Project {
            id: parse_stored(ProjectId::new(new_id()), "project")?,
            name,
            description: input.description,
            client: input.client,
            deadline: input.deadline,
            status: input.status,
            category: input.category,
            created_at: now,
            updated_at: now,
        };

        let tx = self.write_tx()?;
        tx.execute(
            "
            INSERT INTO projects
                (id, name, description, client, deadline, status, category, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
            params![
                project.id.as_str(),
                project.name,
                project.description,
                project.client,
                project.deadline.map(format_date),
                project.status.as_str(),
                project.category.as_str(),
                format_timestamp(project.created_at),
                format_timestamp(project.updated_at),
            ],
        )?;
        tx.commit()?;

        info!(project_id = %project.id, name = %project.name, "created project");
        Ok(project)
    }

    pub fn project(&self, id: &ProjectId) -> Result<Project, DbError> {
        self.conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
                [id.as_str()],
                ProjectRow::from_row,
            )
            .optional()?
            .ok_or_else(|| DbError::not_found("project", id))?
            .into_project()
    }

    /// Lists projects, newest first.
    pub fn list_projects(&self) -> Result<Vec<Project>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map([], ProjectRow::from_row)?;
        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?.into_project()?);
        }
        Ok(projects)
    }

    pub fn update_project_status(
        &mut self,
        id: &ProjectId,
        status: ProjectStatus,
    ) -> Result<Project, DbError> {
        let now = format_timestamp(self.now());
        let tx = self.write_tx()?;
        let updated = tx.execute(
            "UPDATE projects SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now, id.as_str()],
        )?;
        if updated == 0 {
            return Err(DbError::not_found("project", id));
        }
        tx.commit()?;
        info!(project_id = %id, %status, "updated project status");
        self.project(id)
    }

    /// Deletes a project and, through the schema, its tasks and their entries.
    pub fn delete_project(&mut self, id: &ProjectId) -> Result<(), DbError> {
        let tx = self.write_tx()?;
        let deleted = tx.execute("DELETE FROM projects WHERE id = ?1", [id.as_str()])?;
        if deleted == 0 {
            return Err(DbError::not_found("project", id));
        }
        tx.commit()?;
        info!(project_id = %id, "deleted project");
        Ok(())
    }

    /// Creates a task in an existing project.
    pub fn create_task(&mut self, input: NewTask) -> Result<Task, DbError> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(DbError::InvalidInput("task title cannot be empty".to_string()));
        }
        let tags: Vec<String> = input
            .tags
            .iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        let now = self.now();
        let task = Task {
            id: parse_stored(TaskId::new(new_id()), "task")?,
            project_id: input.project_id,
            title,
            description: input.description,
            assignee: input.assignee,
            status: input.status,
            priority: input.priority,
            due_date: input.due_date,
            tags,
            created_at: now,
            updated_at: now,
        };

        let tx = self.write_tx()?;
        if !row_exists(&tx, "projects", task.project_id.as_str())? {
            return Err(DbError::InvalidInput(format!(
                "unknown project: {}",
                task.project_id
            )));
        }
        if let Some(assignee) = &task.assignee {
            if !row_exists(&tx, "users", assignee.as_str())? {
                return Err(DbError::InvalidInput(format!("unknown assignee: {assignee}")));
            }
        }
        tx.execute(
            "
            INSERT INTO tasks
                (id, project_id, title, description, assignee_id, status, priority,
                 due_date, tags, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
            params![
                task.id.as_str(),
                task.project_id.as_str(),
                task.title,
                task.description,
                task.assignee.as_ref().map(UserId::as_str),
                task.status.as_str(),
                task.priority.as_str(),
                task.due_date.map(format_date),
                serde_json::to_string(&task.tags)?,
                format_timestamp(task.created_at),
                format_timestamp(task.updated_at),
            ],
        )?;
        tx.commit()?;

        info!(task_id = %task.id, project_id = %task.project_id, "created task");
        Ok(task)
    }

    pub fn task(&self, id: &TaskId) -> Result<Task, DbError> {
        self.conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                [id.as_str()],
                TaskRow::from_row,
            )
            .optional()?
            .ok_or_else(|| DbError::not_found("task", id))?
            .into_task()
    }

    /// Lists tasks matching `filter`, most recently updated first.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, DbError> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if let Some(project_id) = &filter.project_id {
            clauses.push("project_id = ?");
            values.push(project_id.to_string());
        }
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            values.push(status.as_str().to_string());
        }
        if let Some(assignee) = &filter.assignee {
            clauses.push("assignee_id = ?");
            values.push(assignee.to_string());
        }
        if let Some(priority) = filter.priority {
            clauses.push("priority = ?");
            values.push(priority.as_str().to_string());
        }
        if let Some(search) = filter.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                let pattern = format!("%{}%", escape_like(search));
                clauses.push(
                    "(lower(title) LIKE lower(?) ESCAPE '\\' \
                     OR lower(description) LIKE lower(?) ESCAPE '\\')",
                );
                values.push(pattern.clone());
                values.push(pattern);
            }
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks {where_clause} ORDER BY updated_at DESC, id DESC"
        );
        debug!(%sql, "listing tasks");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), TaskRow::from_row)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.into_task()?);
        }
        Ok(tasks)
    }

    /// Moves a task to another kanban column.
    pub fn move_task(&mut self, id: &TaskId, status: TaskStatus) -> Result<Task, DbError> {
        let now = format_timestamp(self.now());
        let tx = self.write_tx()?;
        let updated = tx.execute(
            "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now, id.as_str()],
        )?;
        if updated == 0 {
            return Err(DbError::not_found("task", id));
        }
        tx.commit()?;
        info!(task_id = %id, %status, "moved task");
        self.task(id)
    }

    /// Deletes a task together with its time entries and any timer on it.
    pub fn delete_task(&mut self, id: &TaskId) -> Result<(), DbError> {
        let tx = self.write_tx()?;
        let deleted = tx.execute("DELETE FROM tasks WHERE id = ?1", [id.as_str()])?;
        if deleted == 0 {
            return Err(DbError::not_found("task", id));
        }
        tx.commit()?;
        info!(task_id = %id, "deleted task");
        Ok(())
    }

    /// Adds an open checklist item to an existing task.
    pub fn create_subtask(&mut self, task: &TaskId, title: &str) -> Result<SubTask, DbError> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(DbError::InvalidInput("subtask title cannot be empty".to_string()));
        }
        let subtask = SubTask {
            id: parse_stored(SubTaskId::new(new_id()), "subtask")?,
            task_id: task.clone(),
            title,
            is_done: false,
            created_at: self.now(),
        };

        let tx = self.write_tx()?;
        if !row_exists(&tx, "tasks", task.as_str())? {
            return Err(DbError::InvalidInput(format!("unknown task: {task}")));
        }
        tx.execute(
            "INSERT INTO subtasks (id, task_id, title, is_done, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                subtask.id.as_str(),
                subtask.task_id.as_str(),
                subtask.title,
                subtask.is_done,
                format_timestamp(subtask.created_at),
            ],
        )?;
        tx.commit()?;

        info!(subtask_id = %subtask.id, task_id = %task, "created subtask");
        Ok(subtask)
    }

    pub fn subtask(&self, id: &SubTaskId) -> Result<SubTask, DbError> {
        self.conn
            .query_row(
                &format!("SELECT {SUBTASK_COLUMNS} FROM subtasks WHERE id = ?1"),
                [id.as_str()],
                SubTaskRow::from_row,
            )
            .optional()?
            .ok_or_else(|| DbError::not_found("subtask", id))?
            .into_subtask()
    }

    /// Lists a task's checklist in the order items were added.
    pub fn list_subtasks(&self, task: &TaskId) -> Result<Vec<SubTask>, DbError> {
        if !row_exists(&self.conn, "tasks", task.as_str())? {
            return Err(DbError::not_found("task", task));
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SUBTASK_COLUMNS} FROM subtasks WHERE task_id = ?1 \
             ORDER BY created_at, rowid"
        ))?;
        let rows = stmt.query_map([task.as_str()], SubTaskRow::from_row)?;
        let mut subtasks = Vec::new();
        for row in rows {
            subtasks.push(row?.into_subtask()?);
        }
        Ok(subtasks)
    }

    /// Ticks or unticks a checklist item.
    pub fn set_subtask_done(&mut self, id: &SubTaskId, done: bool) -> Result<SubTask, DbError> {
        let tx = self.write_tx()?;
        let updated = tx.execute(
            "UPDATE subtasks SET is_done = ?1 WHERE id = ?2",
            params![done, id.as_str()],
        )?;
        if updated == 0 {
            return Err(DbError::not_found("subtask", id));
        }
        tx.commit()?;
        info!(subtask_id = %id, done, "updated subtask");
        self.subtask(id)
    }

    pub fn delete_subtask(&mut self, id: &SubTaskId) -> Result<(), DbError> {
        let tx = self.write_tx()?;
        let deleted = tx.execute("DELETE FROM subtasks WHERE id = ?1", [id.as_str()])?;
        if deleted == 0 {
            return Err(DbError::not_found("subtask", id));
        }
        tx.commit()?;
        info!(subtask_id = %id, "deleted subtask");
        Ok(())
    }
}

/// Whether `table` has a row with primary key `id`.
///
/// `table` is always a literal from this crate, never caller input.
pub(crate) fn row_exists(conn: &Connection, table: &str, id: &str) -> Result<bool, DbError> {
    Ok(conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)"),
        [id],
        |row| row.get(0),
    )?)
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

struct UserRow {
    id: String,
    personal_identifier: String,
    first_name: String,
    last_name: String,
    email: String,
    created_at: String,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            personal_identifier: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            email: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_user(self) -> Result<User, DbError> {
        Ok(User {
            id: parse_stored(UserId::new(self.id.as_str()), &self.id)?,
            created_at: parse_timestamp(&self.created_at, &self.id)?,
            personal_identifier: self.personal_identifier,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
        })
    }
}

struct ProjectRow {
    id: String,
    name: String,
    description: String,
    client: String,
    deadline: Option<String>,
    status: String,
    category: String,
    created_at: String,
    updated_at: String,
}

impl ProjectRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            client: row.get(3)?,
            deadline: row.get(4)?,
            status: row.get(5)?,
            category: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_project(self) -> Result<Project, DbError> {
        let id = &self.id;
        Ok(Project {
            id: parse_stored(ProjectId::new(id.as_str()), id)?,
            deadline: parse_stored_date(self.deadline.as_deref(), id)?,
            status: parse_stored(self.status.parse(), id)?,
            category: parse_stored(self.category.parse(), id)?,
            created_at: parse_timestamp(&self.created_at, id)?,
            updated_at: parse_timestamp(&self.updated_at, id)?,
            name: self.name,
            description: self.description,
            client: self.client,
        })
    }
}

struct TaskRow {
    id: String,
    project_id: String,
    title: String,
    description: String,
    assignee_id: Option<String>,
    status: String,
    priority: String,
    due_date: Option<String>,
    tags: String,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            assignee_id: row.get(4)?,
            status: row.get(5)?,
            priority: row.get(6)?,
            due_date: row.get(7)?,
            tags: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_task(self) -> Result<Task, DbError> {
        let id = &self.id;
        Ok(Task {
            id: parse_stored(TaskId::new(id.as_str()), id)?,
            project_id: parse_stored(ProjectId::new(self.project_id.as_str()), id)?,
            assignee: self
                .assignee_id
                .as_deref()
                .map(|assignee| parse_stored(UserId::new(assignee), id))
                .transpose()?,
            status: parse_stored(self.status.parse(), id)?,
            priority: parse_stored(self.priority.parse(), id)?,
            due_date: parse_stored_date(self.due_date.as_deref(), id)?,
            tags: serde_json::from_str(&self.tags)?,
            created_at: parse_timestamp(&self.created_at, id)?,
            updated_at: parse_timestamp(&self.updated_at, id)?,
            title: self.title,
            description: self.description,
        })
    }
}

struct SubTaskRow {
    id: String,
    task_id: String,
    title: String,
    is_done: bool,
    created_at: String,
}

impl SubTaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            task_id: row.get(1)?,
            title: row.get(2)?,
            is_done: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_subtask(self) -> Result<SubTask, DbError> {
        let id = &self.id;
        Ok(SubTask {
            id: parse_stored(SubTaskId::new(id.as_str()), id)?,
            task_id: parse_stored(TaskId::new(self.task_id.as_str()), id)?,
            created_at: parse_timestamp(&self.created_at, id)?,
            title: self.title,
            is_done: self.is_done,
        })
    }
}
