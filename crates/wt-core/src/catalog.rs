//! Users, projects, tasks and their subtasks.
//!
//! These are the records time is tracked against. Status, priority and
//! category values are closed vocabularies; anything outside them is rejected
//! at parse time with [`ValidationError::InvalidChoice`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ProjectId, SubTaskId, TaskId, UserId, ValidationError};

/// Generates a closed string vocabulary with storage/display conversions.
macro_rules! define_choice {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal, default = $default:ident,
        { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every allowed value, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// String representation for database storage.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ValidationError::InvalidChoice {
                        field: $field_name,
                        value: s.to_string(),
                        allowed: Self::ALL
                            .iter()
                            .map(Self::as_str)
                            .collect::<Vec<_>>()
                            .join(", "),
                    }),
                }
            }
        }
    };
}

pub(crate) use define_choice;

define_choice!(
    /// Lifecycle state of a project.
    ProjectStatus, "project status", default = Active,
    {
        Planned => "planned",
        Active => "active",
        Paused => "paused",
        Done => "done",
    }
);

define_choice!(
    /// Kind of work a project represents.
    ProjectCategory, "project category", default = Dev,
    {
        Dev => "dev",
        Design => "design",
        Integration => "integration",
        Maintenance => "maintenance",
    }
);

define_choice!(
    /// Kanban column of a task.
    TaskStatus, "task status", default = Todo,
    {
        Todo => "todo",
        Doing => "doing",
        Done => "done",
    }
);

define_choice!(
    /// Task urgency.
    Priority, "priority", default = Medium,
    {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
);

/// A person who owns timers and time entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Unique login-style handle used to resolve the acting user.
    pub personal_identifier: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// "First Last", or the personal identifier when both names are blank.
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.personal_identifier.clone()
        } else {
            name.to_string()
        }
    }
}

/// A client engagement or internal initiative grouping tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub client: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    pub status: ProjectStatus,
    pub category: ProjectCategory,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A unit of work inside a project. Time is always tracked against a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<UserId>,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A checklist item under a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: SubTaskId,
    pub task_id: TaskId,
    pub title: String,
    pub is_done: bool,
    pub created_at: DateTime<Utc>,
}
