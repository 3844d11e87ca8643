//! Seeded databases for unit tests.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use wt_core::{ManualClock, ProjectId, TaskId, UserId};

use crate::{Database, NewProject, NewTask, NewUser};

pub fn ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .unwrap()
        .with_timezone(&Utc)
}

/// A database holding one user, one project ("Backend") and one task
/// ("Build API"), driven by a manual clock.
pub struct Fixture {
    pub db: Database,
    pub clock: ManualClock,
    pub user: UserId,
    pub project: ProjectId,
    pub task: TaskId,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_clock(default_clock())
    }

    pub fn with_clock(clock: ManualClock) -> Self {
        Self::seed(Database::open_in_memory().unwrap(), clock)
    }

    pub fn open(path: &Path) -> Self {
        Self::seed(Database::open(path).unwrap(), default_clock())
    }

    pub fn add_user(&mut self, identifier: &str) -> UserId {
        self.db.create_user(NewUser::new(identifier)).unwrap().id
    }

    fn seed(db: Database, clock: ManualClock) -> Self {
        let mut db = db.with_clock(clock.clone());
        let user = db.create_user(NewUser::new("jdoe")).unwrap().id;
        let project = db.create_project(NewProject::new("Backend")).unwrap().id;
        let task = db
            .create_task(NewTask::new(project.clone(), "Build API"))
            .unwrap()
            .id;
        Self {
            db,
            clock,
            user,
            project,
            task,
        }
    }
}

fn default_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap())
}
