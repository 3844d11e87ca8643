//! CLI subcommand implementations.

pub mod entries;
pub mod event;
pub mod project;
pub mod report;
pub mod schedule;
pub mod subtask;
pub mod task;
pub mod timer;
pub mod user;
pub mod util;
