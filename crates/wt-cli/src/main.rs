use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wt_cli::commands::{
    entries, event, project, report, schedule, subtask, task, timer, user,
};
use wt_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(wt_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = wt_db::Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr; stdout carries command output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (mut db, config) = open_database(cli.config.as_deref())?;
    let stdout = io::stdout();
    let mut writer = stdout.lock();

    match command {
        Commands::User(action) => user::run(&mut writer, &mut db, action)?,
        Commands::Project(action) => project::run(&mut writer, &mut db, action)?,
        Commands::Task(action) => task::run(&mut writer, &mut db, action)?,
        Commands::Subtask(action) => subtask::run(&mut writer, &mut db, action)?,
        Commands::Timer(action) => {
            let acting = user::resolve_acting_user(&db, cli.user.as_deref(), &config)?;
            timer::run(&mut writer, &mut db, &acting, action)?;
        }
        Commands::Entries(action) => {
            let acting = user::resolve_acting_user(&db, cli.user.as_deref(), &config)?;
            entries::run(&mut writer, &mut db, &acting, action)?;
        }
        Commands::Report(args) => {
            let acting = user::resolve_acting_user(&db, cli.user.as_deref(), &config)?;
            report::run(&mut writer, &db, &acting, args)?;
        }
        Commands::Event(action) => {
            let acting = user::resolve_acting_user(&db, cli.user.as_deref(), &config)?;
            event::run(&mut writer, &mut db, &acting, action)?;
        }
        Commands::Schedule(action) => {
            let acting = user::resolve_acting_user(&db, cli.user.as_deref(), &config)?;
            schedule::run(&mut writer, &mut db, &acting, action)?;
        }
    }

    writer.flush()?;
    Ok(())
}
