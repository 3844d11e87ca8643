//! User commands and acting-user resolution.

use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use wt_core::User;
use wt_db::{Database, NewUser};

use super::util::truncate;
use crate::Config;

#[derive(Debug, Subcommand)]
pub enum UserAction {
    /// Register a user.
    Add {
        /// Unique handle used with `--user`.
        identifier: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long, default_value = "")]
        email: String,
    },
    /// List registered users.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

pub fn run<W: Write>(writer: &mut W, db: &mut Database, action: &UserAction) -> Result<()> {
    match action {
        UserAction::Add {
            identifier,
            first_name,
            last_name,
            email,
        } => {
            let user = db
                .create_user(NewUser {
                    personal_identifier: identifier.clone(),
                    first_name: first_name.clone(),
                    last_name: last_name.clone(),
                    email: email.clone(),
                })
                .context("failed to create user")?;
            writeln!(writer, "Created user {} ({})", user.personal_identifier, user.id)?;
        }
        UserAction::List { json } => {
            let users = db.list_users()?;
            if *json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&users)?)?;
            } else {
                write_users(writer, &users)?;
            }
        }
    }
    Ok(())
}

fn write_users<W: Write>(writer: &mut W, users: &[User]) -> Result<()> {
    if users.is_empty() {
        writeln!(writer, "No users.")?;
        writeln!(writer)?;
        writeln!(writer, "Hint: Run 'wt user add <identifier>' to register one.")?;
        return Ok(());
    }
    writeln!(writer, "{:<16}  {:<24}  Email", "User", "Name")?;
    writeln!(
        writer,
        "────────────────  ────────────────────────  ──────────────────"
    )?;
    for user in users {
        let line = format!(
            "{:<16}  {:<24}  {}",
            user.personal_identifier,
            truncate(&user.full_name(), 24),
            user.email
        );
        writeln!(writer, "{}", line.trim_end())?;
    }
    Ok(())
}

/// Picks the acting user: `--user` first, then the configured default.
pub fn resolve_acting_user(
    db: &Database,
    explicit: Option<&str>,
    config: &Config,
) -> Result<User> {
    let Some(identifier) = explicit.or(config.user.as_deref()) else {
        bail!("no acting user: pass --user <identifier> or set WT_USER");
    };
    db.find_user(identifier)
        .with_context(|| format!("unknown user {identifier}"))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use insta::assert_snapshot;

    use super::*;

    fn config(user: Option<&str>) -> Config {
        Config {
            database_path: PathBuf::from(":memory:"),
            user: user.map(String::from),
        }
    }

    fn add(db: &mut Database, identifier: &str, first: &str, last: &str, email: &str) {
        let action = UserAction::Add {
            identifier: identifier.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: email.to_string(),
        };
        run(&mut Vec::new(), db, &action).unwrap();
    }

    #[test]
    fn list_users_table() {
        let mut db = Database::open_in_memory().unwrap();
        add(&mut db, "jdoe", "Jane", "Doe", "jane@example.com");
        add(&mut db, "bob", "", "", "");

        let mut output = Vec::new();
        run(&mut output, &mut db, &UserAction::List { json: false }).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        User              Name                      Email
        ────────────────  ────────────────────────  ──────────────────
        bob               bob
        jdoe              Jane Doe                  jane@example.com
        ");
    }

    #[test]
    fn list_users_empty() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        run(&mut output, &mut db, &UserAction::List { json: false }).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        No users.

        Hint: Run 'wt user add <identifier>' to register one.
        ");
    }

    #[test]
    fn add_reports_duplicate_identifier() {
        let mut db = Database::open_in_memory().unwrap();
        add(&mut db, "jdoe", "", "", "");
        let action = UserAction::Add {
            identifier: "jdoe".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
        };
        let err = run(&mut Vec::new(), &mut db, &action).unwrap_err();
        assert_eq!(err.to_string(), "failed to create user");
    }

    #[test]
    fn acting_user_prefers_flag_over_config() {
        let mut db = Database::open_in_memory().unwrap();
        add(&mut db, "jdoe", "", "", "");
        add(&mut db, "bob", "", "", "");

        let from_flag = resolve_acting_user(&db, Some("bob"), &config(Some("jdoe"))).unwrap();
        assert_eq!(from_flag.personal_identifier, "bob");

        let from_config = resolve_acting_user(&db, None, &config(Some("jdoe"))).unwrap();
        assert_eq!(from_config.personal_identifier, "jdoe");
    }

    #[test]
    fn acting_user_must_exist_and_be_given() {
        let db = Database::open_in_memory().unwrap();
        assert!(resolve_acting_user(&db, None, &config(None)).is_err());
        let err = resolve_acting_user(&db, Some("ghost"), &config(None)).unwrap_err();
        assert_eq!(err.to_string(), "unknown user ghost");
    }
}
