use crate::models::UserPlan;
use crate::{services::auth, Config, Database};
use anyhow::Result;
use std::path::Path;

use super::UserCommand;

fn prompt_new_password(label: &str) -> Result<String> {
    let password = rpassword::prompt_password(label)?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}

pub async fn run(config_path: &Path, command: UserCommand) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = Database::open(&config.database)?;
    db.migrate()?;

    match command {
        UserCommand::Add {
            username,
            email,
            name,
            plan,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_new_password("Password: ")?,
            };

            let plan: UserPlan = plan
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid plan '{}'", plan))?;
            auth::create_user(&db, &username, &email, name.as_deref(), &password, plan)?;
            tracing::info!("User '{}' created", username);
        }
        UserCommand::List => {
            let users = auth::list_users(&db)?;

            println!("{:<20} {:<30} {:<6}", "USERNAME", "EMAIL", "PLAN");
            println!("{}", "-".repeat(58));
            for user in users {
                println!("{:<20} {:<30} {:<6}", user.username, user.email, user.plan);
            }
        }
        UserCommand::Remove { username } => {
            if auth::delete_user(&db, &username)? {
                tracing::info!("User '{}' removed", username);
            } else {
                tracing::warn!("User '{}' not found", username);
            }
        }
        UserCommand::Passwd { username } => {
            let password = prompt_new_password("New password: ")?;
            auth::update_password(&db, &username, &password)?;
            tracing::info!("Password updated for '{}'", username);
        }
    }

    Ok(())
}
