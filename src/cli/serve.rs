use crate::services::auth;
use crate::{web, Config, Database};
use anyhow::Result;
use std::path::Path;
use std::time::Duration;

pub async fn run(config_path: &Path, host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = Database::open(&config.database)?;

    db.migrate()?;

    let sweeper_db = db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match auth::cleanup_expired_sessions(&sweeper_db) {
                Ok(count) if count > 0 => {
                    tracing::info!("Session cleanup: {} expired session(s) removed", count)
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Session cleanup failed: {}", e),
            }
        }
    });

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server at http://{}", addr);

    web::serve(config, db, &addr).await?;

    Ok(())
}
