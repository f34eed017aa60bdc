use anyhow::Result;
use std::path::PathBuf;

pub async fn run(path: PathBuf, name: Option<String>) -> Result<()> {
    let site_name = name.unwrap_or_else(|| "Showcase".to_string());

    let config_path = path.join("showcase.toml");
    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }

    std::fs::create_dir_all(&path)?;
    std::fs::create_dir_all(path.join("data"))?;
    std::fs::create_dir_all(path.join("data/media"))?;

    let config = format!(
        r#"[site]
name = "{}"
url = "http://localhost:3000"
language = "vi"

[server]
host = "127.0.0.1"
port = 3000
request_timeout_secs = 30

[database]
path = "./data/showcase.db"

[media]
upload_dir = "./data/media"
cdn_url = "http://localhost:3000/media"
max_upload_size = "5MB"
max_files = 5
max_width = 1600

[auth]
session_lifetime = "7d"

[products]
max_highlights = 10
max_images = 5
slug_attempts = 1000

[ai]
enabled = false
api_key_env = "ANTHROPIC_API_KEY"
"#,
        site_name.replace('"', "\\\"")
    );

    std::fs::write(&config_path, config)?;

    tracing::info!("Created new showcase site at {:?}", path);
    tracing::info!("Run 'showcase user add' to create an account");
    tracing::info!("Run 'showcase serve' to start the server");

    Ok(())
}
