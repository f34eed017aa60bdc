use crate::services::products::{CreateLimits, DEFAULT_MAX_HIGHLIGHTS, DEFAULT_MAX_IMAGES};
use crate::services::slug::DEFAULT_SLUG_ATTEMPTS;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub products: ProductsConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    pub upload_dir: String,
    /// Public base address the stored keys are appended to.
    pub cdn_url: String,
    #[serde(default = "default_max_upload")]
    pub max_upload_size: String,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
}

impl MediaConfig {
    pub fn max_upload_bytes(&self) -> Result<usize> {
        parse_size(&self.max_upload_size)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_lifetime")]
    pub session_lifetime: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_lifetime: default_session_lifetime(),
        }
    }
}

impl AuthConfig {
    pub fn session_days(&self) -> Result<i64> {
        parse_days(&self.session_lifetime)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProductsConfig {
    #[serde(default = "default_max_highlights")]
    pub max_highlights: usize,
    #[serde(default = "default_max_images")]
    pub max_images: usize,
    #[serde(default = "default_slug_attempts")]
    pub slug_attempts: u32,
}

impl Default for ProductsConfig {
    fn default() -> Self {
        Self {
            max_highlights: default_max_highlights(),
            max_images: default_max_images(),
            slug_attempts: default_slug_attempts(),
        }
    }
}

impl ProductsConfig {
    pub fn limits(&self) -> CreateLimits {
        CreateLimits {
            max_highlights: self.max_highlights,
            max_images: self.max_images,
            slug_attempts: self.slug_attempts,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AiConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default = "default_ai_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key_env: default_api_key_env(),
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            max_tokens: default_ai_max_tokens(),
            timeout_secs: default_ai_timeout(),
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_language() -> String {
    "vi".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_pool_size() -> u32 {
    10
}

fn default_busy_timeout() -> u64 {
    5000
}

fn default_max_upload() -> String {
    "5MB".to_string()
}

fn default_max_files() -> usize {
    5
}

fn default_max_width() -> u32 {
    1600
}

fn default_session_lifetime() -> String {
    "7d".to_string()
}

fn default_max_highlights() -> usize {
    DEFAULT_MAX_HIGHLIGHTS
}

fn default_max_images() -> usize {
    DEFAULT_MAX_IMAGES
}

fn default_slug_attempts() -> u32 {
    DEFAULT_SLUG_ATTEMPTS
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_ai_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_ai_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_ai_max_tokens() -> u32 {
    600
}

fn default_ai_timeout() -> u64 {
    30
}

/// Parses sizes such as `5MB`, `512KB` or `1048576`.
pub fn parse_size(value: &str) -> Result<usize> {
    let value = value.trim().to_uppercase();
    let (number, multiplier) = if let Some(n) = value.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = value.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = value.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = value.strip_suffix('B') {
        (n, 1)
    } else {
        (value.as_str(), 1)
    };

    let number: usize = number
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid size '{}'", value))?;
    Ok(number * multiplier)
}

/// Parses lifetimes such as `7d` or `2w` into whole days.
pub fn parse_days(value: &str) -> Result<i64> {
    let value = value.trim().to_lowercase();
    let (number, multiplier) = if let Some(n) = value.strip_suffix('w') {
        (n, 7)
    } else if let Some(n) = value.strip_suffix('d') {
        (n, 1)
    } else {
        (value.as_str(), 1)
    };

    let days: i64 = number
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid lifetime '{}'", value))?;
    Ok(days * multiplier)
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Could not read config file '{}': {}. Did you run 'showcase init'?",
                path.display(),
                e
            )
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.products.max_highlights == 0 {
            anyhow::bail!("products.max_highlights must be greater than 0");
        }
        if self.products.max_images == 0 {
            anyhow::bail!("products.max_images must be greater than 0");
        }
        if self.products.slug_attempts == 0 {
            anyhow::bail!("products.slug_attempts must be greater than 0");
        }
        if self.media.max_files == 0 {
            anyhow::bail!("media.max_files must be greater than 0");
        }
        if self.media.max_upload_bytes()? == 0 {
            anyhow::bail!("media.max_upload_size must be greater than 0");
        }
        if self.auth.session_days()? <= 0 {
            anyhow::bail!("auth.session_lifetime must be at least one day");
        }
        if self.ai.enabled && self.ai.timeout_secs == 0 {
            anyhow::bail!("ai.timeout_secs must be greater than 0");
        }
        Ok(())
    }
}
