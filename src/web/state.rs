use crate::services::description::DescriptionGenerator;
use crate::services::media::{ObjectStore, UploadPolicy};
use crate::services::products::CreateLimits;
use crate::web::security::RateLimiter;
use crate::{Config, Database};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tera::{Tera, Value};

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub templates: Tera,
    pub objects: Arc<dyn ObjectStore>,
    pub describer: Option<Arc<dyn DescriptionGenerator>>,
    pub limits: CreateLimits,
    pub upload_policy: UploadPolicy,
    pub session_days: i64,
    pub login_limiter: Arc<RateLimiter>,
    pub upload_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Database,
        objects: Arc<dyn ObjectStore>,
        describer: Option<Arc<dyn DescriptionGenerator>>,
    ) -> Result<Self> {
        let mut templates = Tera::default();
        templates.register_filter("format_price", format_price_filter);
        templates.add_raw_templates(vec![
            ("showcase.html", include_str!("../../templates/showcase.html")),
            ("404.html", include_str!("../../templates/404.html")),
        ])?;

        let upload_policy = UploadPolicy {
            max_files: config.media.max_files,
            max_bytes: config.media.max_upload_bytes()?,
            max_width: config.media.max_width,
        };

        Ok(Self {
            limits: config.products.limits(),
            session_days: config.auth.session_days()?,
            upload_policy,
            config,
            db,
            templates,
            objects,
            describer,
            login_limiter: Arc::new(RateLimiter::for_logins()),
            upload_limiter: Arc::new(RateLimiter::for_uploads()),
        })
    }
}

/// Groups the integer part of a price in thousands: `150000` → `150.000`.
pub fn format_price(price: &str) -> String {
    let price = price.trim();
    if price.is_empty() || !price.chars().all(|c| c.is_ascii_digit()) {
        return price.to_string();
    }

    let digits: Vec<char> = price.chars().collect();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(*c);
    }
    out
}

fn format_price_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let price = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("format_price requires a string"))?;
    Ok(Value::String(format_price(price)))
}
