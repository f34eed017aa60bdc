mod error;
mod extractors;
mod handlers;
mod routes;
pub mod security;
mod state;

pub use error::{ApiError, ApiResponse};
pub use handlers::public::video_embed_url;
pub use state::{format_price, AppState};

use crate::services::description::{AnthropicGenerator, DescriptionGenerator};
use crate::services::media::{LocalObjectStore, ObjectStore};
use crate::{Config, Database};
use anyhow::Result;
use axum::http::StatusCode;
use axum::middleware;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.upload_policy.max_bytes * state.upload_policy.max_files.max(1);
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .merge(routes::api_routes(upload_limit))
        .merge(routes::public_routes())
        .layer(middleware::from_fn(security::apply_security_headers))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn description_generator(config: &Config) -> Result<Option<Arc<dyn DescriptionGenerator>>> {
    if !config.ai.enabled {
        return Ok(None);
    }

    match std::env::var(&config.ai.api_key_env) {
        Ok(key) if !key.trim().is_empty() => {
            let generator: Arc<dyn DescriptionGenerator> =
                Arc::new(AnthropicGenerator::new(&config.ai, key)?);
            tracing::info!("Description generation enabled ({})", config.ai.model);
            Ok(Some(generator))
        }
        _ => {
            tracing::warn!(
                "ai.enabled is set but {} is empty; description generation disabled",
                config.ai.api_key_env
            );
            Ok(None)
        }
    }
}

pub async fn serve(config: Config, db: Database, addr: &str) -> Result<()> {
    std::fs::create_dir_all(&config.media.upload_dir)?;
    let objects: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(
        &config.media.upload_dir,
        &config.media.cdn_url,
    ));
    let describer = description_generator(&config)?;

    let state = Arc::new(AppState::new(config, db, objects, describer)?);

    let limiters = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiters.login_limiter.cleanup();
            limiters.upload_limiter.cleanup();
        }
    });

    let app = build_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);
    let app = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await?;

    Ok(())
}
