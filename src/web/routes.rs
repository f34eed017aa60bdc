use super::handlers;
use super::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

// Multipart framing on top of the per-file limit.
const UPLOAD_BODY_SLACK: usize = 64 * 1024;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::public::health))
        .route("/media/*key", get(handlers::public::serve_media))
        .route("/:username/:slug", get(handlers::public::showcase))
}

pub fn api_routes(upload_body_limit: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/me", get(handlers::auth::me))
        .route(
            "/api/upload",
            post(handlers::upload::upload_images)
                .layer(DefaultBodyLimit::max(upload_body_limit + UPLOAD_BODY_SLACK)),
        )
        .route(
            "/api/products",
            get(handlers::products::list).post(handlers::products::create),
        )
        .route("/api/dashboard", get(handlers::products::dashboard))
        .route(
            "/api/generate-description",
            post(handlers::description::generate),
        )
}
