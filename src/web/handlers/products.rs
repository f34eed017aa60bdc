use crate::models::CreateProduct;
use crate::services::{catalog, products};
use crate::web::error::{success, ApiResult};
use crate::web::extractors::CurrentUser;
use crate::web::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

/// POST /api/products
pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<CreateProduct>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(input) = payload?;

    let product = products::create_product(&state.db, &user.id, input, &state.limits)?;

    Ok((StatusCode::CREATED, success(product)).into_response())
}

/// GET /api/products
pub async fn list(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Response> {
    let products = catalog::list_products(&state.db, &user.id)?;
    Ok(success(products).into_response())
}

/// GET /api/dashboard
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Response> {
    let stats = catalog::owner_stats(&state.db, &user.id)?;
    let products = catalog::list_products(&state.db, &user.id)?;

    Ok(success(serde_json::json!({
        "user": user,
        "stats": stats,
        "products": products,
        "publicBaseUrl": format!("{}/{}", state.config.site.url.trim_end_matches('/'), user.username),
    }))
    .into_response())
}
