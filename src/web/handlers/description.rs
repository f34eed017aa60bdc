use crate::services::description::{self, DescriptionError, DescriptionRequest};
use crate::web::error::{success, ApiResult};
use crate::web::extractors::CurrentUser;
use crate::web::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

/// POST /api/generate-description
pub async fn generate(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<DescriptionRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    let generator = state.describer.as_ref().ok_or(DescriptionError::Disabled)?;

    let text = description::describe(generator.as_ref(), &request).await?;
    tracing::debug!(
        "Generated {} character description for {}",
        text.chars().count(),
        user.username
    );

    Ok(success(serde_json::json!({ "description": text })).into_response())
}
