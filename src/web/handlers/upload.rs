use crate::services::media::{self, UploadFile};
use crate::web::error::{success, ApiError, ApiResult};
use crate::web::extractors::CurrentUser;
use crate::web::state::AppState;
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

/// POST /api/upload
///
/// Multipart form with one or more `images` parts and an optional
/// `productId` used to group the stored objects.
pub async fn upload_images(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let rate_key = format!("upload:{}", user.id);
    if !state.upload_limiter.check(&rate_key) {
        return Err(ApiError::TooManyRequests(
            "Too many uploads. Please wait before uploading more files.".to_string(),
        ));
    }

    let mut files = Vec::new();
    let mut product_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("images") => {
                let name = field.file_name().unwrap_or("image").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await?;
                files.push(UploadFile {
                    name,
                    content_type,
                    data: data.to_vec(),
                });
            }
            Some("productId") => {
                product_id = Some(field.text().await?);
            }
            _ => {}
        }
    }

    let objects = state.objects.clone();
    let policy = state.upload_policy;
    let owner = user.id.clone();

    // Decoding and re-encoding images is CPU bound.
    let uploaded = tokio::task::spawn_blocking(move || {
        media::upload_images(
            objects.as_ref(),
            &owner,
            product_id.as_deref(),
            &files,
            &policy,
        )
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow::Error::new(e)))??;

    state.upload_limiter.record_attempt(&rate_key);
    Ok(success(uploaded).into_response())
}
