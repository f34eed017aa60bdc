use crate::models::User;
use crate::services::auth;
use crate::web::error::ApiError;
use crate::web::state::AppState;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "session";

/// Session token from the `session` cookie or an `Authorization: Bearer` header.
pub fn session_token(parts: &Parts) -> Option<String> {
    let cookies = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = cookies.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts).ok_or(ApiError::Unauthorized)?;

        let user = auth::validate_session(&state.db, &token)?.ok_or(ApiError::Unauthorized)?;

        Ok(CurrentUser(user))
    }
}
