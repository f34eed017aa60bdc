use crate::models::{User, UserPlan};
use crate::services::auth;
use crate::web::error::{success, ApiError, ApiResult};
use crate::web::extractors::{CurrentUser, SESSION_COOKIE};
use crate::web::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::sync::Arc;
use time::Duration;

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    username: String,
    email: String,
    name: Option<String>,
    password: String,
}

fn session_cookie(token: String, days: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::days(days))
        .build()
}

fn signed_in(state: &AppState, jar: CookieJar, user: User, status: StatusCode) -> ApiResult<Response> {
    let token = auth::create_session(&state.db, &user.id, state.session_days)?;
    let jar = jar.add(session_cookie(token, state.session_days));
    Ok((status, jar, success(user)).into_response())
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty());

    auth::validate_registration(&req.username, &req.email, &req.password)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let id = match auth::create_user(
        &state.db,
        &req.username,
        &req.email,
        name,
        &req.password,
        UserPlan::Free,
    ) {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict(
                "Username or email is already registered".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    let user = auth::get_user(&state.db, &id)?.ok_or(ApiError::NotFound)?;
    tracing::info!("Registered user '{}'", user.username);
    signed_in(&state, jar, user, StatusCode::CREATED)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let rate_key = format!("login:{}", req.username);

    if !state.login_limiter.check(&rate_key) {
        return Err(ApiError::TooManyRequests(
            "Too many login attempts. Please try again later.".to_string(),
        ));
    }

    match auth::authenticate(&state.db, &req.username, &req.password)? {
        Some(user) => {
            state.login_limiter.clear(&rate_key);
            signed_in(&state, jar, user, StatusCode::OK)
        }
        None => {
            state.login_limiter.record_attempt(&rate_key);
            tracing::warn!("Failed login for '{}'", req.username);
            Err(ApiError::Unauthorized)
        }
    }
}

pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> ApiResult<Response> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Err(e) = auth::delete_session(&state.db, cookie.value()) {
            tracing::warn!("Failed to delete session: {}", e);
        }
    }

    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build();

    Ok((jar.remove(cookie), success(serde_json::json!({}))).into_response())
}

pub async fn me(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    success(user)
}
