use crate::services::{catalog, media};
use crate::web::error::ApiResult;
use crate::web::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use std::sync::Arc;
use tera::Context;

/// Embeddable player address for YouTube links, if the URL is one.
pub fn video_embed_url(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    let rest = rest.strip_prefix("m.").unwrap_or(rest);

    let id = if let Some(query) = rest.strip_prefix("youtube.com/watch?") {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("v="))?
    } else if let Some(path) = rest.strip_prefix("youtu.be/") {
        path.split(['?', '&', '/']).next()?
    } else if let Some(path) = rest.strip_prefix("youtube.com/shorts/") {
        path.split(['?', '&', '/']).next()?
    } else {
        return None;
    };

    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return None;
    }
    Some(format!("https://www.youtube.com/embed/{}", id))
}

fn not_found(state: &AppState) -> ApiResult<Response> {
    let mut ctx = Context::new();
    ctx.insert("site_name", &state.config.site.name);
    let html = state
        .templates
        .render("404.html", &ctx)
        .map_err(anyhow::Error::new)?;
    Ok((StatusCode::NOT_FOUND, Html(html)).into_response())
}

/// GET /:username/:slug
pub async fn showcase(
    State(state): State<Arc<AppState>>,
    Path((username, slug)): Path<(String, String)>,
) -> ApiResult<Response> {
    let Some(product) = catalog::get_public_product(&state.db, &username, &slug)? else {
        return not_found(&state);
    };

    if let Err(e) = catalog::record_view(&state.db, &product.product.id) {
        tracing::warn!("Failed to record view for {}: {}", product.product.id, e);
    }

    let contact = product.product.contact_method;
    let mut ctx = Context::new();
    ctx.insert("site_name", &state.config.site.name);
    ctx.insert("language", &state.config.site.language);
    ctx.insert("contact_link", &contact.link(&product.product.contact_value));
    ctx.insert("contact_label", contact.label());
    ctx.insert(
        "video_embed",
        &product.product.video_url.as_deref().and_then(video_embed_url),
    );
    ctx.insert("product", &product);

    let html = state
        .templates
        .render("showcase.html", &ctx)
        .map_err(anyhow::Error::new)?;
    Ok(Html(html).into_response())
}

/// GET /media/*key
pub async fn serve_media(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<Response> {
    if !media::is_safe_key(&key) {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let objects = state.objects.clone();
    let lookup = key.clone();
    let content = tokio::task::spawn_blocking(move || objects.read(&lookup))
        .await
        .map_err(anyhow::Error::new)??;

    match content {
        Some(bytes) => {
            let mime = mime_guess::from_path(&key).first_or_octet_stream();
            Ok((
                [
                    (header::CONTENT_TYPE, mime.to_string()),
                    (
                        header::CACHE_CONTROL,
                        "public, max-age=31536000, immutable".to_string(),
                    ),
                ],
                bytes,
            )
                .into_response())
        }
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

pub async fn health() -> &'static str {
    "ok"
}
