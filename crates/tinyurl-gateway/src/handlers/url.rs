use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tinyurl_core::{ShortCode, SHORT_CODE_LENGTH};
use tracing::debug;

/// Characters that cannot appear raw in a `Location` header.
const LOCATION_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// `POST /api/tinyurl`
///
/// The raw request body is the long URL. Responds with the absolute short URL
/// as plain text.
pub async fn create_url_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<String> {
    let base_url = match state.base_url() {
        Some(base_url) => base_url.to_string(),
        None => base_url_from_headers(&headers)?,
    };

    let code = state.allocator().create_short_url(&body).await?;
    debug!(code = %code, "Created short url");
    Ok(code.to_url(&base_url))
}

/// `GET /{short_code}`
///
/// Redirects to the decoded long URL with `302 Found`.
pub async fn redirect_handler(
    Path(short_code): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    if !is_well_formed(&short_code) {
        return Err(AppError::BadRequest(format!(
            "short code must match ^[A-Za-z0-9_-]{{1,{SHORT_CODE_LENGTH}}}$"
        )));
    }

    let long_url = state.allocator().resolve_short_url(&short_code).await?;
    let location = redirect_location(&long_url.decode());
    debug!(code = %short_code, location = %location, "Redirecting");

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

fn is_well_formed(short_code: &str) -> bool {
    (1..=SHORT_CODE_LENGTH).contains(&short_code.len())
        && short_code.chars().all(ShortCode::is_alphabet_char)
}

fn base_url_from_headers(headers: &HeaderMap) -> Result<String> {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|host| !host.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing Host header".to_string()))?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    Ok(format!("{scheme}://{host}"))
}

/// Whether `url` starts with `scheme://`.
fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn redirect_location(decoded: &str) -> String {
    let absolute = if has_scheme(decoded) {
        decoded.to_string()
    } else {
        format!("https://{decoded}")
    };
    utf8_percent_encode(&absolute, LOCATION_UNSAFE).to_string()
}
