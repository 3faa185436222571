use axum::{extract::State, http::HeaderMap, Json};
use once_cell::sync::Lazy;
use regex::Regex;
use revue_types::{AuthResponse, SignInRequest, SignUpRequest};

use super::{ApiError, ApiResult, Caller};
use crate::db::repositories::ProfileRepository;
use crate::state::AppState;

/// Letters, digits and underscores, 3 to 30 characters
static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]{3,30}$").expect("Failed to compile username regex")
});

pub fn validate_username(username: &str) -> ApiResult<()> {
    if USERNAME_REGEX.is_match(username) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Invalid username '{}': use 3-30 letters, digits or underscores",
            username
        )))
    }
}

/// POST /auth/v1/signup - Create a profile and open a session for it
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SignUpRequest>,
) -> ApiResult<Json<AuthResponse>> {
    Caller::from_headers(&state, &headers)?;

    let username = payload.username.trim();
    validate_username(username)?;

    let display_name = payload
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let repo = ProfileRepository::new(state.db.pool.clone());
    let user = repo.create(username, display_name)?;
    let access_token = state.session_manager.create_session(user.id)?;

    tracing::info!("Signed up {} ({})", user.username, user.id);
    Ok(Json(AuthResponse { access_token, user }))
}

/// POST /auth/v1/token - Open a session for an existing profile.
/// Local development backend, so no credential beyond the username is checked.
pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SignInRequest>,
) -> ApiResult<Json<AuthResponse>> {
    Caller::from_headers(&state, &headers)?;

    let repo = ProfileRepository::new(state.db.pool.clone());
    let user = repo
        .get_by_username(payload.username.trim())?
        .ok_or_else(|| ApiError::Unauthorized(format!("Unknown user '{}'", payload.username)))?;
    let access_token = state.session_manager.create_session(user.id)?;

    Ok(Json(AuthResponse { access_token, user }))
}

/// POST /auth/v1/logout - Revoke the bearer token
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    Caller::from_headers(&state, &headers)?;

    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Missing access token".to_string()))?;

    let revoked = state.session_manager.delete_session(token.trim())?;
    Ok(Json(serde_json::json!({ "revoked": revoked })))
}
