//! Account endpoints: registration, login, token validation, profile and
//! password changes.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ApiError, AppState};
use crate::accounts;
use crate::auth::authenticate;
use crate::store::User;
use crate::token::{DISPLAY_TTL_SECS, SESSION_TTL_SECS};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/validate-token", get(validate_token))
        .route("/user/profile", get(get_profile).put(update_profile))
        .route("/user/password", put(change_password))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileUpdateRequest {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChangeRequest {
    #[serde(default)]
    current_password: String,
    #[serde(default)]
    new_password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    message: String,
    token: String,
    /// Expiry window clients may cache for display; the token itself
    /// carries the authoritative `exp` claim.
    expires_in: i64,
    user: User,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.email.is_empty() || body.password.is_empty() || body.display_name.is_empty() {
        return Err(ApiError::Validation(
            "Email, password and display name are required".to_string(),
        ));
    }

    let user = accounts::register(
        state.store.as_ref(),
        &body.email,
        &body.password,
        &body.display_name,
    )?;
    let token = state.tokens.issue(&user.id, &user.email, SESSION_TTL_SECS);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".to_string(),
            token,
            expires_in: DISPLAY_TTL_SECS,
            user,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if body.email.is_empty() || body.password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let user = accounts::authenticate(state.store.as_ref(), &body.email, &body.password)?;
    let token = state.tokens.issue(&user.id, &user.email, SESSION_TTL_SECS);

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        token,
        expires_in: DISPLAY_TTL_SECS,
        user,
    }))
}

async fn validate_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let auth = authenticate(&headers, &state.tokens)?;

    // A valid token whose user row is missing still validates; fall back
    // to the claim identity.
    let body = match accounts::fetch(state.store.as_ref(), &auth.user_id)? {
        Some(user) => json!({ "authenticated": true, "user": user }),
        None => json!({
            "authenticated": true,
            "user": { "id": auth.user_id, "email": auth.email }
        }),
    };

    Ok(Json(body))
}

async fn get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let auth = authenticate(&headers, &state.tokens)?;

    let user = accounts::fetch(state.store.as_ref(), &auth.user_id)?
        .ok_or_else(|| ApiError::NotFound("User profile not found".to_string()))?;

    Ok(Json(json!({ "user": user })))
}

async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ProfileUpdateRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let auth = authenticate(&headers, &state.tokens)?;

    if body.display_name.is_empty() || body.email.is_empty() {
        return Err(ApiError::Validation(
            "Display name and email are required".to_string(),
        ));
    }

    let user = accounts::update_profile(
        state.store.as_ref(),
        &auth.user_id,
        &body.display_name,
        &body.email,
    )?;

    // Claims embed the email, so a profile change re-issues the token.
    let token = state.tokens.issue(&user.id, &user.email, SESSION_TTL_SECS);

    Ok(Json(AuthResponse {
        message: "Profile updated successfully".to_string(),
        token,
        expires_in: DISPLAY_TTL_SECS,
        user,
    }))
}

async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PasswordChangeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let auth = authenticate(&headers, &state.tokens)?;

    if body.current_password.is_empty() || body.new_password.is_empty() {
        return Err(ApiError::Validation(
            "Current and new password are required".to_string(),
        ));
    }

    accounts::change_password(
        state.store.as_ref(),
        &auth.user_id,
        &body.current_password,
        &body.new_password,
    )?;

    Ok(Json(json!({ "message": "Password changed successfully" })))
}
