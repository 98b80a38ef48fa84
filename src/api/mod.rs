//! HTTP API: error taxonomy, shared state, and router composition.

pub mod categories;
pub mod integrations;
pub mod transactions;
pub mod users;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::accounts::AccountError;
use crate::auth::AuthRejection;
use crate::categories::CategoryError;
use crate::oauth::StateRegistry;
use crate::store::{Storage, StoreError};
use crate::sync::SyncError;
use crate::token::TokenService;
use crate::uber::UberClient;

/// Shared application state, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Storage>,
    pub tokens: TokenService,
    pub states: StateRegistry,
    pub uber: UberClient,
    /// Frontend path the OAuth callback redirects back to.
    pub frontend_redirect: String,
}

/// Error body returned for every failure.
#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

/// API failure taxonomy. Raw store/driver errors are translated before
/// they reach a client; stack traces never leave the process.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed input (400).
    Validation(String),
    /// Missing, invalid, or expired credentials (401).
    Auth(String),
    /// Authenticated but not allowed (403).
    Forbidden(String),
    /// Resource does not exist (404).
    NotFound(String),
    /// Duplicate email or category (400).
    Conflict(String),
    /// Provider call failed (502).
    Upstream(String),
    /// Anything unexpected (500).
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl From<AuthRejection> for ApiError {
    fn from(rejection: AuthRejection) -> Self {
        ApiError::Auth(rejection.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(what) => ApiError::Conflict(what),
            StoreError::Unavailable => {
                ApiError::Internal("Service is running without storage".to_string())
            }
            StoreError::Backend(msg) => {
                tracing::error!(error = %msg, "storage failure");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::DuplicateEmail => ApiError::Conflict(e.to_string()),
            AccountError::InvalidCredentials => ApiError::Auth(e.to_string()),
            AccountError::NotFound => ApiError::NotFound(e.to_string()),
            AccountError::Store(store_err) => store_err.into(),
            AccountError::Internal(msg) => {
                tracing::error!(error = %msg, "account operation failed");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<CategoryError> for ApiError {
    fn from(e: CategoryError) -> Self {
        match e {
            CategoryError::Duplicate => ApiError::Conflict(e.to_string()),
            CategoryError::IsDefault => ApiError::Forbidden(e.to_string()),
            CategoryError::NotFound => ApiError::NotFound(e.to_string()),
            CategoryError::Store(store_err) => store_err.into(),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::IntegrationNotFound => ApiError::NotFound(e.to_string()),
            SyncError::TokenExpired => ApiError::Auth(e.to_string()),
            SyncError::UpstreamFetch(_) => {
                tracing::error!(error = %e, "upstream fetch failed");
                ApiError::Upstream("Failed to sync Uber trips".to_string())
            }
            SyncError::Store(store_err) => store_err.into(),
        }
    }
}

/// Assemble the full application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(users::router())
        .merge(transactions::router())
        .merge(categories::router())
        .merge(integrations::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
