//! Integration endpoints: status, OAuth start/callback, trip sync, and
//! disconnect.
//!
//! The callback is the one unauthenticated route: the caller arrives from
//! the provider, so identity comes from the consumed state nonce and the
//! outcome is surfaced as a redirect query parameter.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{Json, Redirect},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ApiError, AppState};
use crate::auth::authenticate;
use crate::oauth::{self, CallbackError, PROVIDER_UBER};
use crate::store::Integration;
use crate::sync;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/integrations/status", get(status))
        .route("/integrations/uber/auth", get(auth_url))
        .route("/integrations/uber/callback", get(callback))
        .route("/integrations/uber/sync", post(sync_trips))
        .route("/integrations/uber", delete(disconnect))
}

/// Client-safe projection of an integration; stored tokens never leave
/// the server.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IntegrationStatus {
    provider: String,
    active: bool,
    status: &'static str,
    token_expires_at: Option<DateTime<Utc>>,
    connected_at: DateTime<Utc>,
    account: serde_json::Value,
}

impl IntegrationStatus {
    fn project(integration: &Integration) -> Self {
        let expired = integration
            .token_expires_at
            .map(|exp| exp <= Utc::now())
            .unwrap_or(false);

        Self {
            provider: integration.provider.clone(),
            active: integration.active,
            status: if expired { "expired" } else { "connected" },
            token_expires_at: integration.token_expires_at,
            connected_at: integration.updated_at,
            account: integration.external_user_data.clone(),
        }
    }
}

async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let auth = authenticate(&headers, &state.tokens)?;

    let uber = state
        .store
        .integration(&auth.user_id, PROVIDER_UBER)?
        .filter(|i| i.active)
        .map(|i| IntegrationStatus::project(&i));

    // "99" is a reserved provider slot; never connected in this build.
    Ok(Json(json!({ "uber": uber, "99": null })))
}

async fn auth_url(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let auth = authenticate(&headers, &state.tokens)?;

    let nonce = state.states.issue(PROVIDER_UBER, &auth.user_id);
    let url = state.uber.build_auth_url(&nonce);

    tracing::info!(user_id = %auth.user_id, "issued Uber authorization URL");
    Ok(Json(json!({ "authUrl": url })))
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    if let Some(provider_error) = query.error {
        tracing::warn!(error = %provider_error, "Uber authorization declined");
        return error_redirect(&state.frontend_redirect, "uber_auth_declined");
    }

    let Some(code) = query.code else {
        tracing::warn!("Uber callback arrived without an authorization code");
        return error_redirect(&state.frontend_redirect, "no_auth_code");
    };

    // The nonce is single-use and bound to the user who requested the
    // auth URL; anything else is rejected before the provider is called.
    let Some(pending) = query.state.and_then(|s| state.states.consume(&s)) else {
        tracing::warn!("Uber callback carried an unknown or expired state");
        return error_redirect(&state.frontend_redirect, CallbackError::InvalidState.reason());
    };

    match oauth::complete_authorization(state.store.as_ref(), &state.uber, pending, &code).await
    {
        Ok(_) => Redirect::temporary(&format!(
            "{}?integration=uber&status=success",
            state.frontend_redirect
        )),
        Err(e) => {
            tracing::error!(error = %e, "Uber OAuth callback failed");
            error_redirect(&state.frontend_redirect, e.reason())
        }
    }
}

fn error_redirect(frontend: &str, reason: &str) -> Redirect {
    Redirect::temporary(&format!(
        "{}?integration=uber&status=error&error={}",
        frontend, reason
    ))
}

async fn sync_trips(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let auth = authenticate(&headers, &state.tokens)?;

    let report = sync::sync_trips(state.store.as_ref(), &state.uber, &auth.user_id).await?;

    Ok(Json(json!({
        "message": "Sync completed successfully",
        "total": report.total,
        "inserted": report.inserted,
        "updated": report.updated,
        "transactions": report.transactions_created,
        "failed": report.failed,
    })))
}

async fn disconnect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let auth = authenticate(&headers, &state.tokens)?;

    oauth::disconnect(state.store.as_ref(), &auth.user_id, PROVIDER_UBER)?;

    Ok(Json(json!({
        "message": "Uber integration disconnected",
        "success": true
    })))
}
