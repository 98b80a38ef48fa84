//! Category endpoints: list (seeding defaults on first access), create,
//! delete.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::{ApiError, AppState};
use crate::auth::authenticate;
use crate::categories;
use crate::store::{Category, EntryType};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list).post(create))
        .route("/categories/:id", axum::routing::delete(remove))
}

#[derive(Deserialize)]
struct CreateRequest {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    color: String,
}

async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Category>>, ApiError> {
    let auth = authenticate(&headers, &state.tokens)?;
    Ok(Json(categories::list(state.store.as_ref(), &auth.user_id)?))
}

async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = authenticate(&headers, &state.tokens)?;

    if body.name.is_empty() || body.icon.is_empty() {
        return Err(ApiError::Validation(
            "Name, type and icon are required".to_string(),
        ));
    }
    let kind = body
        .kind
        .as_deref()
        .and_then(EntryType::parse)
        .ok_or_else(|| ApiError::Validation("Type must be income or expense".to_string()))?;

    let color = if body.color.is_empty() {
        "#757575".to_string()
    } else {
        body.color
    };

    let category = categories::create(
        state.store.as_ref(),
        &auth.user_id,
        &body.name,
        kind,
        &body.icon,
        &color,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Category created successfully",
            "category": category
        })),
    ))
}

async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let auth = authenticate(&headers, &state.tokens)?;

    let reassigned = categories::remove(state.store.as_ref(), &auth.user_id, &id)?;

    Ok(Json(json!({
        "message": "Category deleted successfully",
        "reassigned": reassigned
    })))
}
