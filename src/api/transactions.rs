//! Transaction endpoints: list with filters, create, delete.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::auth::authenticate;
use crate::store::{EntryType, Transaction, TransactionFilter, TxnSource};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list).post(create))
        .route("/transactions/:id", axum::routing::delete(remove))
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    category: Option<String>,
    #[serde(rename = "startDate")]
    start_date: Option<String>,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
}

#[derive(Deserialize)]
struct CreateRequest {
    #[serde(default)]
    title: String,
    amount: Option<f64>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    category: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    note: String,
}

async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let auth = authenticate(&headers, &state.tokens)?;

    let kind = query
        .kind
        .as_deref()
        .map(|s| {
            EntryType::parse(s)
                .ok_or_else(|| ApiError::Validation("Invalid transaction type filter".to_string()))
        })
        .transpose()?;

    let filter = TransactionFilter {
        kind,
        category: query.category,
        start_date: query.start_date,
        end_date: query.end_date,
    };

    Ok(Json(state.store.transactions(&auth.user_id, &filter)?))
}

async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = authenticate(&headers, &state.tokens)?;

    let (Some(amount), Some(kind)) = (body.amount, body.kind.as_deref()) else {
        return Err(ApiError::Validation("Missing required fields".to_string()));
    };
    if body.title.is_empty() || body.category.is_empty() || body.date.is_empty() {
        return Err(ApiError::Validation("Missing required fields".to_string()));
    }
    let kind = EntryType::parse(kind)
        .ok_or_else(|| ApiError::Validation("Type must be income or expense".to_string()))?;
    if !(amount >= 0.0) {
        return Err(ApiError::Validation(
            "Amount must be a non-negative number".to_string(),
        ));
    }

    let transaction = Transaction {
        id: Uuid::new_v4().to_string(),
        owner_id: auth.user_id,
        title: body.title,
        amount,
        kind,
        category_key: body.category,
        date: body.date,
        note: body.note,
        created_at: Utc::now(),
        source: TxnSource::Manual,
        source_id: None,
    };
    state.store.insert_transaction(&transaction)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Transaction added successfully",
            "transaction": transaction
        })),
    ))
}

async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let auth = authenticate(&headers, &state.tokens)?;

    if !state.store.delete_transaction(&auth.user_id, &id)? {
        return Err(ApiError::NotFound("Transaction not found".to_string()));
    }

    Ok(Json(json!({
        "message": "Transaction deleted successfully",
        "success": true
    })))
}
