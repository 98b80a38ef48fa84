// Integration tests for the transactions API.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use finpro::api::{create_router, AppState};
use finpro::oauth::StateRegistry;
use finpro::store::SqliteStore;
use finpro::token::TokenService;
use finpro::uber::UberClient;

fn test_app() -> Router {
    let store = Arc::new(SqliteStore::new(":memory:", &BASE64.encode([0u8; 32])).unwrap());
    create_router(AppState {
        store,
        tokens: TokenService::new(&[1u8; 32]),
        states: StateRegistry::new(600),
        uber: UberClient::new(
            "client-id".to_string(),
            "client-secret".to_string(),
            "http://localhost:8080/integrations/uber/callback".to_string(),
            "http://localhost:1".to_string(),
            "http://localhost:1".to_string(),
        ),
        frontend_redirect: "/profile.html".to_string(),
    })
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register_and_login(app: &Router, email: &str) -> String {
    let (status, body) = request(
        app,
        "POST",
        "/register",
        None,
        Some(json!({ "email": email, "password": "Passw0rd!", "displayName": "Test" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_add_and_list_single_transaction() {
    let app = test_app();
    let token = register_and_login(&app, "alice@example.com").await;

    let (status, created) = request(
        &app,
        "POST",
        "/transactions",
        Some(&token),
        Some(json!({
            "title": "Lunch",
            "amount": 25.50,
            "type": "expense",
            "category": "food",
            "date": "2024-01-10"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["transaction"]["title"], "Lunch");
    assert_eq!(created["transaction"]["source"], "manual");

    let (status, listed) = request(&app, "GET", "/transactions", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["amount"], 25.50);
    assert_eq!(listed[0]["title"], "Lunch");
    assert_eq!(listed[0]["categoryKey"], "food");
}

#[tokio::test]
async fn test_missing_fields_rejected() {
    let app = test_app();
    let token = register_and_login(&app, "alice@example.com").await;

    let (status, body) = request(
        &app,
        "POST",
        "/transactions",
        Some(&token),
        Some(json!({ "title": "Lunch", "amount": 25.50 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, _) = request(
        &app,
        "POST",
        "/transactions",
        Some(&token),
        Some(json!({
            "title": "Negative",
            "amount": -5.0,
            "type": "expense",
            "category": "food",
            "date": "2024-01-10"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_filters() {
    let app = test_app();
    let token = register_and_login(&app, "alice@example.com").await;

    for (title, amount, kind, category, date) in [
        ("Salary", 5000.0, "income", "salary", "2024-01-01"),
        ("Lunch", 25.5, "expense", "food", "2024-01-10"),
        ("Taxi", 18.0, "expense", "transport", "2024-02-03"),
    ] {
        let (status, _) = request(
            &app,
            "POST",
            "/transactions",
            Some(&token),
            Some(json!({
                "title": title, "amount": amount, "type": kind,
                "category": category, "date": date
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, incomes) =
        request(&app, "GET", "/transactions?type=income", Some(&token), None).await;
    assert_eq!(incomes.as_array().unwrap().len(), 1);

    let (_, food) =
        request(&app, "GET", "/transactions?category=food", Some(&token), None).await;
    assert_eq!(food.as_array().unwrap().len(), 1);
    assert_eq!(food[0]["title"], "Lunch");

    let (_, january) = request(
        &app,
        "GET",
        "/transactions?startDate=2024-01-01&endDate=2024-01-31",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(january.as_array().unwrap().len(), 2);

    let (status, _) =
        request(&app, "GET", "/transactions?type=bogus", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_transaction() {
    let app = test_app();
    let token = register_and_login(&app, "alice@example.com").await;

    let (_, created) = request(
        &app,
        "POST",
        "/transactions",
        Some(&token),
        Some(json!({
            "title": "Lunch", "amount": 25.5, "type": "expense",
            "category": "food", "date": "2024-01-10"
        })),
    )
    .await;
    let id = created["transaction"]["id"].as_str().unwrap().to_string();

    let (status, _) =
        request(&app, "DELETE", &format!("/transactions/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    // Already deleted: 404, not a blind 200.
    let (status, _) =
        request(&app, "DELETE", &format!("/transactions/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_transactions_are_scoped_per_user() {
    let app = test_app();
    let alice = register_and_login(&app, "alice@example.com").await;
    let bob = register_and_login(&app, "bob@example.com").await;

    let (_, created) = request(
        &app,
        "POST",
        "/transactions",
        Some(&alice),
        Some(json!({
            "title": "Lunch", "amount": 25.5, "type": "expense",
            "category": "food", "date": "2024-01-10"
        })),
    )
    .await;
    let id = created["transaction"]["id"].as_str().unwrap().to_string();

    let (_, bobs) = request(&app, "GET", "/transactions", Some(&bob), None).await;
    assert_eq!(bobs.as_array().unwrap().len(), 0);

    // Bob cannot delete Alice's transaction.
    let (status, _) =
        request(&app, "DELETE", &format!("/transactions/{}", id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_requires_authentication() {
    let app = test_app();

    let (status, _) = request(&app, "GET", "/transactions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
