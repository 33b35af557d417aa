//! HTTP surface tests against the in-memory store

mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use common::dec;
use kitchen_ledger::{create_app, AppState, Config, MemoryStore};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    create_app(AppState::new(Arc::new(MemoryStore::new()), Config::default()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("Idempotency-Key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn create_flour(app: &Router) -> String {
    let (status, body) = send(
        app,
        post(
            "/api/v1/items",
            json!({
                "ingredient_name": "Flour",
                "unit": "kg",
                "opening_quantity": "10",
                "unit_cost": "1.20",
                "reorder_point": "4"
            }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_reports_backend() {
    let app = app();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "connected");
    assert_eq!(body["backend"], "memory");

    let (status, _) = send(&app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_item_lifecycle_over_http() {
    let app = app();
    let id = create_flour(&app).await;

    let (status, body) = send(&app, get(&format!("/api/v1/items/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ingredient_name"], "Flour");
    assert_eq!(body["stock_status"], "in_stock");
    assert_eq!(dec(body["quantity_on_hand"].as_str().unwrap()), dec("10"));
    assert_eq!(dec(body["total_value"].as_str().unwrap()), dec("12"));

    let (status, body) = send(
        &app,
        post(
            &format!("/api/v1/items/{}/transactions", id),
            json!({ "quantity": "-7", "transaction_type": "usage" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["transaction_type"], "usage");

    let (_, body) = send(&app, get("/api/v1/inventory/low-stock")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["stock_status"], "low_stock");

    let (_, body) = send(&app, get(&format!("/api/v1/items/{}/ledger-check", id))).await;
    assert_eq!(body["consistent"], true);
    assert_eq!(body["transaction_count"], 2);
}

#[tokio::test]
async fn test_errors_are_structured() {
    let app = app();

    let (status, body) = send(
        &app,
        get("/api/v1/items/6f1c1a8e-3c52-4c1f-9a53-0a4f5a4d8e11"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["kind"], "not_found");

    let (status, body) = send(
        &app,
        post("/api/v1/items", json!({ "ingredient_name": "", "unit": "kg" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");

    let id = create_flour(&app).await;
    let (status, body) = send(
        &app,
        post(&format!("/api/v1/transfers/{}/complete", id), json!({}), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Transfer not found");
}

#[tokio::test]
async fn test_idempotency_key_replays_adjustment() {
    let app = app();
    let id = create_flour(&app).await;
    let uri = format!("/api/v1/items/{}/transactions", id);
    let body = json!({ "quantity": "5", "transaction_type": "purchase", "unit_cost": "1.30" });

    let (first_status, first) = send(&app, post(&uri, body.clone(), Some("flour-delivery"))).await;
    let (again_status, again) = send(&app, post(&uri, body, Some("flour-delivery"))).await;
    assert_eq!(first_status, StatusCode::CREATED);
    assert_eq!(again_status, StatusCode::CREATED);
    assert_eq!(first["id"], again["id"]);

    let (_, item) = send(&app, get(&format!("/api/v1/items/{}", id))).await;
    assert_eq!(dec(item["quantity_on_hand"].as_str().unwrap()), dec("15"));
}

#[tokio::test]
async fn test_oversized_idempotency_key_rejected() {
    let app = app();
    let id = create_flour(&app).await;
    let key = "k".repeat(300);

    let (status, body) = send(
        &app,
        post(
            &format!("/api/v1/items/{}/transactions", id),
            json!({ "quantity": "1", "transaction_type": "adjustment" }),
            Some(&key),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "Idempotency-Key");
}

#[tokio::test]
async fn test_meta_category_inference() {
    let app = app();
    let (status, body) = send(&app, get("/api/v1/meta/category?ingredient=Wagyu%20Striploin")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "BEEF");

    let (status, body) = send(&app, get("/api/v1/meta/display")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["waste_categories"].as_array().unwrap().len(), 8);
}
