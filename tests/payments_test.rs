mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::{json, Value};

use common::{create_test_app, create_test_app_with, TestApp, TestOptions, TEST_WEBHOOK_SECRET};
use repcount::services::payments::sign_webhook_payload;

async fn send_webhook(app: &TestApp, event: &Value, secret: &str) -> common::TestResponse {
    let body = event.to_string();
    let timestamp = chrono::Utc::now().timestamp();
    let signature = sign_webhook_payload(body.as_bytes(), timestamp, secret);
    send_raw_webhook(app, body, Some(format!("t={},v1={}", timestamp, signature))).await
}

async fn send_raw_webhook(
    app: &TestApp,
    body: String,
    signature: Option<String>,
) -> common::TestResponse {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("Stripe-Signature", signature);
    }
    app.send(builder.body(Body::from(body)).unwrap()).await
}

fn checkout_completed(user_id: &str, customer_id: &str) -> Value {
    json!({
        "type": "checkout.session.completed",
        "data": { "object": { "client_reference_id": user_id, "customer": customer_id } }
    })
}

#[tokio::test]
async fn test_checkout_session() {
    let app = create_test_app();
    let (user, token) = app.verified_user("sam@example.com").await;

    let response = app.post("/payments/checkout", &token, json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["session_id"], format!("cs_test_{}", user.id));
    assert_eq!(response.body["url"], "https://checkout.example.com/pay");
}

#[tokio::test]
async fn test_checkout_when_already_premium() {
    let app = create_test_app();
    let (user, token) = app.verified_user("sam@example.com").await;
    app.make_premium(&user.id).await;

    let response = app.post("/payments/checkout", &token, json!({})).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_checkout_without_provider() {
    let app = create_test_app_with(TestOptions {
        payments: false,
        ..Default::default()
    });
    let (_, token) = app.verified_user("sam@example.com").await;

    let response = app.post("/payments/checkout", &token, json!({})).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);

    // Status still works; it only reads the account.
    let status = app.get("/payments/status", &token).await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.body["is_premium"], false);
}

#[tokio::test]
async fn test_webhook_activates_and_cancels_premium() {
    let app = create_test_app();
    let (user, token) = app.verified_user("sam@example.com").await;

    let activated = send_webhook(
        &app,
        &checkout_completed(&user.id, "cus_live_1"),
        TEST_WEBHOOK_SECRET,
    )
    .await;
    assert_eq!(activated.status, StatusCode::OK);
    assert_eq!(activated.body["received"], true);

    let status = app.get("/payments/status", &token).await;
    assert_eq!(status.body["is_premium"], true);

    let cancelled = send_webhook(
        &app,
        &json!({
            "type": "customer.subscription.deleted",
            "data": { "object": { "customer": "cus_live_1" } }
        }),
        TEST_WEBHOOK_SECRET,
    )
    .await;
    assert_eq!(cancelled.status, StatusCode::OK);

    let status = app.get("/payments/status", &token).await;
    assert_eq!(status.body["is_premium"], false);
}

#[tokio::test]
async fn test_webhook_rejects_bad_signatures() {
    let app = create_test_app();
    let (user, token) = app.verified_user("sam@example.com").await;
    let event = checkout_completed(&user.id, "cus_live_1");

    let wrong_secret = send_webhook(&app, &event, "whsec_someone_else").await;
    assert_eq!(wrong_secret.status, StatusCode::BAD_REQUEST);

    let unsigned = send_raw_webhook(&app, event.to_string(), None).await;
    assert_eq!(unsigned.status, StatusCode::BAD_REQUEST);

    let stale_timestamp = chrono::Utc::now().timestamp() - 3600;
    let body = event.to_string();
    let signature = sign_webhook_payload(body.as_bytes(), stale_timestamp, TEST_WEBHOOK_SECRET);
    let stale = send_raw_webhook(
        &app,
        body,
        Some(format!("t={},v1={}", stale_timestamp, signature)),
    )
    .await;
    assert_eq!(stale.status, StatusCode::BAD_REQUEST);

    let status = app.get("/payments/status", &token).await;
    assert_eq!(status.body["is_premium"], false);
}

#[tokio::test]
async fn test_webhook_acknowledges_unknown_events_and_users() {
    let app = create_test_app();

    let ignored = send_webhook(
        &app,
        &json!({ "type": "invoice.paid", "data": { "object": {} } }),
        TEST_WEBHOOK_SECRET,
    )
    .await;
    assert_eq!(ignored.status, StatusCode::OK);

    let unknown_user = send_webhook(
        &app,
        &checkout_completed("no-such-user", "cus_nobody"),
        TEST_WEBHOOK_SECRET,
    )
    .await;
    assert_eq!(unknown_user.status, StatusCode::OK);
}
