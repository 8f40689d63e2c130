// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_app, TEST_USER_AGENT};
use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;
use webhook_relay::config::settings::WebhookSettings;
use webhook_relay::domain::models::webhook_delivery::DeliveryStatus;
use webhook_relay::domain::repositories::webhook_delivery_repository::WebhookDeliveryRepository;
use webhook_relay::domain::services::signature_service::{self, SIGNATURE_HEADER};
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn create_webhook(app: &super::helpers::TestApp, org: Uuid, body: Value) -> Value {
    let response = app
        .server
        .post(&format!("/v1/organizations/{}/webhooks", org))
        .json(&body)
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()
}

#[tokio::test]
async fn test_create_webhook_returns_secret_once() {
    let app = create_test_app().await;
    let org = Uuid::new_v4();

    let created = create_webhook(
        &app,
        org,
        json!({
            "name": "Orders",
            "url": "https://hooks.example.test/orders",
            "events": ["order:created", {"event": "order:cancelled", "enabled": false}]
        }),
    )
    .await;

    assert_eq!(created["organization_id"], org.to_string());
    assert_eq!(created["is_active"], true);
    assert_eq!(created["has_secret"], true);
    assert_eq!(created["secret"].as_str().map(str::len), Some(64));
    assert_eq!(created["retry_policy"]["max_attempts"], 3);
    assert_eq!(created["events"].as_array().map(Vec::len), Some(2));

    let fetched = app
        .server
        .get(&format!("/v1/webhooks/{}", created["id"].as_str().unwrap()))
        .await;
    fetched.assert_status_ok();
    let fetched = fetched.json::<Value>();
    assert_eq!(fetched["has_secret"], true);
    assert!(fetched.get("secret").is_none());
}

#[tokio::test]
async fn test_create_webhook_validation_errors() {
    let app = create_test_app().await;
    let path = format!("/v1/organizations/{}/webhooks", Uuid::new_v4());

    let response = app
        .server
        .post(&path)
        .json(&json!({"name": "", "url": "https://example.test"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .post(&path)
        .json(&json!({"name": "ftp", "url": "ftp://example.test/hook"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"].is_string());

    let response = app
        .server
        .post(&path)
        .json(&json!({
            "name": "policy",
            "url": "https://example.test/hook",
            "retry_policy": {"max_attempts": 0}
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_resources_return_404() {
    let app = create_test_app().await;
    let id = Uuid::new_v4();

    app.server
        .get(&format!("/v1/webhooks/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .delete(&format!("/v1/webhooks/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .get(&format!("/v1/deliveries/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .post(&format!("/v1/deliveries/{}/cancel", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_activate_and_rotate() {
    let app = create_test_app().await;
    let created = create_webhook(
        &app,
        Uuid::new_v4(),
        json!({"name": "Hook", "url": "https://example.test/hook", "secret": "whsec_1"}),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let updated = app
        .server
        .patch(&format!("/v1/webhooks/{}", id))
        .json(&json!({"name": "Renamed", "headers": {"X-Team": "core"}}))
        .await;
    updated.assert_status_ok();
    let updated = updated.json::<Value>();
    assert_eq!(updated["name"], "Renamed");
    assert_eq!(updated["url"], "https://example.test/hook");
    assert_eq!(updated["headers"]["X-Team"], "core");

    let deactivated = app
        .server
        .post(&format!("/v1/webhooks/{}/deactivate", id))
        .await
        .json::<Value>();
    assert_eq!(deactivated["is_active"], false);

    let activated = app
        .server
        .post(&format!("/v1/webhooks/{}/activate", id))
        .await
        .json::<Value>();
    assert_eq!(activated["is_active"], true);

    let rotated = app
        .server
        .post(&format!("/v1/webhooks/{}/rotate-secret", id))
        .await
        .json::<Value>();
    let secret = rotated["secret"].as_str().unwrap();
    assert_ne!(secret, "whsec_1");

    app.server
        .delete(&format!("/v1/webhooks/{}", id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server
        .get(&format!("/v1/webhooks/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_webhooks_paginates() {
    let app = create_test_app().await;
    let org = Uuid::new_v4();
    for i in 0..3 {
        create_webhook(
            &app,
            org,
            json!({"name": format!("hook-{}", i), "url": format!("https://example.test/{}", i)}),
        )
        .await;
    }

    let page = app
        .server
        .get(&format!("/v1/organizations/{}/webhooks", org))
        .add_query_param("page", 1)
        .add_query_param("limit", 2)
        .await;
    page.assert_status_ok();
    let page = page.json::<Value>();
    assert_eq!(page["total"], 3);
    assert_eq!(page["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(page["has_next"], true);
    assert_eq!(page["has_prev"], false);
    assert!(page["items"][0].get("secret").is_none());

    let other = app
        .server
        .get(&format!("/v1/organizations/{}/webhooks", Uuid::new_v4()))
        .await
        .json::<Value>();
    assert_eq!(other["total"], 0);
}

#[tokio::test]
async fn test_publish_event_enqueues_and_cancel() {
    let app = create_test_app().await;
    let org = Uuid::new_v4();
    let created = create_webhook(
        &app,
        org,
        json!({"name": "Cycles", "url": "https://example.test/cycles", "events": ["cycle:created"]}),
    )
    .await;
    let webhook_id = created["id"].as_str().unwrap().to_string();

    let response = app
        .server
        .post("/v1/events")
        .json(&json!({
            "event_type": "cycle:created",
            "organization_id": org,
            "data": {"cycle_id": "c-1"},
            "correlation_id": "req-1"
        }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body = response.json::<Value>();
    let deliveries = body["deliveries"].as_array().unwrap();
    assert_eq!(deliveries.len(), 1);
    let delivery_id = deliveries[0].as_str().unwrap().to_string();

    let history = app
        .server
        .get(&format!("/v1/webhooks/{}/deliveries", webhook_id))
        .await
        .json::<Value>();
    assert_eq!(history["total"], 1);
    assert_eq!(history["items"][0]["status"], "pending");
    assert_eq!(
        history["items"][0]["payload"]["metadata"]["correlationId"],
        "req-1"
    );

    let cancelled = app
        .server
        .post(&format!("/v1/deliveries/{}/cancel", delivery_id))
        .await;
    cancelled.assert_status_ok();
    assert_eq!(cancelled.json::<Value>()["status"], "cancelled");

    // 终态的投递不能再次取消
    app.server
        .post(&format!("/v1/deliveries/{}/cancel", delivery_id))
        .await
        .assert_status(StatusCode::CONFLICT);

    let id = Uuid::parse_str(&delivery_id).unwrap();
    let stored = app.deliveries.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeliveryStatus::Cancelled);
}

#[tokio::test]
async fn test_publish_event_without_subscribers() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/v1/events")
        .json(&json!({"event_type": "cycle:created", "organization_id": Uuid::new_v4()}))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    assert_eq!(
        response.json::<Value>()["deliveries"].as_array().map(Vec::len),
        Some(0)
    );

    app.server
        .post("/v1/events")
        .json(&json!({"event_type": "", "organization_id": Uuid::new_v4()}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_test_endpoint() {
    let app = create_test_app().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Webhook-Event", "ping"))
        .and(header("User-Agent", TEST_USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .expect(1)
        .mount(&server)
        .await;

    let created = create_webhook(
        &app,
        Uuid::new_v4(),
        json!({"name": "Ping", "url": server.uri(), "secret": "whsec_ping"}),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let result = app
        .server
        .post(&format!("/v1/webhooks/{}/test", id))
        .json(&json!({"event": "ping"}))
        .await;
    result.assert_status_ok();
    let result = result.json::<Value>();
    assert_eq!(result["success"], true);
    assert_eq!(result["status_code"], 200);
    assert_eq!(result["response"], "pong");

    let requests = server.received_requests().await.unwrap();
    let signature = requests[0]
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(signature_service::verify(&requests[0].body, "whsec_ping", signature));
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["data"]["test"], true);

    // 测试投递不写入投递历史
    let history = app
        .server
        .get(&format!("/v1/webhooks/{}/deliveries", id))
        .await
        .json::<Value>();
    assert_eq!(history["total"], 0);

    // 停用的Webhook不能测试
    app.server
        .post(&format!("/v1/webhooks/{}/deactivate", id))
        .await
        .assert_status_ok();
    app.server
        .post(&format!("/v1/webhooks/{}/test", id))
        .json(&json!({"event": "ping"}))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_webhook_test_endpoint_truncates_response() {
    let app = create_test_app().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(100_000)))
        .expect(1)
        .mount(&server)
        .await;

    let created = create_webhook(
        &app,
        Uuid::new_v4(),
        json!({"name": "Large", "url": server.uri()}),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let result = app
        .server
        .post(&format!("/v1/webhooks/{}/test", id))
        .json(&json!({"event": "ping"}))
        .await;
    result.assert_status_ok();
    let result = result.json::<Value>();
    assert_eq!(result["success"], true);
    let response = result["response"].as_str().unwrap();
    assert_eq!(
        response.chars().count(),
        WebhookSettings::default().max_response_body_chars
    );
}
