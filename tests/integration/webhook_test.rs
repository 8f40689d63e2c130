// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::create_test_app;
use chrono::Utc;
use serde_json::json;
use std::time::Duration;
use webhook_relay::domain::models::webhook::{NewWebhook, WebhookEventConfig, WebhookUpdate};
use webhook_relay::domain::models::webhook_delivery::DeliveryStatus;
use webhook_relay::domain::repositories::webhook_delivery_repository::WebhookDeliveryRepository;
use webhook_relay::domain::repositories::webhook_repository::WebhookRepository;
use webhook_relay::domain::services::signature_service::{self, SIGNATURE_HEADER};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 从订阅、入队、失败重试到最终投递成功的完整流程
#[tokio::test]
async fn test_delivery_lifecycle_with_retry() {
    let app = create_test_app().await;
    let registry = &app.services.registry;
    let dispatcher = &app.services.dispatcher;
    let org = uuid::Uuid::new_v4();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/cycles"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hooks/cycles"))
        .and(header("X-Webhook-Event", "cycle:created"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    // 未订阅任何事件时不产生投递
    let webhook = registry
        .create(
            org,
            NewWebhook {
                name: "Cycles".to_string(),
                url: format!("{}/hooks/cycles", server.uri()),
                secret: Some("whsec_e2e".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let created = dispatcher
        .process_event("cycle:created", json!({"cycle_id": "c-1"}), org)
        .await
        .unwrap();
    assert!(created.is_empty());

    registry
        .update(
            webhook.id,
            WebhookUpdate {
                events: Some(vec![WebhookEventConfig::enabled("cycle:created")]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let created = dispatcher
        .process_event("cycle:created", json!({"cycle_id": "c-1"}), org)
        .await
        .unwrap();
    assert_eq!(created.len(), 1);
    let delivery = &created[0];
    assert_eq!(delivery.status, DeliveryStatus::Pending);
    assert_eq!(delivery.attempts, 0);
    assert_eq!(delivery.max_attempts, 3);

    // 第一次尝试返回500，按默认策略1秒后重试
    let before = Utc::now();
    let summary = app.worker.run_once().await.unwrap();
    assert_eq!(summary.retrying, 1);

    let stored = app.deliveries.find_by_id(delivery.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeliveryStatus::Retrying);
    assert_eq!(stored.attempts, 1);
    assert_eq!(stored.last_attempt_status, Some(500));
    assert_eq!(stored.last_attempt_response.as_deref(), Some("boom"));
    let delay = stored.next_retry_at.unwrap() - before;
    assert!(delay.num_milliseconds() >= 900 && delay.num_milliseconds() <= 2000);

    // 未到期时不会重发
    let summary = app.worker.run_once().await.unwrap();
    assert_eq!(summary.processed(), 0);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    let summary = app.worker.run_once().await.unwrap();
    assert_eq!(summary.delivered, 1);

    let stored = app.deliveries.find_by_id(delivery.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeliveryStatus::Delivered);
    assert_eq!(stored.attempts, 1);
    assert_eq!(stored.last_attempt_status, Some(200));
    assert!(stored.completed_at.is_some());
    assert!(stored.next_retry_at.is_none());

    let webhook = app.webhooks.find_by_id(webhook.id).await.unwrap().unwrap();
    assert_eq!(webhook.delivery_attempts, 2);
    assert!(webhook.last_successful_delivery.is_some());
    assert!(webhook.last_failed_delivery.is_some());
    assert!(webhook.failure_reason.is_none());

    // 两次请求携带同一负载，签名均可用密钥验证
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body, requests[1].body);
    for request in &requests {
        let signature = request
            .headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(signature_service::verify(&request.body, "whsec_e2e", signature));
    }
}

/// 重试耗尽后进入最终失败状态，并记录到Webhook健康信息
#[tokio::test]
async fn test_exhausted_retries_mark_webhook_failed() {
    let app = create_test_app().await;
    let org = uuid::Uuid::new_v4();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let webhook = app
        .services
        .registry
        .create(
            org,
            NewWebhook {
                name: "Flaky".to_string(),
                url: server.uri(),
                events: vec![WebhookEventConfig::enabled("feedback:submitted")],
                retry_policy: Some(webhook_relay::utils::retry_policy::RetryPolicyOverrides {
                    max_attempts: Some(2),
                    initial_delay_ms: Some(1),
                    max_delay_ms: Some(5),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let created = app
        .services
        .dispatcher
        .process_event("feedback:submitted", json!({}), org)
        .await
        .unwrap();
    assert_eq!(created.len(), 1);

    for _ in 0..4 {
        app.worker.run_once().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let stored = app
        .deliveries
        .find_by_id(created[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, DeliveryStatus::Failed);
    assert_eq!(stored.attempts, 2);
    assert!(stored.completed_at.is_some());

    let webhook = app.webhooks.find_by_id(webhook.id).await.unwrap().unwrap();
    assert!(webhook.failure_reason.is_some());
    assert!(webhook.last_successful_delivery.is_none());
}
