use super::*;
use crate::domain::models::webhook::{Webhook, WebhookEventConfig};
use crate::domain::models::webhook_delivery::DeliveryStatus;
use crate::infrastructure::repositories::webhook_delivery_repo_impl::WebhookDeliveryRepoImpl;
use crate::infrastructure::repositories::webhook_repo_impl::WebhookRepoImpl;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use serde_json::json;

struct Fixture {
    dispatcher: EventDispatcher<WebhookRepoImpl, WebhookDeliveryRepoImpl>,
    webhooks: Arc<WebhookRepoImpl>,
    deliveries: Arc<WebhookDeliveryRepoImpl>,
}

async fn setup() -> Fixture {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let db = Arc::new(db);
    Migrator::up(db.as_ref(), None).await.unwrap();

    let webhooks = Arc::new(WebhookRepoImpl::new(db.clone()));
    let deliveries = Arc::new(WebhookDeliveryRepoImpl::new(db));
    Fixture {
        dispatcher: EventDispatcher::new(webhooks.clone(), deliveries.clone()),
        webhooks,
        deliveries,
    }
}

impl Fixture {
    async fn register(&self, org: Uuid, events: Vec<WebhookEventConfig>, active: bool) -> Webhook {
        let mut webhook = Webhook::new(org, "hook".to_string(), "https://example.test/hook".to_string());
        webhook.events = events;
        webhook.is_active = active;
        self.webhooks.create(&webhook).await.unwrap()
    }
}

#[tokio::test]
async fn test_one_delivery_per_subscribed_active_webhook() {
    let f = setup().await;
    let org = Uuid::new_v4();

    let a = f
        .register(org, vec![WebhookEventConfig::enabled("cycle:created")], true)
        .await;
    let b = f
        .register(
            org,
            vec![
                WebhookEventConfig::enabled("feedback:submitted"),
                WebhookEventConfig::enabled("cycle:created"),
            ],
            true,
        )
        .await;
    // 不匹配的事件、停用的Webhook、其他组织
    f.register(org, vec![WebhookEventConfig::enabled("cycle:closed")], true)
        .await;
    f.register(org, vec![WebhookEventConfig::enabled("cycle:created")], false)
        .await;
    f.register(
        Uuid::new_v4(),
        vec![WebhookEventConfig::enabled("cycle:created")],
        true,
    )
    .await;

    let created = f
        .dispatcher
        .process_event("cycle:created", json!({"cycle_id": "c-1"}), org)
        .await
        .unwrap();

    assert_eq!(created.len(), 2);
    let mut targets: Vec<_> = created.iter().map(|d| d.webhook_id).collect();
    targets.sort();
    let mut expected = vec![a.id, b.id];
    expected.sort();
    assert_eq!(targets, expected);

    for delivery in &created {
        assert_eq!(delivery.status, DeliveryStatus::Pending);
        assert_eq!(delivery.attempts, 0);
        assert_eq!(delivery.organization_id, org);
        assert_eq!(delivery.event, "cycle:created");
    }

    assert_eq!(f.deliveries.find_pending(10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_no_match_creates_nothing() {
    let f = setup().await;
    let org = Uuid::new_v4();
    f.register(org, vec![WebhookEventConfig::enabled("cycle:created")], false)
        .await;

    let created = f
        .dispatcher
        .process_event("cycle:created", json!({}), org)
        .await
        .unwrap();
    assert!(created.is_empty());

    let created = f
        .dispatcher
        .process_event("unknown:event", json!({}), Uuid::new_v4())
        .await
        .unwrap();
    assert!(created.is_empty());
    assert!(f.deliveries.find_pending(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_disabled_subscription_is_ignored() {
    let f = setup().await;
    let org = Uuid::new_v4();
    let mut config = WebhookEventConfig::enabled("cycle:created");
    config.enabled = false;
    f.register(org, vec![config], true).await;

    let created = f
        .dispatcher
        .process_event("cycle:created", json!({}), org)
        .await
        .unwrap();
    assert!(created.is_empty());
}

#[tokio::test]
async fn test_filters_select_matching_events() {
    let f = setup().await;
    let org = Uuid::new_v4();
    let mut config = WebhookEventConfig::enabled("feedback:submitted");
    config.filters = json!({"priority": ["high", "urgent"]}).as_object().cloned();
    f.register(org, vec![config], true).await;

    let low = f
        .dispatcher
        .process_event("feedback:submitted", json!({"priority": "low"}), org)
        .await
        .unwrap();
    assert!(low.is_empty());

    let urgent = f
        .dispatcher
        .process_event("feedback:submitted", json!({"priority": "urgent"}), org)
        .await
        .unwrap();
    assert_eq!(urgent.len(), 1);
}

#[tokio::test]
async fn test_max_attempts_copied_from_policy() {
    let f = setup().await;
    let org = Uuid::new_v4();
    let mut webhook = Webhook::new(org, "hook".to_string(), "https://example.test/hook".to_string());
    webhook.events = vec![WebhookEventConfig::enabled("cycle:created")];
    webhook.retry_policy.max_attempts = 7;
    f.webhooks.create(&webhook).await.unwrap();

    let created = f
        .dispatcher
        .process_event("cycle:created", json!({}), org)
        .await
        .unwrap();
    assert_eq!(created[0].max_attempts, 7);
}

#[tokio::test]
async fn test_payload_envelope_and_shared_correlation_id() {
    let f = setup().await;
    let org = Uuid::new_v4();
    for _ in 0..2 {
        f.register(org, vec![WebhookEventConfig::enabled("cycle:created")], true)
            .await;
    }

    let created = f
        .dispatcher
        .dispatch(DomainEvent {
            event_type: "cycle:created".to_string(),
            data: json!({"cycle_id": "c-9"}),
            organization_id: org,
            correlation_id: Some("req-123".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(created.len(), 2);
    for delivery in &created {
        let payload = &delivery.payload;
        assert_eq!(payload["event"], "cycle:created");
        assert_eq!(payload["organizationId"], org.to_string());
        assert_eq!(payload["data"]["cycle_id"], "c-9");
        assert_eq!(payload["metadata"]["correlationId"], "req-123");
        assert!(payload["timestamp"].is_string());
    }
    // 每个Webhook拥有独立的负载ID
    assert_ne!(created[0].payload["id"], created[1].payload["id"]);

    let generated = f
        .dispatcher
        .process_event("cycle:created", json!({}), org)
        .await
        .unwrap();
    let correlation = &generated[0].payload["metadata"]["correlationId"];
    assert!(correlation.is_string());
    assert_eq!(correlation, &generated[1].payload["metadata"]["correlationId"]);
}
