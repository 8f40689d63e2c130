use super::*;
use crate::domain::models::webhook::{Webhook, WebhookPayload};
use chrono::Duration;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use serde_json::json;

async fn setup_repo() -> WebhookDeliveryRepoImpl {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let db = Arc::new(db);
    Migrator::up(db.as_ref(), None).await.unwrap();
    WebhookDeliveryRepoImpl::new(db)
}

fn new_delivery(webhook: &Webhook) -> WebhookDelivery {
    let payload = WebhookPayload::new(
        "order:created",
        webhook.organization_id,
        json!({"order_id": 42}),
        "corr-1",
    );
    WebhookDelivery::new(webhook, &payload).unwrap()
}

fn webhook() -> Webhook {
    Webhook::new(
        Uuid::new_v4(),
        "orders".to_string(),
        "https://hooks.example.test/orders".to_string(),
    )
}

#[tokio::test]
async fn test_create_and_find_pending() {
    let repo = setup_repo().await;
    let delivery = new_delivery(&webhook());
    repo.create(&delivery).await.unwrap();

    let pending = repo.find_pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, delivery.id);
    assert_eq!(pending[0].status, DeliveryStatus::Pending);
    assert_eq!(pending[0].max_attempts, 3);
    assert_eq!(pending[0].payload, delivery.payload);
}

#[tokio::test]
async fn test_claim_only_succeeds_once() {
    let repo = setup_repo().await;
    let delivery = new_delivery(&webhook());
    repo.create(&delivery).await.unwrap();

    let now = Utc::now();
    assert!(repo.claim(delivery.id, DeliveryStatus::Pending, now).await.unwrap());
    assert!(!repo.claim(delivery.id, DeliveryStatus::Pending, now).await.unwrap());

    let stored = repo.find_by_id(delivery.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeliveryStatus::Delivering);
    assert!(stored.last_attempt_at.is_some());
    assert!(repo.find_pending(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_finish_attempt_requires_delivering() {
    let repo = setup_repo().await;
    let mut delivery = new_delivery(&webhook());
    repo.create(&delivery).await.unwrap();

    let now = Utc::now();
    delivery.begin_attempt(now).unwrap();
    delivery
        .schedule_retry(now, now + Duration::seconds(1), Some(503), "unavailable".into())
        .unwrap();

    // 未认领时写回无效
    assert!(!repo.finish_attempt(&delivery, now).await.unwrap());

    assert!(repo.claim(delivery.id, DeliveryStatus::Pending, now).await.unwrap());
    assert!(repo.finish_attempt(&delivery, now).await.unwrap());

    let stored = repo.find_by_id(delivery.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeliveryStatus::Retrying);
    assert_eq!(stored.attempts, 1);
    assert_eq!(stored.last_attempt_status, Some(503));
    assert_eq!(stored.last_attempt_response.as_deref(), Some("unavailable"));
    assert!(stored.next_retry_at.is_some());
}

#[tokio::test]
async fn test_finish_attempt_rejects_superseded_claim() {
    let repo = setup_repo().await;
    let mut first = new_delivery(&webhook());
    repo.create(&first).await.unwrap();
    let mut second = first.clone();

    // 第一次认领卡住，被重置后由另一个工作器重新认领
    let first_claim = Utc::now() - Duration::minutes(10);
    assert!(repo
        .claim(first.id, DeliveryStatus::Pending, first_claim)
        .await
        .unwrap());
    let now = Utc::now();
    assert_eq!(repo.reset_stale(now - Duration::minutes(5), now).await.unwrap(), 1);
    let second_claim = Utc::now();
    assert!(repo
        .claim(second.id, DeliveryStatus::Retrying, second_claim)
        .await
        .unwrap());

    first.begin_attempt(first_claim).unwrap();
    first
        .mark_delivered(Utc::now(), 200, Some("late".into()))
        .unwrap();
    assert!(!repo.finish_attempt(&first, first_claim).await.unwrap());

    let stored = repo.find_by_id(first.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeliveryStatus::Delivering);

    second.begin_attempt(second_claim).unwrap();
    second
        .mark_delivered(Utc::now(), 204, None)
        .unwrap();
    assert!(repo.finish_attempt(&second, second_claim).await.unwrap());

    let stored = repo.find_by_id(first.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeliveryStatus::Delivered);
    assert_eq!(stored.last_attempt_status, Some(204));
}

#[tokio::test]
async fn test_find_due_retries_respects_next_retry_at() {
    let repo = setup_repo().await;
    let hook = webhook();
    let now = Utc::now();

    let mut due = new_delivery(&hook);
    due.status = DeliveryStatus::Retrying;
    due.next_retry_at = Some(now - Duration::seconds(5));
    let mut later = new_delivery(&hook);
    later.status = DeliveryStatus::Retrying;
    later.next_retry_at = Some(now + Duration::minutes(5));
    repo.create(&due).await.unwrap();
    repo.create(&later).await.unwrap();

    let found = repo.find_due_retries(now, 10).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, due.id);

    let found = repo
        .find_due_retries(now + Duration::minutes(10), 10)
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn test_cancel_only_pending_or_retrying() {
    let repo = setup_repo().await;
    let hook = webhook();
    let now = Utc::now();

    let pending = new_delivery(&hook);
    repo.create(&pending).await.unwrap();
    let cancelled = repo.cancel(pending.id, now).await.unwrap().unwrap();
    assert_eq!(cancelled.status, DeliveryStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());

    // 已经是终态
    assert!(repo.cancel(pending.id, now).await.unwrap().is_none());

    let mut delivered = new_delivery(&hook);
    delivered.status = DeliveryStatus::Delivered;
    delivered.completed_at = Some(now);
    repo.create(&delivered).await.unwrap();
    assert!(repo.cancel(delivered.id, now).await.unwrap().is_none());

    assert!(repo.cancel(Uuid::new_v4(), now).await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancelled_delivery_cannot_be_claimed() {
    let repo = setup_repo().await;
    let delivery = new_delivery(&webhook());
    repo.create(&delivery).await.unwrap();

    repo.cancel(delivery.id, Utc::now()).await.unwrap();
    assert!(!repo
        .claim(delivery.id, DeliveryStatus::Pending, Utc::now())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_reset_stale_returns_claims_to_retry_queue() {
    let repo = setup_repo().await;
    let delivery = new_delivery(&webhook());
    repo.create(&delivery).await.unwrap();

    let claimed_at = Utc::now() - Duration::minutes(10);
    repo.claim(delivery.id, DeliveryStatus::Pending, claimed_at)
        .await
        .unwrap();

    let now = Utc::now();
    // 阈值早于认领时间，不应重置
    assert_eq!(
        repo.reset_stale(claimed_at - Duration::minutes(1), now)
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        repo.reset_stale(now - Duration::minutes(5), now)
            .await
            .unwrap(),
        1
    );

    let stored = repo.find_by_id(delivery.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeliveryStatus::Retrying);
    assert_eq!(stored.attempts, 0);
    assert_eq!(repo.find_due_retries(now, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_by_webhook_newest_first() {
    let repo = setup_repo().await;
    let hook = webhook();

    let mut older = new_delivery(&hook);
    older.created_at = Utc::now() - Duration::hours(1);
    let newer = new_delivery(&hook);
    let other = new_delivery(&webhook());
    for delivery in [&older, &newer, &other] {
        repo.create(delivery).await.unwrap();
    }

    let (items, total) = repo.list_by_webhook(hook.id, 0, 10).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(items[0].id, newer.id);
    assert_eq!(items[1].id, older.id);

    let (items, total) = repo.list_by_webhook(hook.id, 1, 10).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(items.len(), 1);
}
