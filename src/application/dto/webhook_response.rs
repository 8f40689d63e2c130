// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::pagination::Page;
use crate::domain::models::webhook::{Webhook, WebhookEventConfig};
use crate::domain::models::webhook_delivery::{DeliveryStatus, WebhookDelivery};
use crate::utils::retry_policy::RetryPolicy;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Webhook响应
///
/// 密钥默认不返回，仅在创建和轮换时通过 [`WebhookResponseDto::with_secret`] 附带
#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponseDto {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
    pub events: Vec<WebhookEventConfig>,
    pub is_active: bool,
    pub has_secret: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub retry_policy: RetryPolicy,
    pub delivery_attempts: i64,
    pub last_delivery_attempt: Option<DateTime<Utc>>,
    pub last_successful_delivery: Option<DateTime<Utc>>,
    pub last_failed_delivery: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookResponseDto {
    /// 附带明文密钥
    pub fn with_secret(webhook: Webhook) -> Self {
        let secret = webhook.secret.clone();
        Self {
            secret,
            ..Self::from(webhook)
        }
    }
}

impl From<Webhook> for WebhookResponseDto {
    fn from(webhook: Webhook) -> Self {
        Self {
            id: webhook.id,
            organization_id: webhook.organization_id,
            name: webhook.name,
            description: webhook.description,
            url: webhook.url,
            events: webhook.events,
            is_active: webhook.is_active,
            has_secret: webhook.secret.is_some(),
            secret: None,
            headers: webhook.headers,
            retry_policy: webhook.retry_policy,
            delivery_attempts: webhook.delivery_attempts,
            last_delivery_attempt: webhook.last_delivery_attempt,
            last_successful_delivery: webhook.last_successful_delivery,
            last_failed_delivery: webhook.last_failed_delivery,
            failure_reason: webhook.failure_reason,
            created_at: webhook.created_at,
            updated_at: webhook.updated_at,
        }
    }
}

/// 投递记录响应
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResponseDto {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub organization_id: Uuid,
    pub event: String,
    pub payload: Value,
    pub status: DeliveryStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_attempt_status: Option<i32>,
    pub last_attempt_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<WebhookDelivery> for DeliveryResponseDto {
    fn from(delivery: WebhookDelivery) -> Self {
        Self {
            id: delivery.id,
            webhook_id: delivery.webhook_id,
            organization_id: delivery.organization_id,
            event: delivery.event,
            payload: delivery.payload,
            status: delivery.status,
            attempts: delivery.attempts,
            max_attempts: delivery.max_attempts,
            next_retry_at: delivery.next_retry_at,
            last_attempt_at: delivery.last_attempt_at,
            last_attempt_status: delivery.last_attempt_status,
            last_attempt_response: delivery.last_attempt_response,
            created_at: delivery.created_at,
            updated_at: delivery.updated_at,
            completed_at: delivery.completed_at,
        }
    }
}

/// 分页响应
#[derive(Debug, Clone, Serialize)]
pub struct PageResponseDto<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T, U: Into<T>> From<Page<U>> for PageResponseDto<T> {
    fn from(page: Page<U>) -> Self {
        let page = page.map(Into::into);
        Self {
            items: page.items,
            total: page.total,
            page: page.page,
            limit: page.limit,
            has_next: page.has_next,
            has_prev: page.has_prev,
        }
    }
}

/// 事件分发结果
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResponseDto {
    pub event_type: String,
    pub deliveries: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_masked_by_default() {
        let mut webhook = Webhook::new(Uuid::new_v4(), "hook".into(), "https://a.test".into());
        webhook.secret = Some("whsec".into());

        let masked = serde_json::to_value(WebhookResponseDto::from(webhook.clone())).unwrap();
        assert_eq!(masked["has_secret"], true);
        assert!(masked.get("secret").is_none());

        let revealed = serde_json::to_value(WebhookResponseDto::with_secret(webhook)).unwrap();
        assert_eq!(revealed["secret"], "whsec");
    }
}
