// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::pagination::{Page, Pagination};
use crate::domain::models::webhook::{NewWebhook, Webhook, WebhookEventConfig, WebhookUpdate};
use crate::domain::models::webhook_delivery::{DeliveryStatus, WebhookDelivery};
use crate::domain::repositories::webhook_delivery_repository::WebhookDeliveryRepository;
use crate::domain::repositories::webhook_repository::WebhookRepository;
use crate::domain::services::registry_events::{RegistryEvent, RegistryEventPublisher};
use crate::domain::services::signature_service;
use crate::utils::errors::WebhookError;
use crate::utils::retry_policy::RetryPolicy;
use crate::utils::validators;
use chrono::Utc;
use metrics::counter;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Webhook注册服务
///
/// 负责Webhook的增删改查、启停、密钥轮换，以及投递历史的读取与取消
pub struct WebhookRegistry<W, D>
where
    W: WebhookRepository,
    D: WebhookDeliveryRepository,
{
    webhooks: Arc<W>,
    deliveries: Arc<D>,
    publisher: Arc<dyn RegistryEventPublisher>,
}

impl<W, D> WebhookRegistry<W, D>
where
    W: WebhookRepository,
    D: WebhookDeliveryRepository,
{
    pub fn new(
        webhooks: Arc<W>,
        deliveries: Arc<D>,
        publisher: Arc<dyn RegistryEventPublisher>,
    ) -> Self {
        Self {
            webhooks,
            deliveries,
            publisher,
        }
    }

    /// 创建Webhook
    ///
    /// 校验URL协议；未提供密钥时生成随机密钥；重试策略在默认值上合并覆盖字段
    pub async fn create(
        &self,
        organization_id: Uuid,
        input: NewWebhook,
    ) -> Result<Webhook, WebhookError> {
        let name = require_name(&input.name)?;
        let url = validate_url(&input.url)?;
        validate_events(&input.events)?;
        validate_headers(&input.headers)?;

        let retry_policy = match &input.retry_policy {
            Some(overrides) => RetryPolicy::default().merge(overrides),
            None => RetryPolicy::default(),
        };
        retry_policy.validate().map_err(WebhookError::Validation)?;

        let mut webhook = Webhook::new(organization_id, name, url);
        webhook.description = input.description;
        webhook.events = input.events;
        webhook.is_active = input.is_active.unwrap_or(true);
        webhook.secret = Some(
            input
                .secret
                .filter(|s| !s.is_empty())
                .unwrap_or_else(signature_service::generate_secret),
        );
        webhook.headers = input.headers;
        webhook.retry_policy = retry_policy;

        let webhook = self.webhooks.create(&webhook).await?;

        info!(
            webhook_id = %webhook.id,
            organization_id = %organization_id,
            "Webhook created"
        );
        counter!("webhooks_created_total").increment(1);
        self.publisher
            .publish(RegistryEvent::Created(webhook.clone()))
            .await;

        Ok(webhook)
    }

    /// 根据ID读取Webhook
    pub async fn get(&self, id: Uuid) -> Result<Webhook, WebhookError> {
        self.webhooks
            .find_by_id(id)
            .await?
            .ok_or(WebhookError::WebhookNotFound(id))
    }

    /// 按组织分页列出Webhook
    pub async fn list(
        &self,
        organization_id: Uuid,
        pagination: Pagination,
    ) -> Result<Page<Webhook>, WebhookError> {
        let (items, total) = self
            .webhooks
            .list_by_organization(organization_id, pagination.offset(), pagination.limit)
            .await?;
        Ok(Page::new(items, total, pagination))
    }

    /// 更新Webhook
    ///
    /// URL变更时重新校验；请求头与重试策略按字段合并
    pub async fn update(&self, id: Uuid, changes: WebhookUpdate) -> Result<Webhook, WebhookError> {
        let mut webhook = self.get(id).await?;

        if let Some(name) = changes.name {
            webhook.name = require_name(&name)?;
        }
        if let Some(description) = changes.description {
            webhook.description = Some(description).filter(|d| !d.is_empty());
        }
        if let Some(url) = changes.url {
            webhook.url = validate_url(&url)?;
        }
        if let Some(events) = changes.events {
            validate_events(&events)?;
            webhook.events = events;
        }
        if let Some(is_active) = changes.is_active {
            webhook.is_active = is_active;
        }
        if let Some(secret) = changes.secret {
            webhook.secret = Some(secret).filter(|s| !s.is_empty());
        }
        if let Some(headers) = changes.headers {
            validate_headers(&headers)?;
            webhook.headers.extend(headers);
        }
        if let Some(overrides) = changes.retry_policy {
            let merged = webhook.retry_policy.merge(&overrides);
            merged.validate().map_err(WebhookError::Validation)?;
            webhook.retry_policy = merged;
        }

        self.save(webhook).await
    }

    /// 删除Webhook，投递历史保留
    pub async fn delete(&self, id: Uuid) -> Result<(), WebhookError> {
        let webhook = self.get(id).await?;

        if !self.webhooks.delete(id).await? {
            return Err(WebhookError::WebhookNotFound(id));
        }

        info!(webhook_id = %id, "Webhook deleted");
        self.publisher.publish(RegistryEvent::Deleted(webhook)).await;
        Ok(())
    }

    /// 启用或停用Webhook
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<Webhook, WebhookError> {
        let mut webhook = self.get(id).await?;
        if webhook.is_active == active {
            return Ok(webhook);
        }
        webhook.is_active = active;
        self.save(webhook).await
    }

    /// 轮换签名密钥，下一次投递尝试即使用新密钥
    pub async fn rotate_secret(&self, id: Uuid) -> Result<Webhook, WebhookError> {
        let mut webhook = self.get(id).await?;
        webhook.secret = Some(signature_service::generate_secret());
        info!(webhook_id = %id, "Webhook secret rotated");
        self.save(webhook).await
    }

    /// 分页读取某个Webhook的投递历史
    pub async fn deliveries(
        &self,
        webhook_id: Uuid,
        pagination: Pagination,
    ) -> Result<Page<WebhookDelivery>, WebhookError> {
        let (items, total) = self
            .deliveries
            .list_by_webhook(webhook_id, pagination.offset(), pagination.limit)
            .await?;
        Ok(Page::new(items, total, pagination))
    }

    /// 读取单条投递记录
    pub async fn get_delivery(&self, id: Uuid) -> Result<WebhookDelivery, WebhookError> {
        self.deliveries
            .find_by_id(id)
            .await?
            .ok_or(WebhookError::DeliveryNotFound(id))
    }

    /// 取消尚未完成的投递
    ///
    /// 只有 Pending 与 Retrying 可被取消
    pub async fn cancel_delivery(&self, id: Uuid) -> Result<WebhookDelivery, WebhookError> {
        if let Some(cancelled) = self.deliveries.cancel(id, Utc::now()).await? {
            info!(delivery_id = %id, "Webhook delivery cancelled");
            counter!("webhook_deliveries_cancelled_total").increment(1);
            return Ok(cancelled);
        }

        let current = self.get_delivery(id).await?;
        Err(WebhookError::InvalidTransition {
            from: current.status,
            to: DeliveryStatus::Cancelled,
        })
    }

    async fn save(&self, mut webhook: Webhook) -> Result<Webhook, WebhookError> {
        webhook.updated_at = Utc::now();
        let webhook = self.webhooks.update(&webhook).await?;
        self.publisher
            .publish(RegistryEvent::Updated(webhook.clone()))
            .await;
        Ok(webhook)
    }
}

fn require_name(name: &str) -> Result<String, WebhookError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(WebhookError::Validation("name cannot be empty".to_string()));
    }
    Ok(name.to_string())
}

fn validate_url(url: &str) -> Result<String, WebhookError> {
    validators::validate_webhook_url(url)
        .map(|_| url.trim().to_string())
        .map_err(|e| WebhookError::Validation(e.to_string()))
}

fn validate_events(events: &[WebhookEventConfig]) -> Result<(), WebhookError> {
    events
        .iter()
        .try_for_each(|config| validators::validate_event_type(&config.event))
        .map_err(|e| WebhookError::Validation(e.to_string()))
}

fn validate_headers(headers: &BTreeMap<String, String>) -> Result<(), WebhookError> {
    headers
        .iter()
        .try_for_each(|(name, value)| validators::validate_header(name, value))
        .map_err(|e| WebhookError::Validation(e.to_string()))
}

#[cfg(test)]
#[path = "webhook_registry_test.rs"]
mod tests;
