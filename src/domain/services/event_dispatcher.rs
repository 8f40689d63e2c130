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

use crate::domain::models::webhook::WebhookPayload;
use crate::domain::models::webhook_delivery::WebhookDelivery;
use crate::domain::repositories::webhook_delivery_repository::WebhookDeliveryRepository;
use crate::domain::repositories::webhook_repository::WebhookRepository;
use crate::utils::errors::WebhookError;
use metrics::counter;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// 领域事件
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    /// 事件类型，例如 `feedback:submitted`
    pub event_type: String,
    /// 事件数据，结构由调用方决定
    pub data: Value,
    /// 所属组织
    pub organization_id: Uuid,
    /// 关联ID，缺省时自动生成
    pub correlation_id: Option<String>,
}

/// 事件分发器
///
/// 将一个领域事件扇出为多条待投递记录。分发路径只负责入队，
/// 不发起任何HTTP请求。
pub struct EventDispatcher<W, D>
where
    W: WebhookRepository,
    D: WebhookDeliveryRepository,
{
    webhooks: Arc<W>,
    deliveries: Arc<D>,
}

impl<W, D> EventDispatcher<W, D>
where
    W: WebhookRepository,
    D: WebhookDeliveryRepository,
{
    pub fn new(webhooks: Arc<W>, deliveries: Arc<D>) -> Self {
        Self {
            webhooks,
            deliveries,
        }
    }

    /// 处理领域事件
    ///
    /// # 参数
    ///
    /// * `event_type` - 事件类型
    /// * `data` - 事件数据
    /// * `organization_id` - 所属组织
    ///
    /// # 返回值
    ///
    /// 新建的投递记录（每个匹配的Webhook一条）
    pub async fn process_event(
        &self,
        event_type: &str,
        data: Value,
        organization_id: Uuid,
    ) -> Result<Vec<WebhookDelivery>, WebhookError> {
        self.dispatch(DomainEvent {
            event_type: event_type.to_string(),
            data,
            organization_id,
            correlation_id: None,
        })
        .await
    }

    /// 分发领域事件，可携带调用方的关联ID
    pub async fn dispatch(&self, event: DomainEvent) -> Result<Vec<WebhookDelivery>, WebhookError> {
        let matching: Vec<_> = self
            .webhooks
            .find_active_by_organization(event.organization_id)
            .await?
            .into_iter()
            .filter(|webhook| webhook.accepts(&event.event_type, &event.data))
            .collect();

        if matching.is_empty() {
            debug!(
                event_type = %event.event_type,
                organization_id = %event.organization_id,
                "No active webhooks subscribed to event"
            );
            return Ok(Vec::new());
        }

        let correlation_id = event
            .correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut created = Vec::with_capacity(matching.len());
        for webhook in &matching {
            let payload = WebhookPayload::new(
                event.event_type.clone(),
                event.organization_id,
                event.data.clone(),
                correlation_id.clone(),
            );
            let delivery = WebhookDelivery::new(webhook, &payload)?;

            // 单个Webhook入队失败不影响其他Webhook
            match self.deliveries.create(&delivery).await {
                Ok(delivery) => created.push(delivery),
                Err(e) => {
                    error!(
                        webhook_id = %webhook.id,
                        event_type = %event.event_type,
                        error = %e,
                        "Failed to enqueue webhook delivery"
                    );
                    counter!("webhook_enqueue_failed_total").increment(1);
                }
            }
        }

        info!(
            event_type = %event.event_type,
            organization_id = %event.organization_id,
            correlation_id = %correlation_id,
            matched = matching.len(),
            enqueued = created.len(),
            "Event dispatched to webhooks"
        );
        counter!("webhook_deliveries_enqueued_total").increment(created.len() as u64);

        Ok(created)
    }
}

#[cfg(test)]
#[path = "event_dispatcher_test.rs"]
mod tests;
