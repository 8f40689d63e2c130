// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::webhook::Webhook;
use async_trait::async_trait;
use tracing::info;

/// Webhook注册表变更事件，携带变更后的完整实体
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    Created(Webhook),
    Updated(Webhook),
    Deleted(Webhook),
}

impl RegistryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::Created(_) => "webhook.created",
            RegistryEvent::Updated(_) => "webhook.updated",
            RegistryEvent::Deleted(_) => "webhook.deleted",
        }
    }

    pub fn webhook(&self) -> &Webhook {
        match self {
            RegistryEvent::Created(w) | RegistryEvent::Updated(w) | RegistryEvent::Deleted(w) => w,
        }
    }
}

/// 注册表事件发布者
#[async_trait]
pub trait RegistryEventPublisher: Send + Sync {
    async fn publish(&self, event: RegistryEvent);
}

/// 将注册表事件写入日志
#[derive(Debug, Default, Clone)]
pub struct TracingEventPublisher;

#[async_trait]
impl RegistryEventPublisher for TracingEventPublisher {
    async fn publish(&self, event: RegistryEvent) {
        let webhook = event.webhook();
        info!(
            event = event.name(),
            webhook_id = %webhook.id,
            organization_id = %webhook.organization_id,
            is_active = webhook.is_active,
            "Webhook registry changed"
        );
    }
}
