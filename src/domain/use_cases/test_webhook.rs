// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::webhook::WebhookPayload;
use crate::domain::repositories::webhook_repository::WebhookRepository;
use crate::domain::services::webhook_service::{OutboundRequest, WebhookService};
use crate::utils::errors::WebhookError;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 测试投递结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestDeliveryResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 测试Webhook连通性
///
/// 同步发起一次投递并立即返回结果：不写投递记录，不安排重试
pub struct TestWebhookUseCase<W: WebhookRepository> {
    webhooks: Arc<W>,
    sender: Arc<dyn WebhookService>,
    user_agent: String,
    /// 返回给调用方的响应体最大字符数
    max_response_chars: usize,
}

impl<W: WebhookRepository> TestWebhookUseCase<W> {
    pub fn new(
        webhooks: Arc<W>,
        sender: Arc<dyn WebhookService>,
        user_agent: String,
        max_response_chars: usize,
    ) -> Self {
        Self {
            webhooks,
            sender,
            user_agent,
            max_response_chars,
        }
    }

    fn truncate(&self, text: &str) -> String {
        text.chars().take(self.max_response_chars).collect()
    }

    /// 执行测试投递
    ///
    /// # 参数
    ///
    /// * `webhook_id` - 目标Webhook
    /// * `event_type` - 事件类型
    /// * `data` - 事件数据，缺省时使用固定的测试数据
    ///
    /// # 返回值
    ///
    /// * `Ok(TestDeliveryResult)` - 已发起请求（成功或失败都在结果中体现）
    /// * `Err(WebhookError)` - Webhook不存在或未启用
    pub async fn execute(
        &self,
        webhook_id: Uuid,
        event_type: &str,
        data: Option<Value>,
    ) -> Result<TestDeliveryResult, WebhookError> {
        let webhook = self
            .webhooks
            .find_by_id(webhook_id)
            .await?
            .ok_or(WebhookError::WebhookNotFound(webhook_id))?;

        if !webhook.is_active {
            return Err(WebhookError::WebhookInactive(webhook_id));
        }

        let data = data.unwrap_or_else(|| {
            json!({
                "test": true,
                "message": "This is a test webhook delivery",
            })
        });
        let payload = WebhookPayload::new(
            event_type,
            webhook.organization_id,
            data,
            Uuid::new_v4().to_string(),
        );
        let body = serde_json::to_string(&payload)?;
        let request = OutboundRequest::for_webhook(
            &webhook,
            event_type,
            &payload.id.to_string(),
            body,
            &self.user_agent,
        );

        let result = match self.sender.send(&request).await {
            Ok(response) => TestDeliveryResult {
                success: true,
                status_code: Some(response.status),
                response: Some(self.truncate(&response.body)),
                error: None,
            },
            Err(e) => TestDeliveryResult {
                success: false,
                status_code: e.status_code(),
                response: None,
                error: Some(self.truncate(&e.to_string())),
            },
        };

        info!(
            webhook_id = %webhook_id,
            event_type = %event_type,
            success = result.success,
            "Test webhook delivery finished"
        );

        Ok(result)
    }
}
