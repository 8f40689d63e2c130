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

use crate::config::settings::WebhookSettings;
use crate::domain::models::webhook::Webhook;
use crate::domain::models::webhook_delivery::{DeliveryStatus, WebhookDelivery};
use crate::domain::repositories::webhook_delivery_repository::WebhookDeliveryRepository;
use crate::domain::repositories::webhook_repository::{AttemptOutcome, WebhookRepository};
use crate::domain::services::webhook_service::{DeliveryError, OutboundRequest, WebhookService};
use crate::utils::errors::{WebhookError, WorkerError};
use crate::workers::worker::Worker;
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// 单条投递的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 投递成功
    Delivered,
    /// 失败，已安排重试
    Retrying,
    /// 最终失败
    Failed,
    /// 未处理：尚未到期、认领失败或状态已被其他方修改
    Skipped,
}

/// 一轮轮询的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub stale_reset: u64,
    pub delivered: usize,
    pub retrying: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl PassSummary {
    fn record(&mut self, result: Result<DeliveryOutcome, WorkerError>) {
        match result {
            Ok(DeliveryOutcome::Delivered) => self.delivered += 1,
            Ok(DeliveryOutcome::Retrying) => self.retrying += 1,
            Ok(DeliveryOutcome::Failed) => self.failed += 1,
            Ok(DeliveryOutcome::Skipped) => self.skipped += 1,
            Err(_) => self.errors += 1,
        }
    }

    /// 本轮是否真正发起或终结了投递
    pub fn processed(&self) -> usize {
        self.delivered + self.retrying + self.failed
    }
}

/// Webhook投递工作器
///
/// 每一轮：回收失联的认领，读取待投递与到期重试的记录，
/// 以有限并发逐条认领并投递。多个工作器可同时运行，
/// 同一条记录只会被认领成功的那个工作器处理。
pub struct WebhookWorker<W, D>
where
    W: WebhookRepository,
    D: WebhookDeliveryRepository,
{
    /// Webhook仓库
    webhooks: Arc<W>,
    /// 投递仓库
    deliveries: Arc<D>,
    /// HTTP发送实现
    sender: Arc<dyn WebhookService>,
    /// 投递配置
    settings: WebhookSettings,
    /// 工作器名称
    name: String,
}

impl<W, D> WebhookWorker<W, D>
where
    W: WebhookRepository,
    D: WebhookDeliveryRepository,
{
    /// 创建新的Webhook工作器实例
    ///
    /// # 参数
    ///
    /// * `webhooks` - Webhook仓库
    /// * `deliveries` - 投递仓库
    /// * `sender` - HTTP发送实现
    /// * `settings` - 投递配置
    pub fn new(
        webhooks: Arc<W>,
        deliveries: Arc<D>,
        sender: Arc<dyn WebhookService>,
        settings: WebhookSettings,
    ) -> Self {
        Self {
            webhooks,
            deliveries,
            sender,
            settings,
            name: "webhook-worker".to_string(),
        }
    }

    /// 设置工作器名称，用于日志区分多个实例
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 执行一轮轮询
    ///
    /// # 返回值
    ///
    /// * `Ok(PassSummary)` - 本轮统计
    /// * `Err(WorkerError)` - 读取队列失败
    pub async fn run_once(&self) -> Result<PassSummary, WorkerError> {
        let now = Utc::now();
        let mut summary = PassSummary::default();

        let stale_after = chrono::Duration::from_std(self.settings.stale_after())
            .map_err(|e| WorkerError::InternalError(e.to_string()))?;
        summary.stale_reset = self.deliveries.reset_stale(now - stale_after, now).await?;
        if summary.stale_reset > 0 {
            warn!(
                worker = %self.name,
                count = summary.stale_reset,
                "Reset stale webhook deliveries back to retry queue"
            );
            counter!("webhook_stale_deliveries_reset_total").increment(summary.stale_reset);
        }

        let mut batch = self.deliveries.find_pending(self.settings.batch_size).await?;
        batch.extend(
            self.deliveries
                .find_due_retries(now, self.settings.batch_size)
                .await?,
        );

        if batch.is_empty() {
            return Ok(summary);
        }

        debug!(worker = %self.name, count = batch.len(), "Processing webhook deliveries");

        let results: Vec<_> = futures::stream::iter(batch)
            .map(|delivery| async move {
                let delivery_id = delivery.id;
                let result = self.process_delivery(delivery).await;
                if let Err(e) = &result {
                    error!(delivery_id = %delivery_id, error = %e, "Failed to process webhook delivery");
                }
                result
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        for result in results {
            summary.record(result);
        }

        if summary.processed() > 0 {
            info!(
                worker = %self.name,
                delivered = summary.delivered,
                retrying = summary.retrying,
                failed = summary.failed,
                skipped = summary.skipped,
                "Webhook delivery pass finished"
            );
        }

        Ok(summary)
    }

    async fn process_delivery(
        &self,
        mut delivery: WebhookDelivery,
    ) -> Result<DeliveryOutcome, WorkerError> {
        let now = Utc::now();
        // 读取后可能已被取消或被其他工作器处理
        if !delivery.is_due(now) {
            return Ok(DeliveryOutcome::Skipped);
        }
        let expected = delivery.status;

        let webhook = match self.webhooks.find_by_id(delivery.webhook_id).await? {
            Some(webhook) if webhook.is_active => webhook,
            other => {
                let reason = match other {
                    Some(_) => "webhook is inactive",
                    None => "webhook no longer exists",
                };
                return self.abandon(delivery, expected, reason).await;
            }
        };

        if !self.deliveries.claim(delivery.id, expected, now).await? {
            debug!(delivery_id = %delivery.id, "Delivery claimed elsewhere, skipping");
            return Ok(DeliveryOutcome::Skipped);
        }
        delivery.begin_attempt(now)?;

        let request = self.build_request(&webhook, &delivery)?;

        counter!("webhook_delivery_attempts_total").increment(1);
        let start = Instant::now();
        let result = self.sender.send(&request).await;
        histogram!("webhook_delivery_duration_seconds").record(start.elapsed().as_secs_f64());

        let finished_at = Utc::now();
        let (outcome, health) = match result {
            Ok(response) => {
                let body = self.truncate(&response.body);
                delivery.mark_delivered(
                    finished_at,
                    response.status,
                    Some(body).filter(|b| !b.is_empty()),
                )?;
                (DeliveryOutcome::Delivered, AttemptOutcome::Delivered)
            }
            Err(e) => self.handle_failure(&webhook, &mut delivery, e)?,
        };

        if !self.deliveries.finish_attempt(&delivery, now).await? {
            warn!(
                delivery_id = %delivery.id,
                "Delivery state changed during attempt, result discarded"
            );
            return Ok(DeliveryOutcome::Skipped);
        }

        match outcome {
            DeliveryOutcome::Delivered => {
                info!(
                    delivery_id = %delivery.id,
                    webhook_id = %webhook.id,
                    event = %delivery.event,
                    "Webhook delivered successfully"
                );
                counter!("webhook_delivery_success_total").increment(1);
            }
            DeliveryOutcome::Retrying => {
                warn!(
                    delivery_id = %delivery.id,
                    webhook_id = %webhook.id,
                    attempts = delivery.attempts,
                    next_retry_at = ?delivery.next_retry_at,
                    "Webhook delivery failed, retry scheduled"
                );
                counter!("webhook_delivery_retry_scheduled_total").increment(1);
            }
            DeliveryOutcome::Failed => {
                error!(
                    delivery_id = %delivery.id,
                    webhook_id = %webhook.id,
                    attempts = delivery.attempts,
                    status = ?delivery.last_attempt_status,
                    "Webhook delivery failed permanently"
                );
            }
            DeliveryOutcome::Skipped => {}
        }

        if let Err(e) = self
            .webhooks
            .record_delivery_attempt(webhook.id, finished_at, health)
            .await
        {
            // 健康字段仅用于展示，写入失败不影响投递结果
            error!(webhook_id = %webhook.id, error = %e, "Failed to record webhook health");
        }

        Ok(outcome)
    }

    fn handle_failure(
        &self,
        webhook: &Webhook,
        delivery: &mut WebhookDelivery,
        error: DeliveryError,
    ) -> Result<(DeliveryOutcome, AttemptOutcome), WorkerError> {
        let now = Utc::now();
        let status = error.status_code();
        let response = match &error {
            DeliveryError::Http { body, .. } => self.truncate(body),
            other => self.truncate(&other.to_string()),
        };

        let attempt = delivery.attempts + 1;
        let retryable = error.is_retryable(&webhook.retry_policy);

        if retryable && attempt < delivery.max_attempts {
            // 次数上限来自入队时的快照，退避时长取Webhook当前策略
            let next_retry_at = webhook
                .retry_policy
                .next_retry_time(u32::try_from(attempt).unwrap_or(u32::MAX), now);
            delivery.schedule_retry(now, next_retry_at, status, response)?;
            return Ok((DeliveryOutcome::Retrying, AttemptOutcome::Retrying));
        }

        let reason = if retryable { "exhausted" } else { "non_retryable" };
        counter!("webhook_delivery_failed_total", "reason" => reason).increment(1);
        delivery.mark_failed(now, status, response)?;
        Ok((
            DeliveryOutcome::Failed,
            AttemptOutcome::Failed(self.truncate(&error.to_string())),
        ))
    }

    /// Webhook已被删除或停用：认领后直接终结，不计入尝试次数
    async fn abandon(
        &self,
        mut delivery: WebhookDelivery,
        expected: DeliveryStatus,
        reason: &str,
    ) -> Result<DeliveryOutcome, WorkerError> {
        let now = Utc::now();
        if !self.deliveries.claim(delivery.id, expected, now).await? {
            return Ok(DeliveryOutcome::Skipped);
        }

        delivery.begin_attempt(now)?;
        delivery.abandon(now, reason.to_string())?;
        if !self.deliveries.finish_attempt(&delivery, now).await? {
            return Ok(DeliveryOutcome::Skipped);
        }

        warn!(
            delivery_id = %delivery.id,
            webhook_id = %delivery.webhook_id,
            reason,
            "Webhook delivery abandoned"
        );
        counter!("webhook_delivery_failed_total", "reason" => "webhook_unavailable").increment(1);
        Ok(DeliveryOutcome::Failed)
    }

    fn build_request(
        &self,
        webhook: &Webhook,
        delivery: &WebhookDelivery,
    ) -> Result<OutboundRequest, WorkerError> {
        let body = serde_json::to_string(&delivery.payload).map_err(WebhookError::from)?;
        let payload_id = delivery
            .payload
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| delivery.id.to_string());

        Ok(OutboundRequest::for_webhook(
            webhook,
            &delivery.event,
            &payload_id,
            body,
            &self.settings.user_agent,
        ))
    }

    fn truncate(&self, text: &str) -> String {
        text.chars()
            .take(self.settings.max_response_body_chars)
            .collect()
    }
}

#[async_trait]
impl<W, D> Worker for WebhookWorker<W, D>
where
    W: WebhookRepository + 'static,
    D: WebhookDeliveryRepository + 'static,
{
    async fn run(&self) -> Result<(), WorkerError> {
        info!(worker = %self.name, "Webhook worker started");
        loop {
            if let Err(e) = self.run_once().await {
                error!(worker = %self.name, "Error processing webhooks: {}", e);
            }
            sleep(self.settings.poll_interval()).await;
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
#[path = "webhook_worker_test.rs"]
mod tests;
