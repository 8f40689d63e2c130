// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::webhook_repository::RepositoryError;
use crate::domain::models::webhook_delivery::{DeliveryStatus, WebhookDelivery};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Webhook投递仓库特质
///
/// 定义投递记录数据访问接口。所有状态切换都是条件更新：
/// 只有记录仍处于预期状态时才会生效，多个工作器并发时以此保证
/// 同一条投递只会被一个工作器认领。
#[async_trait]
pub trait WebhookDeliveryRepository: Send + Sync {
    /// 创建投递记录
    async fn create(&self, delivery: &WebhookDelivery) -> Result<WebhookDelivery, RepositoryError>;
    /// 根据ID查找投递记录
    async fn find_by_id(&self, id: Uuid) -> Result<Option<WebhookDelivery>, RepositoryError>;
    /// 查找从未尝试过的投递
    async fn find_pending(&self, limit: u64) -> Result<Vec<WebhookDelivery>, RepositoryError>;
    /// 查找重试时间已到的投递
    async fn find_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<WebhookDelivery>, RepositoryError>;
    /// 认领投递：仅当状态仍为 `expected` 时切换为 Delivering
    ///
    /// `at` 作为本次认领的标识写入 `last_attempt_at`（精确到微秒）
    async fn claim(
        &self,
        id: Uuid,
        expected: DeliveryStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
    /// 写回一次尝试的结果
    ///
    /// 仅当记录仍处于 Delivering 且仍属于 `claimed_at` 这次认领时生效；
    /// 认领被重置并由其他工作器重新认领后，旧的结果不会覆盖新的认领
    async fn finish_attempt(
        &self,
        delivery: &WebhookDelivery,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
    /// 取消投递：仅对 Pending / Retrying 生效
    async fn cancel(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<WebhookDelivery>, RepositoryError>;
    /// 将长时间停留在 Delivering 的投递重置为 Retrying
    async fn reset_stale(
        &self,
        claimed_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
    /// 按Webhook分页列出投递历史，返回 (当前页, 总数)
    async fn list_by_webhook(
        &self,
        webhook_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<WebhookDelivery>, u64), RepositoryError>;
}
