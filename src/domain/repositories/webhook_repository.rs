// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::webhook::Webhook;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// JSON列无法解析
    #[error("Corrupt record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 单次投递尝试对Webhook健康字段的影响
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// 投递成功
    Delivered,
    /// 失败但会重试
    Retrying,
    /// 最终失败
    Failed(String),
}

/// Webhook仓库特质
///
/// 定义Webhook数据访问接口
#[async_trait]
pub trait WebhookRepository: Send + Sync {
    /// 创建Webhook
    async fn create(&self, webhook: &Webhook) -> Result<Webhook, RepositoryError>;
    /// 根据ID查找Webhook
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Webhook>, RepositoryError>;
    /// 按组织分页列出Webhook，返回 (当前页, 总数)
    async fn list_by_organization(
        &self,
        organization_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Webhook>, u64), RepositoryError>;
    /// 查找组织下所有启用的Webhook
    async fn find_active_by_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Webhook>, RepositoryError>;
    /// 更新Webhook的可编辑字段
    async fn update(&self, webhook: &Webhook) -> Result<Webhook, RepositoryError>;
    /// 删除Webhook，返回是否存在
    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;
    /// 记录一次投递尝试，只更新健康字段
    async fn record_delivery_attempt(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        outcome: AttemptOutcome,
    ) -> Result<(), RepositoryError>;
}
