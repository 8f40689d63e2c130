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

use crate::domain::models::webhook_delivery::{DeliveryStatus, WebhookDelivery};
use crate::domain::repositories::webhook_delivery_repository::WebhookDeliveryRepository;
use crate::domain::repositories::webhook_repository::RepositoryError;
use crate::infrastructure::database::entities::webhook_delivery::{self, SeaDeliveryStatus};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use sea_orm::{
    sea_query::Expr, ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// Webhook投递仓库实现
///
/// 状态切换全部通过带状态条件的 `UPDATE ... WHERE status = ?` 完成，
/// 以受影响行数判断是否成功
#[derive(Clone)]
pub struct WebhookDeliveryRepoImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl WebhookDeliveryRepoImpl {
    /// 创建新的投递仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn status_value(status: DeliveryStatus) -> String {
    SeaDeliveryStatus::from(status).to_value()
}

fn timestamp(at: Option<DateTime<Utc>>) -> Option<DateTime<FixedOffset>> {
    at.map(Into::into)
}

/// 认领标识：截断到微秒，与 Postgres 时间戳精度一致，保证写入后可按值比较
fn claim_stamp(at: DateTime<Utc>) -> DateTime<FixedOffset> {
    at.trunc_subsecs(6).into()
}

#[async_trait]
impl WebhookDeliveryRepository for WebhookDeliveryRepoImpl {
    async fn create(&self, delivery: &WebhookDelivery) -> Result<WebhookDelivery, RepositoryError> {
        let model = webhook_delivery::ActiveModel {
            id: Set(delivery.id),
            webhook_id: Set(delivery.webhook_id),
            organization_id: Set(delivery.organization_id),
            event: Set(delivery.event.clone()),
            payload: Set(delivery.payload.clone()),
            status: Set(delivery.status.into()),
            attempts: Set(delivery.attempts),
            max_attempts: Set(delivery.max_attempts),
            next_retry_at: Set(timestamp(delivery.next_retry_at)),
            last_attempt_at: Set(timestamp(delivery.last_attempt_at)),
            last_attempt_status: Set(delivery.last_attempt_status),
            last_attempt_response: Set(delivery.last_attempt_response.clone()),
            created_at: Set(delivery.created_at.into()),
            updated_at: Set(delivery.updated_at.into()),
            completed_at: Set(timestamp(delivery.completed_at)),
        };

        let model = model.insert(self.db.as_ref()).await?;
        Ok(model.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WebhookDelivery>, RepositoryError> {
        let model = webhook_delivery::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn find_pending(&self, limit: u64) -> Result<Vec<WebhookDelivery>, RepositoryError> {
        let models = webhook_delivery::Entity::find()
            .filter(webhook_delivery::Column::Status.eq(SeaDeliveryStatus::Pending))
            .order_by_asc(webhook_delivery::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn find_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<WebhookDelivery>, RepositoryError> {
        let now: DateTime<FixedOffset> = now.into();

        let models = webhook_delivery::Entity::find()
            .filter(webhook_delivery::Column::Status.eq(SeaDeliveryStatus::Retrying))
            .filter(
                Condition::any()
                    .add(webhook_delivery::Column::NextRetryAt.is_null())
                    .add(webhook_delivery::Column::NextRetryAt.lte(now)),
            )
            .order_by_asc(webhook_delivery::Column::NextRetryAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn claim(
        &self,
        id: Uuid,
        expected: DeliveryStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let at = claim_stamp(at);

        let result = webhook_delivery::Entity::update_many()
            .col_expr(
                webhook_delivery::Column::Status,
                Expr::value(status_value(DeliveryStatus::Delivering)),
            )
            .col_expr(webhook_delivery::Column::LastAttemptAt, Expr::value(Some(at)))
            .col_expr(webhook_delivery::Column::UpdatedAt, Expr::value(at))
            .filter(webhook_delivery::Column::Id.eq(id))
            .filter(webhook_delivery::Column::Status.eq(SeaDeliveryStatus::from(expected)))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn finish_attempt(
        &self,
        delivery: &WebhookDelivery,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = webhook_delivery::Entity::update_many()
            .col_expr(
                webhook_delivery::Column::Status,
                Expr::value(status_value(delivery.status)),
            )
            .col_expr(
                webhook_delivery::Column::Attempts,
                Expr::value(delivery.attempts),
            )
            .col_expr(
                webhook_delivery::Column::NextRetryAt,
                Expr::value(timestamp(delivery.next_retry_at)),
            )
            .col_expr(
                webhook_delivery::Column::LastAttemptAt,
                Expr::value(timestamp(delivery.last_attempt_at)),
            )
            .col_expr(
                webhook_delivery::Column::LastAttemptStatus,
                Expr::value(delivery.last_attempt_status),
            )
            .col_expr(
                webhook_delivery::Column::LastAttemptResponse,
                Expr::value(delivery.last_attempt_response.clone()),
            )
            .col_expr(
                webhook_delivery::Column::UpdatedAt,
                Expr::value(DateTime::<FixedOffset>::from(delivery.updated_at)),
            )
            .col_expr(
                webhook_delivery::Column::CompletedAt,
                Expr::value(timestamp(delivery.completed_at)),
            )
            .filter(webhook_delivery::Column::Id.eq(delivery.id))
            .filter(webhook_delivery::Column::Status.eq(SeaDeliveryStatus::Delivering))
            .filter(webhook_delivery::Column::LastAttemptAt.eq(claim_stamp(claimed_at)))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn cancel(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<WebhookDelivery>, RepositoryError> {
        let at: DateTime<FixedOffset> = at.into();

        let result = webhook_delivery::Entity::update_many()
            .col_expr(
                webhook_delivery::Column::Status,
                Expr::value(status_value(DeliveryStatus::Cancelled)),
            )
            .col_expr(
                webhook_delivery::Column::NextRetryAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(webhook_delivery::Column::CompletedAt, Expr::value(Some(at)))
            .col_expr(webhook_delivery::Column::UpdatedAt, Expr::value(at))
            .filter(webhook_delivery::Column::Id.eq(id))
            .filter(webhook_delivery::Column::Status.is_in([
                SeaDeliveryStatus::Pending,
                SeaDeliveryStatus::Retrying,
            ]))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn reset_stale(
        &self,
        claimed_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let claimed_before: DateTime<FixedOffset> = claimed_before.into();
        let now: DateTime<FixedOffset> = now.into();

        // 工作器在认领后崩溃会让记录停留在 Delivering，放回重试队列立即再试
        let result = webhook_delivery::Entity::update_many()
            .col_expr(
                webhook_delivery::Column::Status,
                Expr::value(status_value(DeliveryStatus::Retrying)),
            )
            .col_expr(webhook_delivery::Column::NextRetryAt, Expr::value(Some(now)))
            .col_expr(webhook_delivery::Column::UpdatedAt, Expr::value(now))
            .filter(webhook_delivery::Column::Status.eq(SeaDeliveryStatus::Delivering))
            .filter(webhook_delivery::Column::UpdatedAt.lte(claimed_before))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }

    async fn list_by_webhook(
        &self,
        webhook_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<WebhookDelivery>, u64), RepositoryError> {
        let query = webhook_delivery::Entity::find()
            .filter(webhook_delivery::Column::WebhookId.eq(webhook_id));

        let total = query.clone().count(self.db.as_ref()).await?;
        let models = query
            .order_by_desc(webhook_delivery::Column::CreatedAt)
            .order_by_asc(webhook_delivery::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;

        Ok((models.into_iter().map(Into::into).collect(), total))
    }
}

impl From<webhook_delivery::Model> for WebhookDelivery {
    fn from(model: webhook_delivery::Model) -> Self {
        Self {
            id: model.id,
            webhook_id: model.webhook_id,
            organization_id: model.organization_id,
            event: model.event,
            payload: model.payload,
            status: model.status.into(),
            attempts: model.attempts,
            max_attempts: model.max_attempts,
            next_retry_at: model.next_retry_at.map(Into::into),
            last_attempt_at: model.last_attempt_at.map(Into::into),
            last_attempt_status: model.last_attempt_status,
            last_attempt_response: model.last_attempt_response,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
            completed_at: model.completed_at.map(Into::into),
        }
    }
}

#[cfg(test)]
#[path = "webhook_delivery_repo_impl_test.rs"]
mod tests;
