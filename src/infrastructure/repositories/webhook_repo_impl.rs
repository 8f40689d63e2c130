// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::webhook::Webhook;
use crate::domain::repositories::webhook_repository::{
    AttemptOutcome, RepositoryError, WebhookRepository,
};
use crate::infrastructure::database::entities::webhook;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// Webhook仓库实现
#[derive(Clone)]
pub struct WebhookRepoImpl {
    db: Arc<DatabaseConnection>,
}

impl WebhookRepoImpl {
    /// 创建新的Webhook仓库实现
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn to_active_model(webhook: &Webhook) -> Result<webhook::ActiveModel, RepositoryError> {
    Ok(webhook::ActiveModel {
        id: Set(webhook.id),
        organization_id: Set(webhook.organization_id),
        name: Set(webhook.name.clone()),
        description: Set(webhook.description.clone()),
        url: Set(webhook.url.clone()),
        events: Set(serde_json::to_value(&webhook.events)?),
        is_active: Set(webhook.is_active),
        secret: Set(webhook.secret.clone()),
        headers: Set(serde_json::to_value(&webhook.headers)?),
        retry_policy: Set(serde_json::to_value(&webhook.retry_policy)?),
        delivery_attempts: Set(webhook.delivery_attempts),
        last_delivery_attempt: Set(webhook.last_delivery_attempt.map(Into::into)),
        last_successful_delivery: Set(webhook.last_successful_delivery.map(Into::into)),
        last_failed_delivery: Set(webhook.last_failed_delivery.map(Into::into)),
        failure_reason: Set(webhook.failure_reason.clone()),
        created_at: Set(webhook.created_at.into()),
        updated_at: Set(webhook.updated_at.into()),
    })
}

#[async_trait]
impl WebhookRepository for WebhookRepoImpl {
    async fn create(&self, webhook: &Webhook) -> Result<Webhook, RepositoryError> {
        let model = to_active_model(webhook)?.insert(self.db.as_ref()).await?;
        Webhook::try_from(model)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Webhook>, RepositoryError> {
        webhook::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(Webhook::try_from)
            .transpose()
    }

    async fn list_by_organization(
        &self,
        organization_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Webhook>, u64), RepositoryError> {
        let query = webhook::Entity::find()
            .filter(webhook::Column::OrganizationId.eq(organization_id));

        let total = query.clone().count(self.db.as_ref()).await?;
        let models = query
            .order_by_desc(webhook::Column::CreatedAt)
            .order_by_asc(webhook::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;

        let webhooks = models
            .into_iter()
            .map(Webhook::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((webhooks, total))
    }

    async fn find_active_by_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Webhook>, RepositoryError> {
        webhook::Entity::find()
            .filter(webhook::Column::OrganizationId.eq(organization_id))
            .filter(webhook::Column::IsActive.eq(true))
            .order_by_asc(webhook::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(Webhook::try_from)
            .collect()
    }

    async fn update(&self, webhook: &Webhook) -> Result<Webhook, RepositoryError> {
        let mut active: webhook::ActiveModel = webhook::Entity::find_by_id(webhook.id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)?
            .into();

        // 健康字段由投递工作器维护，这里只写可编辑字段
        active.name = Set(webhook.name.clone());
        active.description = Set(webhook.description.clone());
        active.url = Set(webhook.url.clone());
        active.events = Set(serde_json::to_value(&webhook.events)?);
        active.is_active = Set(webhook.is_active);
        active.secret = Set(webhook.secret.clone());
        active.headers = Set(serde_json::to_value(&webhook.headers)?);
        active.retry_policy = Set(serde_json::to_value(&webhook.retry_policy)?);
        active.updated_at = Set(webhook.updated_at.into());

        let updated = active.update(self.db.as_ref()).await?;
        Webhook::try_from(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = webhook::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn record_delivery_attempt(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        outcome: AttemptOutcome,
    ) -> Result<(), RepositoryError> {
        let at: sea_orm::prelude::DateTimeWithTimeZone = at.into();

        // 计数器在数据库端自增，多个工作器同时写入时不会丢失更新
        let mut update = webhook::Entity::update_many()
            .col_expr(
                webhook::Column::DeliveryAttempts,
                Expr::col(webhook::Column::DeliveryAttempts).add(1),
            )
            .col_expr(webhook::Column::LastDeliveryAttempt, Expr::value(Some(at)));

        update = match outcome {
            AttemptOutcome::Delivered => update
                .col_expr(webhook::Column::LastSuccessfulDelivery, Expr::value(Some(at)))
                .col_expr(
                    webhook::Column::FailureReason,
                    Expr::value(Option::<String>::None),
                ),
            AttemptOutcome::Retrying => {
                update.col_expr(webhook::Column::LastFailedDelivery, Expr::value(Some(at)))
            }
            AttemptOutcome::Failed(reason) => update
                .col_expr(webhook::Column::LastFailedDelivery, Expr::value(Some(at)))
                .col_expr(webhook::Column::FailureReason, Expr::value(Some(reason))),
        };

        // Webhook可能已被删除，此时没有可更新的行
        update
            .filter(webhook::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }
}

impl TryFrom<webhook::Model> for Webhook {
    type Error = RepositoryError;

    fn try_from(model: webhook::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            organization_id: model.organization_id,
            name: model.name,
            description: model.description,
            url: model.url,
            events: serde_json::from_value(model.events)?,
            is_active: model.is_active,
            secret: model.secret,
            headers: serde_json::from_value(model.headers)?,
            retry_policy: serde_json::from_value(model.retry_policy)?,
            delivery_attempts: model.delivery_attempts,
            last_delivery_attempt: model.last_delivery_attempt.map(Into::into),
            last_successful_delivery: model.last_successful_delivery.map(Into::into),
            last_failed_delivery: model.last_failed_delivery.map(Into::into),
            failure_reason: model.failure_reason,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }
}
