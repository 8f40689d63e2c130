// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::webhook_request::PageQueryDto;
use crate::application::dto::webhook_response::{DeliveryResponseDto, PageResponseDto};
use crate::domain::models::pagination::Pagination;
use crate::domain::repositories::webhook_delivery_repository::WebhookDeliveryRepository;
use crate::domain::repositories::webhook_repository::WebhookRepository;
use crate::domain::services::webhook_registry::WebhookRegistry;
use crate::presentation::errors::AppError;
use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 分页读取Webhook的投递历史（Webhook删除后仍可读取）
pub async fn list_deliveries<W, D>(
    Extension(registry): Extension<Arc<WebhookRegistry<W, D>>>,
    Path(webhook_id): Path<Uuid>,
    Query(query): Query<PageQueryDto>,
) -> Result<Json<PageResponseDto<DeliveryResponseDto>>, AppError>
where
    W: WebhookRepository + 'static,
    D: WebhookDeliveryRepository + 'static,
{
    query.validate()?;
    let page = registry
        .deliveries(webhook_id, Pagination::new(query.page, query.limit))
        .await?;
    Ok(Json(page.into()))
}

pub async fn get_delivery<W, D>(
    Extension(registry): Extension<Arc<WebhookRegistry<W, D>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryResponseDto>, AppError>
where
    W: WebhookRepository + 'static,
    D: WebhookDeliveryRepository + 'static,
{
    let delivery = registry.get_delivery(id).await?;
    Ok(Json(delivery.into()))
}

/// 取消尚未完成的投递
pub async fn cancel_delivery<W, D>(
    Extension(registry): Extension<Arc<WebhookRegistry<W, D>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryResponseDto>, AppError>
where
    W: WebhookRepository + 'static,
    D: WebhookDeliveryRepository + 'static,
{
    let delivery = registry.cancel_delivery(id).await?;
    Ok(Json(delivery.into()))
}
