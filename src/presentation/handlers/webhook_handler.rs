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

use crate::application::dto::webhook_request::{
    CreateWebhookRequestDto, PageQueryDto, TestWebhookRequestDto, UpdateWebhookRequestDto,
};
use crate::application::dto::webhook_response::{PageResponseDto, WebhookResponseDto};
use crate::domain::models::pagination::Pagination;
use crate::domain::repositories::webhook_delivery_repository::WebhookDeliveryRepository;
use crate::domain::repositories::webhook_repository::WebhookRepository;
use crate::domain::services::webhook_registry::WebhookRegistry;
use crate::domain::use_cases::test_webhook::{TestDeliveryResult, TestWebhookUseCase};
use crate::presentation::errors::AppError;
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 创建Webhook，响应中附带密钥（仅此一次）
pub async fn create_webhook<W, D>(
    Extension(registry): Extension<Arc<WebhookRegistry<W, D>>>,
    Path(organization_id): Path<Uuid>,
    Json(payload): Json<CreateWebhookRequestDto>,
) -> Result<(StatusCode, Json<WebhookResponseDto>), AppError>
where
    W: WebhookRepository + 'static,
    D: WebhookDeliveryRepository + 'static,
{
    payload.validate()?;
    let webhook = registry.create(organization_id, payload.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(WebhookResponseDto::with_secret(webhook)),
    ))
}

/// 按组织分页列出Webhook
pub async fn list_webhooks<W, D>(
    Extension(registry): Extension<Arc<WebhookRegistry<W, D>>>,
    Path(organization_id): Path<Uuid>,
    Query(query): Query<PageQueryDto>,
) -> Result<Json<PageResponseDto<WebhookResponseDto>>, AppError>
where
    W: WebhookRepository + 'static,
    D: WebhookDeliveryRepository + 'static,
{
    query.validate()?;
    let page = registry
        .list(organization_id, Pagination::new(query.page, query.limit))
        .await?;
    Ok(Json(page.into()))
}

pub async fn get_webhook<W, D>(
    Extension(registry): Extension<Arc<WebhookRegistry<W, D>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WebhookResponseDto>, AppError>
where
    W: WebhookRepository + 'static,
    D: WebhookDeliveryRepository + 'static,
{
    let webhook = registry.get(id).await?;
    Ok(Json(webhook.into()))
}

pub async fn update_webhook<W, D>(
    Extension(registry): Extension<Arc<WebhookRegistry<W, D>>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWebhookRequestDto>,
) -> Result<Json<WebhookResponseDto>, AppError>
where
    W: WebhookRepository + 'static,
    D: WebhookDeliveryRepository + 'static,
{
    payload.validate()?;
    let webhook = registry.update(id, payload.into()).await?;
    Ok(Json(webhook.into()))
}

pub async fn delete_webhook<W, D>(
    Extension(registry): Extension<Arc<WebhookRegistry<W, D>>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError>
where
    W: WebhookRepository + 'static,
    D: WebhookDeliveryRepository + 'static,
{
    registry.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn activate_webhook<W, D>(
    Extension(registry): Extension<Arc<WebhookRegistry<W, D>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WebhookResponseDto>, AppError>
where
    W: WebhookRepository + 'static,
    D: WebhookDeliveryRepository + 'static,
{
    let webhook = registry.set_active(id, true).await?;
    Ok(Json(webhook.into()))
}

pub async fn deactivate_webhook<W, D>(
    Extension(registry): Extension<Arc<WebhookRegistry<W, D>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WebhookResponseDto>, AppError>
where
    W: WebhookRepository + 'static,
    D: WebhookDeliveryRepository + 'static,
{
    let webhook = registry.set_active(id, false).await?;
    Ok(Json(webhook.into()))
}

/// 轮换密钥，响应中附带新密钥
pub async fn rotate_secret<W, D>(
    Extension(registry): Extension<Arc<WebhookRegistry<W, D>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WebhookResponseDto>, AppError>
where
    W: WebhookRepository + 'static,
    D: WebhookDeliveryRepository + 'static,
{
    let webhook = registry.rotate_secret(id).await?;
    Ok(Json(WebhookResponseDto::with_secret(webhook)))
}

/// 同步测试投递，不写投递记录
pub async fn test_webhook<W>(
    Extension(use_case): Extension<Arc<TestWebhookUseCase<W>>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TestWebhookRequestDto>,
) -> Result<Json<TestDeliveryResult>, AppError>
where
    W: WebhookRepository + 'static,
{
    payload.validate()?;
    let result = use_case.execute(id, &payload.event, payload.data).await?;
    Ok(Json(result))
}
