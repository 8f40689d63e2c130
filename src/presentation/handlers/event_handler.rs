// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::webhook_request::PublishEventRequestDto;
use crate::application::dto::webhook_response::DispatchResponseDto;
use crate::domain::repositories::webhook_delivery_repository::WebhookDeliveryRepository;
use crate::domain::repositories::webhook_repository::WebhookRepository;
use crate::domain::services::event_dispatcher::{DomainEvent, EventDispatcher};
use crate::presentation::errors::AppError;
use axum::{http::StatusCode, Extension, Json};
use std::sync::Arc;
use validator::Validate;

/// 接收领域事件并入队投递
///
/// 只负责入队，投递由后台工作器异步完成
pub async fn publish_event<W, D>(
    Extension(dispatcher): Extension<Arc<EventDispatcher<W, D>>>,
    Json(payload): Json<PublishEventRequestDto>,
) -> Result<(StatusCode, Json<DispatchResponseDto>), AppError>
where
    W: WebhookRepository + 'static,
    D: WebhookDeliveryRepository + 'static,
{
    payload.validate()?;

    let event_type = payload.event_type.clone();
    let deliveries = dispatcher
        .dispatch(DomainEvent {
            event_type: payload.event_type,
            data: payload.data,
            organization_id: payload.organization_id,
            correlation_id: payload.correlation_id,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DispatchResponseDto {
            event_type,
            deliveries: deliveries.into_iter().map(|d| d.id).collect(),
        }),
    ))
}
