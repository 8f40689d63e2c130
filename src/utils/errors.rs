// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::webhook_delivery::DeliveryStatus;
use crate::domain::repositories::webhook_repository::RepositoryError;
use thiserror::Error;
use uuid::Uuid;

/// Webhook领域错误类型
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("webhook not found: {0}")]
    WebhookNotFound(Uuid),

    #[error("delivery not found: {0}")]
    DeliveryNotFound(Uuid),

    #[error("webhook {0} is inactive")]
    WebhookInactive(Uuid),

    #[error("invalid delivery transition from {from} to {to}")]
    InvalidTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Worker错误类型
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("仓库错误: {0}")]
    RepositoryError(#[from] RepositoryError),

    #[error("内部错误: {0}")]
    InternalError(String),

    #[error("领域错误: {0}")]
    DomainError(#[from] WebhookError),
}
