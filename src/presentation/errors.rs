// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::domain::repositories::webhook_repository::RepositoryError;
use crate::utils::errors::WebhookError;

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    /// HTTP状态码映射
    pub fn status(&self) -> StatusCode {
        if let Some(err) = self.0.downcast_ref::<WebhookError>() {
            return match err {
                WebhookError::Validation(_) => StatusCode::BAD_REQUEST,
                WebhookError::WebhookNotFound(_) | WebhookError::DeliveryNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                WebhookError::WebhookInactive(_) | WebhookError::InvalidTransition { .. } => {
                    StatusCode::CONFLICT
                }
                WebhookError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
                WebhookError::Repository(_) | WebhookError::Serialization(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
        }

        match self.0.downcast_ref::<RepositoryError>() {
            Some(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
            None if self.0.is::<validator::ValidationErrors>() => StatusCode::BAD_REQUEST,
            None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = self.0.to_string();

        if status.is_server_error() {
            error!(error = %error_message, "Request failed");
        }

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
