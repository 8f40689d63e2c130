// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::webhook::Webhook;
use crate::domain::services::signature_service::{self, SIGNATURE_HEADER};
use crate::utils::retry_policy::RetryPolicy;
use async_trait::async_trait;
use thiserror::Error;

/// 出站请求
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    /// 目标URL
    pub url: String,
    /// 请求体，签名即基于这些字节计算
    pub body: String,
    /// 请求头，按发送顺序排列，名称不重复（忽略大小写）
    pub headers: Vec<(String, String)>,
}

impl OutboundRequest {
    /// 为Webhook构建签名后的请求
    ///
    /// 请求头依次为 Content-Type、User-Agent、事件信息、自定义请求头、签名；
    /// 同名请求头后者覆盖前者，签名头不可被自定义请求头覆盖。
    ///
    /// # 参数
    ///
    /// * `webhook` - 目标Webhook（读取当前URL、密钥与自定义请求头）
    /// * `event` - 事件类型
    /// * `delivery_id` - 负载ID
    /// * `body` - 序列化后的负载
    /// * `user_agent` - 固定的User-Agent
    pub fn for_webhook(
        webhook: &Webhook,
        event: &str,
        delivery_id: &str,
        body: String,
        user_agent: &str,
    ) -> Self {
        let mut request = Self {
            url: webhook.url.clone(),
            body,
            headers: Vec::new(),
        };

        request.set_header("Content-Type", "application/json");
        request.set_header("User-Agent", user_agent);
        request.set_header("X-Webhook-Event", event);
        request.set_header("X-Webhook-Delivery", delivery_id);

        for (name, value) in &webhook.headers {
            if name.eq_ignore_ascii_case(SIGNATURE_HEADER) {
                continue;
            }
            request.set_header(name, value);
        }

        if let Some(secret) = webhook.secret.as_deref().filter(|s| !s.is_empty()) {
            let signature = signature_service::signature_header_value(request.body.as_bytes(), secret);
            request.set_header(SIGNATURE_HEADER, &signature);
        }

        request
    }

    /// 设置请求头，已存在的同名请求头会被替换
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// 按名称读取请求头（忽略大小写）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// 成功响应
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundResponse {
    pub status: u16,
    pub body: String,
}

/// 投递错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    /// 对端返回非2xx状态码
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// 请求超时
    #[error("request timed out")]
    Timeout,
    /// 连接、DNS等传输层错误
    #[error("transport error: {0}")]
    Transport(String),
}

impl DeliveryError {
    /// HTTP状态码，传输层错误没有状态码
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DeliveryError::Http { status, .. } => Some(*status),
            DeliveryError::Timeout | DeliveryError::Transport(_) => None,
        }
    }

    /// 按Webhook的策略判断是否可重试
    ///
    /// 带状态码的错误看状态码是否在可重试集合内；没有状态码的错误一律可重试
    pub fn is_retryable(&self, policy: &RetryPolicy) -> bool {
        match self.status_code() {
            Some(status) => policy.is_retryable_status(status),
            None => true,
        }
    }
}

/// Webhook服务特质
///
/// 定义Webhook发送的核心逻辑
#[async_trait]
pub trait WebhookService: Send + Sync {
    /// 发送Webhook请求
    ///
    /// # 参数
    ///
    /// * `request` - 已签名的出站请求
    ///
    /// # 返回值
    ///
    /// * `Ok(OutboundResponse)` - 对端返回2xx
    /// * `Err(DeliveryError)` - 发送失败
    async fn send(&self, request: &OutboundRequest) -> Result<OutboundResponse, DeliveryError>;
}
