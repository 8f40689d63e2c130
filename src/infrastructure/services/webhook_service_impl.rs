// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::webhook_service::{
    DeliveryError, OutboundRequest, OutboundResponse, WebhookService,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tracing::{debug, warn};

/// 默认最多读取的响应体字节数
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 64 * 1024;

/// 基于 reqwest 的Webhook发送实现
///
/// 不跟随重定向：3xx 按非 2xx 处理
pub struct ReqwestWebhookService {
    /// HTTP 客户端
    client: reqwest::Client,
    /// 响应体读取上限（字节），超出部分直接丢弃
    body_limit: usize,
}

impl ReqwestWebhookService {
    /// 创建新的发送实现
    ///
    /// # 参数
    ///
    /// * `timeout` - 单次请求超时
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            body_limit: DEFAULT_BODY_LIMIT_BYTES,
        })
    }

    /// 设置响应体读取上限（字节）
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// 按块读取响应体，达到上限后停止，不把整个远端响应载入内存
    async fn read_body(&self, mut response: reqwest::Response) -> String {
        let mut buf = Vec::with_capacity(self.body_limit.min(8 * 1024));
        while buf.len() < self.body_limit {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let take = chunk.len().min(self.body_limit - buf.len());
                    buf.extend_from_slice(&chunk[..take]);
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "Failed to read webhook response body");
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn header_map(request: &OutboundRequest) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(request.headers.len());
        for (name, value) in &request.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %name, "Skipping invalid outbound header"),
            }
        }
        headers
    }
}

#[async_trait]
impl WebhookService for ReqwestWebhookService {
    async fn send(&self, request: &OutboundRequest) -> Result<OutboundResponse, DeliveryError> {
        let response = self
            .client
            .post(&request.url)
            .headers(Self::header_map(request))
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = self.read_body(response).await;
        debug!(url = %request.url, status = status.as_u16(), "Webhook endpoint responded");

        if status.is_success() {
            Ok(OutboundResponse {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(DeliveryError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }
}
