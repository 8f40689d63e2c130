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

use crate::domain::models::webhook::{NewWebhook, WebhookEventConfig, WebhookUpdate};
use crate::utils::retry_policy::RetryPolicyOverrides;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;
use validator::Validate;

/// 事件订阅
///
/// 既可以是事件名字符串（启用、无过滤），也可以是完整配置对象
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum EventSubscriptionDto {
    Name(String),
    Config(WebhookEventConfig),
}

impl From<EventSubscriptionDto> for WebhookEventConfig {
    fn from(dto: EventSubscriptionDto) -> Self {
        match dto {
            EventSubscriptionDto::Name(event) => WebhookEventConfig::enabled(event),
            EventSubscriptionDto::Config(config) => config,
        }
    }
}

/// 重试策略数据传输对象，所有字段可选
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct RetryPolicyDto {
    /// 最大尝试次数
    #[validate(range(min = 1, max = 50))]
    pub max_attempts: Option<u32>,
    /// 首次重试延迟（毫秒）
    #[validate(range(min = 1, max = 86_400_000))]
    pub initial_delay_ms: Option<u64>,
    /// 最大重试延迟（毫秒）
    #[validate(range(min = 1, max = 86_400_000))]
    pub max_delay_ms: Option<u64>,
    /// 退避倍数
    #[validate(range(min = 1.0, max = 10.0))]
    pub backoff_multiplier: Option<f64>,
    /// 可重试的HTTP状态码
    pub retryable_status_codes: Option<BTreeSet<u16>>,
}

impl From<RetryPolicyDto> for RetryPolicyOverrides {
    fn from(dto: RetryPolicyDto) -> Self {
        Self {
            max_attempts: dto.max_attempts,
            initial_delay_ms: dto.initial_delay_ms,
            max_delay_ms: dto.max_delay_ms,
            backoff_multiplier: dto.backoff_multiplier,
            retryable_status_codes: dto.retryable_status_codes,
        }
    }
}

/// 创建Webhook请求
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateWebhookRequestDto {
    /// 名称
    #[validate(length(min = 1, max = 255, message = "name cannot be empty"))]
    pub name: String,
    /// 描述
    pub description: Option<String>,
    /// 目标地址
    #[validate(url(message = "invalid url"))]
    pub url: String,
    /// 订阅的事件，缺省为空（不接收任何事件）
    #[serde(default)]
    pub events: Vec<EventSubscriptionDto>,
    /// 是否启用，缺省启用
    pub is_active: Option<bool>,
    /// 签名密钥，缺省时自动生成
    pub secret: Option<String>,
    /// 自定义请求头
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// 重试策略覆盖
    #[validate(nested)]
    pub retry_policy: Option<RetryPolicyDto>,
}

impl From<CreateWebhookRequestDto> for NewWebhook {
    fn from(dto: CreateWebhookRequestDto) -> Self {
        Self {
            name: dto.name,
            description: dto.description,
            url: dto.url,
            events: dto.events.into_iter().map(Into::into).collect(),
            is_active: dto.is_active,
            secret: dto.secret,
            headers: dto.headers,
            retry_policy: dto.retry_policy.map(Into::into),
        }
    }
}

/// 更新Webhook请求，未提供的字段保持不变
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct UpdateWebhookRequestDto {
    #[validate(length(min = 1, max = 255, message = "name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(url(message = "invalid url"))]
    pub url: Option<String>,
    /// 提供时整体替换订阅列表
    pub events: Option<Vec<EventSubscriptionDto>>,
    pub is_active: Option<bool>,
    /// 空字符串表示清除密钥
    pub secret: Option<String>,
    /// 与现有请求头合并
    pub headers: Option<BTreeMap<String, String>>,
    #[validate(nested)]
    pub retry_policy: Option<RetryPolicyDto>,
}

impl From<UpdateWebhookRequestDto> for WebhookUpdate {
    fn from(dto: UpdateWebhookRequestDto) -> Self {
        Self {
            name: dto.name,
            description: dto.description,
            url: dto.url,
            events: dto
                .events
                .map(|events| events.into_iter().map(Into::into).collect()),
            is_active: dto.is_active,
            secret: dto.secret,
            headers: dto.headers,
            retry_policy: dto.retry_policy.map(Into::into),
        }
    }
}

/// 测试投递请求
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct TestWebhookRequestDto {
    /// 事件类型
    #[validate(length(min = 1, message = "event cannot be empty"))]
    pub event: String,
    /// 事件数据，缺省使用测试数据
    pub data: Option<Value>,
}

/// 领域事件投递请求
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct PublishEventRequestDto {
    /// 事件类型
    #[validate(length(min = 1, message = "event_type cannot be empty"))]
    pub event_type: String,
    /// 所属组织
    pub organization_id: Uuid,
    /// 事件数据
    #[serde(default)]
    pub data: Value,
    /// 调用方提供的关联ID
    pub correlation_id: Option<String>,
}

/// 分页查询参数
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct PageQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
}
