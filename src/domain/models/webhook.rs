// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::retry_policy::{RetryPolicy, RetryPolicyOverrides};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Webhook实体
///
/// 表示一个租户配置的HTTP订阅。每个匹配的领域事件都会以签名后的
/// POST请求发送到 `url`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    /// Webhook唯一标识符
    pub id: Uuid,
    /// 所属组织ID，用于租户隔离
    pub organization_id: Uuid,
    /// 名称
    pub name: String,
    /// 描述
    pub description: Option<String>,
    /// Webhook回调URL，仅允许 http/https
    pub url: String,
    /// 订阅的事件，每个事件可独立启用并附带过滤条件
    pub events: Vec<WebhookEventConfig>,
    /// 是否启用
    pub is_active: bool,
    /// 签名密钥，为空时不发送签名头
    pub secret: Option<String>,
    /// 每次投递附带的自定义请求头
    pub headers: BTreeMap<String, String>,
    /// 重试策略
    pub retry_policy: RetryPolicy,
    /// 累计投递尝试次数
    pub delivery_attempts: i64,
    /// 最近一次投递尝试时间
    pub last_delivery_attempt: Option<DateTime<Utc>>,
    /// 最近一次成功投递时间
    pub last_successful_delivery: Option<DateTime<Utc>>,
    /// 最近一次失败的投递尝试时间（含将被重试的失败）
    pub last_failed_delivery: Option<DateTime<Utc>>,
    /// 最近一次最终失败的原因，投递成功后清除
    pub failure_reason: Option<String>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

impl Webhook {
    /// 创建一个新的Webhook
    ///
    /// 不做校验，校验由注册服务负责
    pub fn new(organization_id: Uuid, name: String, url: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            name,
            description: None,
            url,
            events: Vec::new(),
            is_active: true,
            secret: None,
            headers: BTreeMap::new(),
            retry_policy: RetryPolicy::default(),
            delivery_attempts: 0,
            last_delivery_attempt: None,
            last_successful_delivery: None,
            last_failed_delivery: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 该Webhook是否订阅了指定事件（只看事件配置，不看 `is_active`）
    pub fn subscribes_to(&self, event_type: &str, data: &Value) -> bool {
        self.events
            .iter()
            .any(|config| config.matches(event_type, data))
    }

    /// 该Webhook是否应当接收此事件：既要处于启用状态，也要显式订阅了该事件
    pub fn accepts(&self, event_type: &str, data: &Value) -> bool {
        self.is_active && self.subscribes_to(event_type, data)
    }
}

/// 单个事件的订阅配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEventConfig {
    /// 事件类型，例如 `cycle:created`
    pub event: String,
    /// 是否启用，缺省为启用
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 过滤条件，键为事件数据的顶层字段
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Map<String, Value>>,
}

fn default_enabled() -> bool {
    true
}

impl WebhookEventConfig {
    pub fn enabled(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            enabled: true,
            filters: None,
        }
    }

    /// 判断事件是否命中此配置
    ///
    /// 过滤值为数组时，事件字段等于数组中任一元素即视为命中
    pub fn matches(&self, event_type: &str, data: &Value) -> bool {
        if !self.enabled || self.event != event_type {
            return false;
        }

        let Some(filters) = &self.filters else {
            return true;
        };

        filters.iter().all(|(key, expected)| match data.get(key) {
            None => false,
            Some(actual) => match expected {
                Value::Array(candidates) => candidates.contains(actual),
                other => other == actual,
            },
        })
    }
}

/// 创建Webhook的输入
#[derive(Debug, Clone, Default)]
pub struct NewWebhook {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub events: Vec<WebhookEventConfig>,
    pub is_active: Option<bool>,
    pub secret: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub retry_policy: Option<RetryPolicyOverrides>,
}

/// 更新Webhook的输入
///
/// `headers` 与 `retry_policy` 为部分合并；`secret` 为空字符串表示清除密钥
#[derive(Debug, Clone, Default)]
pub struct WebhookUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub events: Option<Vec<WebhookEventConfig>>,
    pub is_active: Option<bool>,
    pub secret: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
    pub retry_policy: Option<RetryPolicyOverrides>,
}

/// Webhook负载信封
///
/// 作为投递记录的 `payload` 持久化，重试时原样复用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub id: Uuid,
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub organization_id: Uuid,
    pub data: Value,
    pub metadata: PayloadMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMetadata {
    pub correlation_id: String,
}

impl WebhookPayload {
    pub fn new(
        event: impl Into<String>,
        organization_id: Uuid,
        data: Value,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event: event.into(),
            timestamp: Utc::now(),
            organization_id,
            data,
            metadata: PayloadMetadata {
                correlation_id: correlation_id.into(),
            },
        }
    }
}
