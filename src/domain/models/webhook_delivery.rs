// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::webhook::{Webhook, WebhookPayload};
use crate::utils::errors::WebhookError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 传输层失败（无HTTP状态码）时记录的合成状态码
pub const TRANSPORT_FAILURE_STATUS: i32 = 0;

/// 投递状态
///
/// ```text
/// Pending ──► Delivering ──► Delivered
///    │            │  └─────► Failed
///    │            ▼
///    │        Retrying ──► Delivering
///    ▼            │
/// Cancelled ◄─────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// 已入队，尚未尝试
    #[default]
    Pending,
    /// 正在投递
    Delivering,
    /// 投递成功（终态）
    Delivered,
    /// 等待重试
    Retrying,
    /// 投递失败（终态）
    Failed,
    /// 已取消（终态）
    Cancelled,
}

impl DeliveryStatus {
    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Delivered | DeliveryStatus::Failed | DeliveryStatus::Cancelled
        )
    }

    /// 状态迁移表
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;

        matches!(
            (self, next),
            (Pending, Delivering)
                | (Pending, Cancelled)
                | (Retrying, Delivering)
                | (Retrying, Cancelled)
                | (Delivering, Delivered)
                | (Delivering, Retrying)
                | (Delivering, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Delivering => "delivering",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Retrying => "retrying",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Webhook投递记录
///
/// 一个事件到一个Webhook的完整投递过程，重试复用同一条记录。
/// 不变式：`attempts <= max_attempts`；`completed_at` 仅在终态时设置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookDelivery {
    /// 投递ID
    pub id: Uuid,
    /// 所属Webhook
    pub webhook_id: Uuid,
    /// 所属组织
    pub organization_id: Uuid,
    /// 事件类型
    pub event: String,
    /// 序列化后的负载信封，创建后不再修改
    pub payload: serde_json::Value,
    /// 当前状态
    pub status: DeliveryStatus,
    /// 已失败的尝试次数
    pub attempts: i32,
    /// 入队时从Webhook策略复制的最大尝试次数
    pub max_attempts: i32,
    /// 下次重试时间
    pub next_retry_at: Option<DateTime<Utc>>,
    /// 最近一次尝试时间
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// 最近一次尝试的HTTP状态码，传输层失败为 0
    pub last_attempt_status: Option<i32>,
    /// 最近一次尝试的响应体（截断）或错误信息
    pub last_attempt_response: Option<String>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
    /// 完成时间
    pub completed_at: Option<DateTime<Utc>>,
}

impl WebhookDelivery {
    /// 为某个Webhook创建待投递记录
    ///
    /// `max_attempts` 取自Webhook当前的策略，之后不再变化
    pub fn new(webhook: &Webhook, payload: &WebhookPayload) -> Result<Self, serde_json::Error> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            webhook_id: webhook.id,
            organization_id: webhook.organization_id,
            event: payload.event.clone(),
            payload: serde_json::to_value(payload)?,
            status: DeliveryStatus::Pending,
            attempts: 0,
            max_attempts: i32::try_from(webhook.retry_policy.max_attempts).unwrap_or(i32::MAX),
            next_retry_at: None,
            last_attempt_at: None,
            last_attempt_status: None,
            last_attempt_response: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    /// 是否到期可被工作器选中
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            DeliveryStatus::Pending => true,
            DeliveryStatus::Retrying => self.next_retry_at.map_or(true, |at| at <= now),
            _ => false,
        }
    }

    /// 按迁移表切换状态
    pub fn transition(&mut self, next: DeliveryStatus) -> Result<(), WebhookError> {
        if !self.status.can_transition_to(next) {
            return Err(WebhookError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 标记为正在投递
    pub fn begin_attempt(&mut self, now: DateTime<Utc>) -> Result<(), WebhookError> {
        self.transition(DeliveryStatus::Delivering)?;
        self.last_attempt_at = Some(now);
        Ok(())
    }

    /// 投递成功，不增加 `attempts`
    pub fn mark_delivered(
        &mut self,
        now: DateTime<Utc>,
        status: u16,
        response: Option<String>,
    ) -> Result<(), WebhookError> {
        self.transition(DeliveryStatus::Delivered)?;
        self.next_retry_at = None;
        self.last_attempt_at = Some(now);
        self.last_attempt_status = Some(i32::from(status));
        self.last_attempt_response = response;
        self.completed_at = Some(now);
        Ok(())
    }

    /// 失败后安排重试
    pub fn schedule_retry(
        &mut self,
        now: DateTime<Utc>,
        next_retry_at: DateTime<Utc>,
        status: Option<u16>,
        response: String,
    ) -> Result<(), WebhookError> {
        self.transition(DeliveryStatus::Retrying)?;
        self.attempts += 1;
        self.next_retry_at = Some(next_retry_at);
        self.record_failure(now, status, response);
        Ok(())
    }

    /// 最终失败
    pub fn mark_failed(
        &mut self,
        now: DateTime<Utc>,
        status: Option<u16>,
        response: String,
    ) -> Result<(), WebhookError> {
        self.transition(DeliveryStatus::Failed)?;
        self.attempts = (self.attempts + 1).min(self.max_attempts);
        self.next_retry_at = None;
        self.completed_at = Some(now);
        self.record_failure(now, status, response);
        Ok(())
    }

    /// 终止一条未被尝试的投递（Webhook已删除或停用），不计入尝试次数
    pub fn abandon(&mut self, now: DateTime<Utc>, reason: String) -> Result<(), WebhookError> {
        self.transition(DeliveryStatus::Failed)?;
        self.next_retry_at = None;
        self.completed_at = Some(now);
        self.last_attempt_response = Some(reason);
        Ok(())
    }

    /// 取消
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), WebhookError> {
        self.transition(DeliveryStatus::Cancelled)?;
        self.next_retry_at = None;
        self.completed_at = Some(now);
        Ok(())
    }

    fn record_failure(&mut self, now: DateTime<Utc>, status: Option<u16>, response: String) {
        self.last_attempt_at = Some(now);
        self.last_attempt_status = Some(status.map_or(TRANSPORT_FAILURE_STATUS, i32::from));
        self.last_attempt_response = Some(response);
    }
}
