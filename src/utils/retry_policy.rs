// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// 默认可重试的HTTP状态码
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// 单次退避时间上限（一天，毫秒）
pub const MAX_RETRY_DELAY_MS: u64 = 86_400_000;

/// 重试策略配置
///
/// 每个Webhook独立持有一份策略。`max_attempts` 在入队时被复制到投递记录上，
/// 其余字段在每次尝试时重新读取。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 最大尝试次数
    pub max_attempts: u32,
    /// 初始退避时间（毫秒）
    pub initial_delay_ms: u64,
    /// 最大退避时间（毫秒）
    pub max_delay_ms: u64,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 视为可重试的HTTP状态码
    pub retryable_status_codes: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.into_iter().collect(),
        }
    }
}

/// 重试策略的部分覆盖
///
/// 未提供的字段保留原值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicyOverrides {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub retryable_status_codes: Option<BTreeSet<u16>>,
}

impl RetryPolicy {
    /// 将覆盖字段合并到当前策略上，返回新的策略
    pub fn merge(&self, overrides: &RetryPolicyOverrides) -> Self {
        Self {
            max_attempts: overrides.max_attempts.unwrap_or(self.max_attempts),
            initial_delay_ms: overrides.initial_delay_ms.unwrap_or(self.initial_delay_ms),
            max_delay_ms: overrides.max_delay_ms.unwrap_or(self.max_delay_ms),
            backoff_multiplier: overrides
                .backoff_multiplier
                .unwrap_or(self.backoff_multiplier),
            retryable_status_codes: overrides
                .retryable_status_codes
                .clone()
                .unwrap_or_else(|| self.retryable_status_codes.clone()),
        }
    }

    /// 校验策略参数
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 参数合法
    /// * `Err(String)` - 不合法的原因
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("retry policy max_attempts must be at least 1".to_string());
        }
        if self.initial_delay_ms == 0 {
            return Err("retry policy initial_delay_ms must be positive".to_string());
        }
        if self.initial_delay_ms > MAX_RETRY_DELAY_MS || self.max_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(format!(
                "retry policy delays must not exceed {} ms",
                MAX_RETRY_DELAY_MS
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(
                "retry policy max_delay_ms must not be smaller than initial_delay_ms".to_string(),
            );
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err("retry policy backoff_multiplier must be >= 1.0".to_string());
        }
        if let Some(code) = self
            .retryable_status_codes
            .iter()
            .find(|code| !(100..=599).contains(*code))
        {
            return Err(format!("invalid retryable status code: {}", code));
        }
        Ok(())
    }

    /// 计算第 `attempt` 次失败后的退避时间
    ///
    /// `min(initial_delay * multiplier^(attempt-1), max_delay)`，不加抖动。
    /// `attempt` 为 0 时按 1 处理。
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);

        let backoff_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped_ms = backoff_ms.min(self.max_delay_ms as f64);

        Duration::from_millis(capped_ms as u64)
    }

    /// 计算下次重试时间
    pub fn next_retry_time(&self, attempt: u32, base_time: DateTime<Utc>) -> DateTime<Utc> {
        let backoff = self.calculate_backoff(attempt);
        let backoff = i64::try_from(backoff.as_millis()).unwrap_or(i64::MAX);
        base_time
            .checked_add_signed(chrono::Duration::milliseconds(backoff))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// 是否还有剩余尝试次数
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// HTTP状态码是否可重试
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }
}
