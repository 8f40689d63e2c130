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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含服务器、数据库、Webhook投递、指标和日志等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 服务器配置
    pub server: ServerSettings,
    /// 数据库配置
    pub database: DatabaseSettings,
    /// Webhook 投递配置
    pub webhook: WebhookSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
    /// 日志配置
    pub logging: LoggingSettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// Webhook投递配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSettings {
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 每轮最多读取的待投递记录数（待投递与到期重试各自计算）
    pub batch_size: u64,
    /// 单个工作器内的并发投递数
    pub concurrency: usize,
    /// 轮询工作器数量
    pub workers: usize,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 认领后超过该时长仍处于投递中的记录视为失联（秒）
    pub stale_after_secs: u64,
    /// 记录响应体的最大字符数
    pub max_response_body_chars: usize,
    /// 出站请求的 User-Agent
    pub user_agent: String,
}

impl WebhookSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            batch_size: 100,
            concurrency: 10,
            workers: 1,
            request_timeout_secs: 10,
            stale_after_secs: 300,
            max_response_body_chars: 1024,
            user_agent: default_user_agent(),
        }
    }
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用 Prometheus 导出器
    pub enabled: bool,
    /// 导出器监听地址
    pub listen_addr: SocketAddr,
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// 日志配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// 输出格式
    pub format: LogFormat,
}

fn default_user_agent() -> String {
    format!("webhook-relay/{}", env!("CARGO_PKG_VERSION"))
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次加载默认值、`config/default`、`config/{APP_ENVIRONMENT}` 与
    /// `WEBHOOK_RELAY` 前缀的环境变量，后者覆盖前者
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("WEBHOOK_RELAY").separator("__"))
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let webhook = WebhookSettings::default();

        Config::builder()
            // Server
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            // Database pool
            .set_default("database.url", "sqlite://webhook-relay.db?mode=rwc")?
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            // Delivery worker
            .set_default("webhook.poll_interval_ms", webhook.poll_interval_ms)?
            .set_default("webhook.batch_size", webhook.batch_size)?
            .set_default("webhook.concurrency", webhook.concurrency as u64)?
            .set_default("webhook.workers", webhook.workers as u64)?
            .set_default("webhook.request_timeout_secs", webhook.request_timeout_secs)?
            .set_default("webhook.stale_after_secs", webhook.stale_after_secs)?
            .set_default(
                "webhook.max_response_body_chars",
                webhook.max_response_body_chars as u64,
            )?
            .set_default("webhook.user_agent", webhook.user_agent)?
            // Metrics
            .set_default("metrics.enabled", true)?
            .set_default("metrics.listen_addr", "0.0.0.0:9000")?
            // Logging
            .set_default("logging.format", "pretty")
    }

    /// 校验配置取值
    pub fn validate(&self) -> Result<(), ConfigError> {
        let webhook = &self.webhook;
        if webhook.workers == 0 || webhook.concurrency == 0 || webhook.batch_size == 0 {
            return Err(ConfigError::Message(
                "webhook.workers, webhook.concurrency and webhook.batch_size must be positive"
                    .to_string(),
            ));
        }
        if webhook.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "webhook.request_timeout_secs must be positive".to_string(),
            ));
        }
        // 认领在请求仍可能进行时被重置，会导致同一投递被发送两次
        if webhook.stale_after_secs <= webhook.request_timeout_secs {
            return Err(ConfigError::Message(
                "webhook.stale_after_secs must be greater than webhook.request_timeout_secs"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
