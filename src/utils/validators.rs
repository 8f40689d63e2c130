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

use reqwest::header::{HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

/// 验证错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// URL无效
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// 协议不受支持
    #[error("unsupported url scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
    /// 事件类型无效
    #[error("invalid event type '{0}'")]
    InvalidEventType(String),
    /// 请求头无效
    #[error("invalid header '{0}'")]
    InvalidHeader(String),
}

/// 验证Webhook URL
///
/// # 参数
///
/// * `url` - URL字符串
///
/// # 返回值
///
/// * `Ok(Url)` - 解析后的URL
/// * `Err(ValidationError)` - URL无效或协议不是 http/https
pub fn validate_webhook_url(url: &str) -> Result<Url, ValidationError> {
    let parsed = Url::parse(url.trim()).map_err(|e| ValidationError::InvalidUrl(e.to_string()))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ValidationError::UnsupportedScheme(parsed.scheme().to_string()));
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::InvalidUrl("missing host".to_string()));
    }

    Ok(parsed)
}

/// 验证事件类型：非空且不含空白字符
pub fn validate_event_type(event: &str) -> Result<(), ValidationError> {
    if event.is_empty() || event.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEventType(event.to_string()));
    }
    Ok(())
}

/// 验证自定义请求头能否被HTTP客户端发送
pub fn validate_header(name: &str, value: &str) -> Result<(), ValidationError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ValidationError::InvalidHeader(name.to_string()))?;
    HeaderValue::from_str(value).map_err(|_| ValidationError::InvalidHeader(name.to_string()))?;
    Ok(())
}
