// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 事件分发（event_dispatcher）：把领域事件扇出为待投递记录
/// - 注册表事件（registry_events）：Webhook增删改的通知
/// - 签名服务（signature_service）：HMAC-SHA256签名与密钥生成
/// - Webhook注册（webhook_registry）：Webhook配置与投递历史的管理
/// - Webhook发送（webhook_service）：出站请求的构建与发送接口
pub mod event_dispatcher;
pub mod registry_events;
pub mod signature_service;
pub mod webhook_registry;
pub mod webhook_service;
