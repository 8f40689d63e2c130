// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 请求处理器模块
///
/// 包含Webhook管理、投递历史与事件入口的HTTP处理器
pub mod delivery_handler;
pub mod event_handler;
pub mod webhook_handler;
