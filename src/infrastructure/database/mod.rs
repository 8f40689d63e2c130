// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 数据库模块
///
/// 连接池的创建，以及 webhooks 与 webhook_deliveries 两张表的实体定义
pub mod connection;
pub mod entities;
