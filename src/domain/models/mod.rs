// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - Webhook（webhook）：租户配置的订阅及负载信封
/// - 投递记录（webhook_delivery）：单个事件到单个Webhook的投递状态机
/// - 分页（pagination）：列表查询的分页参数与结果
pub mod pagination;
pub mod webhook;
pub mod webhook_delivery;
