// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 仓库接口定义了数据持久化的抽象契约，具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - Webhook仓库（webhook_repository）：管理Webhook订阅配置
/// - Webhook投递仓库（webhook_delivery_repository）：管理投递记录与状态切换
pub mod webhook_delivery_repository;
pub mod webhook_repository;
