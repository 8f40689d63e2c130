// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域用例模块
///
/// 当前的用例：
/// - 测试Webhook（test_webhook）：同步的一次性连通性检查，不经过投递队列
pub mod test_webhook;
