// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 初始化指标系统
///
/// 安装 Prometheus 导出器并注册投递相关指标的说明
pub fn init_metrics(addr: SocketAddr) {
    // 端口被占用时仅记录告警（开发或测试环境）
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!(
            "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
            e
        );
        return;
    }

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
}

fn describe_metrics() {
    describe_counter!(
        "webhook_deliveries_enqueued_total",
        "Deliveries created by event dispatch"
    );
    describe_counter!(
        "webhook_delivery_attempts_total",
        "HTTP delivery attempts made by workers"
    );
    describe_counter!(
        "webhook_delivery_success_total",
        "Deliveries that reached the delivered state"
    );
    describe_counter!(
        "webhook_delivery_retry_scheduled_total",
        "Failed attempts that were scheduled for retry"
    );
    describe_counter!(
        "webhook_delivery_failed_total",
        "Deliveries that reached the failed state"
    );
    describe_counter!(
        "webhook_deliveries_cancelled_total",
        "Deliveries cancelled through the API"
    );
    describe_counter!(
        "webhook_stale_deliveries_reset_total",
        "Abandoned claims returned to the retry queue"
    );
    describe_histogram!(
        "webhook_delivery_duration_seconds",
        Unit::Seconds,
        "Latency of outbound webhook requests"
    );
}
