// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::WebhookSettings;
use crate::domain::repositories::webhook_delivery_repository::WebhookDeliveryRepository;
use crate::domain::repositories::webhook_repository::WebhookRepository;
use crate::domain::services::webhook_service::WebhookService;
use crate::workers::webhook_worker::WebhookWorker;
use crate::workers::worker::Worker;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// 工作管理器
///
/// 启动多个投递工作器实例，多个实例之间依靠认领操作互斥
pub struct WorkerManager<W, D>
where
    W: WebhookRepository + 'static,
    D: WebhookDeliveryRepository + 'static,
{
    webhooks: Arc<W>,
    deliveries: Arc<D>,
    sender: Arc<dyn WebhookService>,
    settings: WebhookSettings,
    handles: Vec<JoinHandle<()>>,
}

impl<W, D> WorkerManager<W, D>
where
    W: WebhookRepository + 'static,
    D: WebhookDeliveryRepository + 'static,
{
    pub fn new(
        webhooks: Arc<W>,
        deliveries: Arc<D>,
        sender: Arc<dyn WebhookService>,
        settings: WebhookSettings,
    ) -> Self {
        Self {
            webhooks,
            deliveries,
            sender,
            settings,
            handles: Vec::new(),
        }
    }

    /// 启动工作进程
    ///
    /// # 参数
    ///
    /// * `count` - 要启动的工作进程数量
    pub fn start_workers(&mut self, count: usize) {
        for i in 0..count {
            let worker = WebhookWorker::new(
                self.webhooks.clone(),
                self.deliveries.clone(),
                self.sender.clone(),
                self.settings.clone(),
            )
            .with_name(format!("webhook-worker-{}", i));

            let handle = tokio::spawn(async move {
                if let Err(e) = worker.run().await {
                    error!(worker = %worker.name(), "Worker exited: {}", e);
                }
            });
            self.handles.push(handle);
        }
        info!("Started {} webhook workers", count);
    }

    /// 已启动的工作进程数量
    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// 停止所有工作进程
    ///
    /// 正在进行的投递会被中断，认领超时后由其他实例恢复
    pub fn shutdown(&mut self) {
        info!("Shutting down workers...");
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        info!("Workers shut down successfully");
    }

    /// 等待关闭信号并关闭工作进程
    pub async fn wait_for_shutdown(&mut self) {
        shutdown_signal().await;
        self.shutdown();
    }
}

/// 等待 Ctrl+C
pub async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => error!("Unable to listen for shutdown signal: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::webhook_delivery_repo_impl::WebhookDeliveryRepoImpl;
    use crate::infrastructure::repositories::webhook_repo_impl::WebhookRepoImpl;
    use crate::infrastructure::services::webhook_service_impl::ReqwestWebhookService;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;
    use std::time::Duration;

    #[tokio::test]
    async fn test_start_and_shutdown_workers() {
        let db = Arc::new(Database::connect("sqlite::memory:").await.unwrap());
        Migrator::up(db.as_ref(), None).await.unwrap();

        let sender = Arc::new(ReqwestWebhookService::new(Duration::from_secs(1)).unwrap());
        let mut manager = WorkerManager::new(
            Arc::new(WebhookRepoImpl::new(db.clone())),
            Arc::new(WebhookDeliveryRepoImpl::new(db)),
            sender,
            WebhookSettings::default(),
        );

        manager.start_workers(3);
        assert_eq!(manager.worker_count(), 3);

        manager.shutdown();
        assert_eq!(manager.worker_count(), 0);
    }
}
