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

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use webhook_relay::config::settings::Settings;
use webhook_relay::domain::services::registry_events::TracingEventPublisher;
use webhook_relay::domain::services::webhook_service::WebhookService;
use webhook_relay::infrastructure::database::connection;
use webhook_relay::infrastructure::metrics;
use webhook_relay::infrastructure::repositories::webhook_delivery_repo_impl::WebhookDeliveryRepoImpl;
use webhook_relay::infrastructure::repositories::webhook_repo_impl::WebhookRepoImpl;
use webhook_relay::infrastructure::services::webhook_service_impl::ReqwestWebhookService;
use webhook_relay::presentation::routes::{self, AppServices};
use webhook_relay::utils::telemetry;
use webhook_relay::workers::manager::{shutdown_signal, WorkerManager};

use migration::{Migrator, MigratorTrait};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // 2. Initialize logging
    telemetry::init_telemetry(settings.logging.format);
    info!("Starting webhook-relay...");

    // Initialize Prometheus Metrics
    if settings.metrics.enabled {
        metrics::init_metrics(settings.metrics.listen_addr);
    }

    // 3. Connect to database
    let db = connection::create_pool(&settings.database).await?;
    let db = Arc::new(db);
    info!("Database connection established");

    // Run database migrations
    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. Initialize Components
    // 按 UTF-8 最坏情况每字符四字节读取，截断在字符层面完成
    let sender: Arc<dyn WebhookService> = Arc::new(
        ReqwestWebhookService::new(settings.webhook.request_timeout())?
            .with_body_limit(settings.webhook.max_response_body_chars.saturating_mul(4)),
    );
    let services = AppServices::new(
        db.clone(),
        sender.clone(),
        Arc::new(TracingEventPublisher),
        &settings.webhook,
    );

    // 5. Start Workers
    let mut worker_manager = WorkerManager::new(
        Arc::new(WebhookRepoImpl::new(db.clone())),
        Arc::new(WebhookDeliveryRepoImpl::new(db.clone())),
        sender,
        settings.webhook.clone(),
    );
    worker_manager.start_workers(settings.webhook.workers);

    // 6. Start HTTP server
    let app = routes::app(services);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    worker_manager.shutdown();

    Ok(())
}
