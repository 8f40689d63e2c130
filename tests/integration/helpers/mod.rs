// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum_test::TestServer;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use webhook_relay::config::settings::WebhookSettings;
use webhook_relay::domain::services::registry_events::TracingEventPublisher;
use webhook_relay::domain::services::webhook_service::WebhookService;
use webhook_relay::infrastructure::repositories::webhook_delivery_repo_impl::WebhookDeliveryRepoImpl;
use webhook_relay::infrastructure::repositories::webhook_repo_impl::WebhookRepoImpl;
use webhook_relay::infrastructure::services::webhook_service_impl::ReqwestWebhookService;
use webhook_relay::presentation::routes::{self, AppServices};
use webhook_relay::workers::webhook_worker::WebhookWorker;

pub const TEST_USER_AGENT: &str = "webhook-relay-it";

#[allow(dead_code)]
pub struct TestApp {
    pub server: TestServer,
    pub db_pool: Arc<DatabaseConnection>,
    pub services: AppServices,
    pub webhooks: Arc<WebhookRepoImpl>,
    pub deliveries: Arc<WebhookDeliveryRepoImpl>,
    pub worker: WebhookWorker<WebhookRepoImpl, WebhookDeliveryRepoImpl>,
}

/// 基于内存SQLite创建完整应用（HTTP服务与一个不自动运行的工作器）
pub async fn create_test_app() -> TestApp {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to sqlite");
    let db = Arc::new(db);
    Migrator::up(db.as_ref(), None)
        .await
        .expect("Failed to run migrations");

    let sender: Arc<dyn WebhookService> = Arc::new(
        ReqwestWebhookService::new(Duration::from_secs(2)).expect("Failed to build client"),
    );
    let settings = WebhookSettings {
        user_agent: TEST_USER_AGENT.to_string(),
        ..WebhookSettings::default()
    };
    let services = AppServices::new(
        db.clone(),
        sender.clone(),
        Arc::new(TracingEventPublisher),
        &settings,
    );

    let webhooks = Arc::new(WebhookRepoImpl::new(db.clone()));
    let deliveries = Arc::new(WebhookDeliveryRepoImpl::new(db.clone()));
    let worker = WebhookWorker::new(webhooks.clone(), deliveries.clone(), sender, settings);

    let server = TestServer::new(routes::app(services.clone())).expect("Failed to start server");

    TestApp {
        server,
        db_pool: db,
        services,
        webhooks,
        deliveries,
        worker,
    }
}
