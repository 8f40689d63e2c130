// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::WebhookSettings;
use crate::domain::services::event_dispatcher::EventDispatcher;
use crate::domain::services::registry_events::RegistryEventPublisher;
use crate::domain::services::webhook_registry::WebhookRegistry;
use crate::domain::services::webhook_service::WebhookService;
use crate::domain::use_cases::test_webhook::TestWebhookUseCase;
use crate::infrastructure::repositories::webhook_delivery_repo_impl::WebhookDeliveryRepoImpl;
use crate::infrastructure::repositories::webhook_repo_impl::WebhookRepoImpl;
use crate::presentation::handlers::{delivery_handler, event_handler, webhook_handler};
use axum::{
    routing::{get, post},
    Extension, Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

type Registry = WebhookRegistry<WebhookRepoImpl, WebhookDeliveryRepoImpl>;
type Dispatcher = EventDispatcher<WebhookRepoImpl, WebhookDeliveryRepoImpl>;
type TestUseCase = TestWebhookUseCase<WebhookRepoImpl>;

/// HTTP层依赖的服务集合
#[derive(Clone)]
pub struct AppServices {
    pub registry: Arc<Registry>,
    pub dispatcher: Arc<Dispatcher>,
    pub tester: Arc<TestUseCase>,
}

impl AppServices {
    /// 基于数据库连接装配服务
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    /// * `sender` - 测试投递使用的HTTP发送实现
    /// * `publisher` - 注册表事件发布者
    /// * `settings` - 投递配置（测试投递的 User-Agent 与响应体长度上限）
    pub fn new(
        db: Arc<DatabaseConnection>,
        sender: Arc<dyn WebhookService>,
        publisher: Arc<dyn RegistryEventPublisher>,
        settings: &WebhookSettings,
    ) -> Self {
        let webhooks = Arc::new(WebhookRepoImpl::new(db.clone()));
        let deliveries = Arc::new(WebhookDeliveryRepoImpl::new(db));

        Self {
            registry: Arc::new(WebhookRegistry::new(
                webhooks.clone(),
                deliveries.clone(),
                publisher,
            )),
            dispatcher: Arc::new(EventDispatcher::new(webhooks.clone(), deliveries)),
            tester: Arc::new(TestWebhookUseCase::new(
                webhooks,
                sender,
                settings.user_agent.clone(),
                settings.max_response_body_chars,
            )),
        }
    }
}

/// 创建应用路由
///
/// # 返回值
///
/// 返回配置好的路由（尚未注入服务）
pub fn routes() -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let webhook_routes = Router::new()
        .route(
            "/v1/organizations/{organization_id}/webhooks",
            post(webhook_handler::create_webhook::<WebhookRepoImpl, WebhookDeliveryRepoImpl>)
                .get(webhook_handler::list_webhooks::<WebhookRepoImpl, WebhookDeliveryRepoImpl>),
        )
        .route(
            "/v1/webhooks/{id}",
            get(webhook_handler::get_webhook::<WebhookRepoImpl, WebhookDeliveryRepoImpl>)
                .patch(webhook_handler::update_webhook::<WebhookRepoImpl, WebhookDeliveryRepoImpl>)
                .delete(webhook_handler::delete_webhook::<WebhookRepoImpl, WebhookDeliveryRepoImpl>),
        )
        .route(
            "/v1/webhooks/{id}/activate",
            post(webhook_handler::activate_webhook::<WebhookRepoImpl, WebhookDeliveryRepoImpl>),
        )
        .route(
            "/v1/webhooks/{id}/deactivate",
            post(webhook_handler::deactivate_webhook::<WebhookRepoImpl, WebhookDeliveryRepoImpl>),
        )
        .route(
            "/v1/webhooks/{id}/rotate-secret",
            post(webhook_handler::rotate_secret::<WebhookRepoImpl, WebhookDeliveryRepoImpl>),
        )
        .route(
            "/v1/webhooks/{id}/test",
            post(webhook_handler::test_webhook::<WebhookRepoImpl>),
        )
        .route(
            "/v1/webhooks/{id}/deliveries",
            get(delivery_handler::list_deliveries::<WebhookRepoImpl, WebhookDeliveryRepoImpl>),
        )
        .route(
            "/v1/deliveries/{id}",
            get(delivery_handler::get_delivery::<WebhookRepoImpl, WebhookDeliveryRepoImpl>),
        )
        .route(
            "/v1/deliveries/{id}/cancel",
            post(delivery_handler::cancel_delivery::<WebhookRepoImpl, WebhookDeliveryRepoImpl>),
        )
        .route(
            "/v1/events",
            post(event_handler::publish_event::<WebhookRepoImpl, WebhookDeliveryRepoImpl>),
        );

    Router::new().merge(public_routes).merge(webhook_routes)
}

/// 创建注入了服务与请求追踪的完整应用
pub fn app(services: AppServices) -> Router {
    routes()
        .layer(Extension(services.registry))
        .layer(Extension(services.dispatcher))
        .layer(Extension(services.tester))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
///
/// # 返回值
///
/// 返回应用版本号
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
