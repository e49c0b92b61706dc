pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod message_queue;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod services;
pub mod storage;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::handlers::AppServices;
use crate::message_queue::PrintQueue;
use crate::services::chat::ChatProvider;
use crate::services::conversation::ConversationService;
use crate::services::orders::OrderService;
use crate::services::payment_links::PaymentLinkProvider;
use crate::services::payments::PaymentWebhookService;
use crate::services::print_jobs::PrintJobService;
use crate::services::sessions::SessionService;
use crate::storage::FileStore;
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub services: AppServices,
    pub event_sender: Arc<EventSender>,
}

/// Wires every service from its dependencies. Both the binary and the
/// test harness build state through here so the object graph stays in
/// one place.
pub fn build_app_state(
    config: Arc<AppConfig>,
    db: Arc<DbPool>,
    queue: Arc<dyn PrintQueue>,
    chat: Arc<dyn ChatProvider>,
    payment_links: Arc<dyn PaymentLinkProvider>,
    event_sender: Arc<EventSender>,
) -> AppState {
    let store = Arc::new(FileStore::new(
        config.file_storage_path.clone(),
        config.public_base_url.clone(),
    ));

    let sessions = Arc::new(SessionService::new(
        db.clone(),
        config.session_timeout_minutes,
    ));
    let orders = Arc::new(OrderService::new(
        db.clone(),
        payment_links,
        Some(event_sender.clone()),
        config.page_rates(),
        config.default_shop_id,
    ));
    let conversation = Arc::new(ConversationService::new(
        sessions.clone(),
        orders.clone(),
        chat.clone(),
        store,
    ));
    let payments = Arc::new(PaymentWebhookService::new(
        db.clone(),
        orders.clone(),
        sessions.clone(),
        chat.clone(),
        queue.clone(),
        config.payment_webhook_secret.clone(),
    ));
    let print_jobs = Arc::new(PrintJobService::new(
        db.clone(),
        chat,
        queue,
        Some(event_sender.clone()),
    ));

    AppState {
        db,
        config,
        services: AppServices {
            conversation,
            orders,
            sessions,
            payments,
            print_jobs,
        },
        event_sender,
    }
}

/// Builds the full HTTP router: webhooks, the worker API, stored file
/// serving, docs, and health.
pub fn app_router(state: AppState) -> Router {
    let files_dir = state.config.file_storage_path.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/status", get(health_check))
        .nest("/webhooks/chat", handlers::chat_webhooks::chat_webhook_routes())
        .nest(
            "/webhooks/payments",
            handlers::payment_webhooks::payment_webhook_routes(),
        )
        .nest(
            "/api/v1/print-jobs",
            handlers::print_jobs::print_job_routes(),
        )
        .nest_service("/files", ServeDir::new(files_dir))
        .merge(openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Liveness probe.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
