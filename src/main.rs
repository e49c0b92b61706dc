use printdesk_api::config::{init_tracing, load_config};
use printdesk_api::db::{establish_connection_from_app_config, run_migrations};
use printdesk_api::events::{event_channel, process_events};
use printdesk_api::message_queue::{InMemoryPrintQueue, PrintQueue, RedisPrintQueue};
use printdesk_api::services::chat::{ChatProvider, NoopChatClient, TwilioChatClient};
use printdesk_api::services::payment_links::HttpPaymentLinkClient;
use printdesk_api::{app_router, build_app_state};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(load_config()?);
    init_tracing(&config.log_level, config.log_json);
    info!(
        environment = %config.environment,
        "Starting printdesk-api v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db = Arc::new(establish_connection_from_app_config(&config).await?);
    if config.auto_migrate {
        run_migrations(&db).await?;
    }

    let queue: Arc<dyn PrintQueue> = match config.queue_backend.as_str() {
        "in-memory" => {
            warn!("Using in-memory print queue; jobs do not survive restarts");
            Arc::new(InMemoryPrintQueue::new())
        }
        _ => Arc::new(RedisPrintQueue::from_url(
            &config.redis_url,
            config.queue_name.clone(),
        )?),
    };

    let chat: Arc<dyn ChatProvider> = match (
        config.chat_account_sid.clone(),
        config.chat_auth_token.clone(),
        config.chat_from_number.clone(),
    ) {
        (Some(sid), Some(token), Some(from)) => {
            Arc::new(TwilioChatClient::new(sid, token, from))
        }
        _ => {
            warn!("Chat credentials not configured; outbound messages are logged only");
            Arc::new(NoopChatClient)
        }
    };

    let payment_links = Arc::new(HttpPaymentLinkClient::new(
        config.payment_api_base.clone(),
        config.payment_key_id.clone().unwrap_or_default(),
        config.payment_key_secret.clone().unwrap_or_default(),
    ));

    let (event_sender, event_rx) = event_channel(1024);
    tokio::spawn(process_events(event_rx));

    tokio::fs::create_dir_all(&config.file_storage_path).await?;

    let state = build_app_state(
        config.clone(),
        db,
        queue,
        chat,
        payment_links,
        Arc::new(event_sender),
    );
    let app = app_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
