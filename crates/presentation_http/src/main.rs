//! Cloudhook server
//!
//! Binds the webhook endpoint, wires the dispatcher, and runs until
//! shutdown. Handler registrations happen here; the library crates stay
//! free of application policy.

use std::sync::Arc;

use dispatch::{Dispatcher, HandlerRegistry, handler_fn};
use domain::{Filter, Update, UpdateKind};
use integration_whatsapp::{WhatsAppClient, WhatsAppClientConfig};
use presentation_http::{AppState, ServerConfig, create_router, spawn_dispatch_worker};
use secrecy::ExposeSecret;
use tokio::{net::TcpListener, signal, sync::mpsc};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloudhook=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Cloudhook v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load()?;
    info!(
        host = %config.host,
        port = config.port,
        path = %config.webhook_path,
        "Configuration loaded"
    );
    if config.app_secret.is_none() {
        warn!("app_secret not configured, webhook signature verification is DISABLED");
    }

    let access_token = config
        .whatsapp
        .access_token
        .as_ref()
        .map(|s| s.expose_secret().to_string())
        .ok_or_else(|| anyhow::anyhow!("whatsapp.access_token is required"))?;
    let phone_number_id = config
        .whatsapp
        .phone_number_id
        .clone()
        .ok_or_else(|| anyhow::anyhow!("whatsapp.phone_number_id is required"))?;
    let client = WhatsAppClient::new(WhatsAppClientConfig {
        access_token,
        phone_number_id,
        api_version: config.whatsapp.api_version.clone(),
        base_url: None,
    })?;

    let registry = Arc::new(HandlerRegistry::new());
    register_default_handlers(&registry);

    let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::new(client));
    let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
    let worker = spawn_dispatch_worker(dispatcher, queue_rx);

    let state = AppState {
        config: Arc::new(config.clone()),
        queue_tx,
    };
    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("🚀 Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Serving is done, so the queue sender is dropped and the worker
    // drains what is left before exiting
    worker.await?;
    info!("Shutdown complete");
    Ok(())
}

/// Built-in registrations. Low priority, so application handlers
/// registered ahead of them win.
fn register_default_handlers(registry: &Arc<HandlerRegistry<WhatsAppClient>>) {
    registry.register(
        UpdateKind::Message,
        Filter::any(),
        100,
        handler_fn(
            "message_log",
            |_client: Arc<WhatsAppClient>, update: Update| async move {
                info!(
                    sender = %update.sender,
                    text = update.text().unwrap_or(""),
                    "Incoming message"
                );
                Ok(())
            },
        ),
    );
    registry.register(
        UpdateKind::Unsupported,
        Filter::any(),
        100,
        handler_fn(
            "unsupported_log",
            |_client: Arc<WhatsAppClient>, update: Update| async move {
                warn!(entry_id = %update.entry_id, "Received unsupported update");
                Ok(())
            },
        ),
    );
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        () = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
