use anyhow::{Context, Result};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_tungstenite::accept_async;
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod config;
pub mod context;
pub mod conversations;
pub mod db;
pub mod delivery;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod health;
pub mod message;
pub mod metrics;
pub mod notifications;
pub mod realtime;
pub mod routes;
pub mod store;
pub mod utils;

use config::{Config, StorageBackend};
use context::AppContext;
use directory::{InMemoryDirectory, PostgresDirectory, UserDirectory};
use handlers::handle_websocket;
use notifications::{HttpPushClient, PushClient};
use store::{InMemoryMessageStore, MessageStore, PostgresMessageStore};

/// Build the application context for the configured storage backend
pub async fn build_context(config: Config) -> Result<AppContext> {
    let (store, directory): (Arc<dyn MessageStore>, Arc<dyn UserDirectory>) =
        match config.storage_backend {
            StorageBackend::Postgres => {
                let database_url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is required for the postgres backend")?;

                let pool = db::create_pool(database_url, &config.db).await?;
                tracing::info!("Connected to database");

                tracing::info!("Applying database migrations...");
                db::run_migrations(&pool).await?;
                tracing::info!("Database migrations applied successfully.");

                (
                    Arc::new(PostgresMessageStore::new(pool.clone())),
                    Arc::new(PostgresDirectory::new(pool)),
                )
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage - messages are lost on restart");
                (
                    Arc::new(InMemoryMessageStore::new()),
                    Arc::new(InMemoryDirectory::new()),
                )
            }
        };

    let push: Arc<dyn PushClient> = Arc::new(HttpPushClient::new(config.push.clone())?);
    if !config.push.enabled {
        tracing::info!("Push notifications are disabled");
    }

    Ok(AppContext::new(Arc::new(config), store, directory, push))
}

pub async fn run_http_server(app_context: AppContext, listener: TcpListener) -> Result<()> {
    let router = routes::create_router(Arc::new(app_context));
    axum::serve(listener, router)
        .await
        .context("HTTP server failed")?;
    Ok(())
}

pub async fn run_websocket_server(app_context: AppContext, listener: TcpListener) {
    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to accept socket: {}", e);
                continue;
            }
        };

        let ctx = app_context.clone();

        tokio::spawn(
            async move {
                match accept_async(socket).await {
                    Ok(ws_stream) => handle_websocket(ws_stream, addr, ctx).await,
                    Err(e) => tracing::debug!("WebSocket upgrade failed for {}: {}", addr, e),
                }
            }
            .instrument(tracing::info_span!("websocket_connection", addr = %addr)),
        );
    }
}

pub async fn run() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let http_address = format!("0.0.0.0:{}", config.port);
    let ws_address = format!("0.0.0.0:{}", config.ws_port);

    let app_context = build_context(config).await?;

    let http_listener = TcpListener::bind(&http_address).await?;
    tracing::info!("HTTP API listening on http://{}", http_address);

    let ws_listener = TcpListener::bind(&ws_address).await?;
    tracing::info!("Live subscriptions listening on ws://{}", ws_address);

    let realtime = app_context.realtime.clone();
    let websocket_server = run_websocket_server(app_context.clone(), ws_listener);
    let http_server = run_http_server(app_context, http_listener);

    tokio::select! {
        _ = websocket_server => {
            tracing::info!("WebSocket server shut down.");
        },
        res = http_server => {
            if let Err(e) = res {
                tracing::error!("HTTP server failed: {:#}", e);
            }
        },
        _ = signal::ctrl_c() => {
            tracing::info!("Received shutdown signal.");
        }
    }

    realtime.close_all().await;
    tracing::info!("Server shut down.");
    Ok(())
}
