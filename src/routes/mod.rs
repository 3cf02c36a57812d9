// ============================================================================
// Axum Routes Module
// ============================================================================
//
// Structure:
// - mod.rs: Main router assembly and middleware
// - health.rs: Health check and metrics endpoints
// - messages.rs: Send, fetch/poll and mark-read
// - conversations.rs: Conversation summaries
// - profile.rs: Profile, device token and presence
// - extractors.rs: Trusted caller identity
// - middleware.rs: Request logging
//
// ============================================================================

mod conversations;
mod extractors;
mod health;
mod messages;
mod middleware;
mod profile;

use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;

pub use extractors::{TrustedUser, USER_ID_HEADER};
pub use messages::POLL_INTERVAL_HEADER;

/// Create the main application router with all routes
pub fn create_router(app_context: Arc<AppContext>) -> Router {
    Router::new()
        // Health and monitoring
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        // Messages
        .route("/api/v1/messages", post(messages::send_message))
        .route(
            "/api/v1/messages/:counterparty_id",
            get(messages::fetch_messages),
        )
        .route(
            "/api/v1/messages/:counterparty_id/read",
            post(messages::mark_read),
        )
        .route(
            "/api/v1/conversations",
            get(conversations::list_conversations),
        )
        // Identity collaborator
        .route("/api/v1/profile", put(profile::update_profile))
        .route(
            "/api/v1/device-token",
            put(profile::register_device_token).delete(profile::unregister_device_token),
        )
        .route("/api/v1/presence", put(profile::update_presence))
        // Apply middleware (order matters - last added runs first)
        .layer(
            ServiceBuilder::new()
                // Tracing layer (outermost - runs first)
                .layer(TraceLayer::new_for_http())
                // Request logging
                .layer(axum::middleware::from_fn(middleware::request_logging))
                .into_inner(),
        )
        .with_state(app_context)
}
