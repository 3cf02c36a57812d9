// ============================================================================
// Messages Routes
// ============================================================================
//
// Endpoints:
// - POST /api/v1/messages - Send a message to a counterparty
// - GET  /api/v1/messages/:counterparty_id?since=<id> - Conversation (poll)
// - POST /api/v1/messages/:counterparty_id/read - Mark received messages read
//
// ============================================================================

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderValue,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::context::AppContext;
use crate::error::AppError;
use crate::message::MessageId;
use crate::routes::extractors::TrustedUser;

pub const POLL_INTERVAL_HEADER: &str = "x-poll-interval-ms";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub receiver_id: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    pub since: Option<MessageId>,
}

/// POST /api/v1/messages
pub async fn send_message(
    State(app_context): State<Arc<AppContext>>,
    user: TrustedUser,
    Json(request): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_context
        .gateway
        .send(&user.0, &request.receiver_id, &request.text)
        .await?;

    Ok(Json(message))
}

/// GET /api/v1/messages/:counterparty_id
/// Initial load without `since`, incremental poll with it
pub async fn fetch_messages(
    State(app_context): State<Arc<AppContext>>,
    user: TrustedUser,
    Path(counterparty_id): Path<String>,
    Query(query): Query<FetchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let messages = app_context
        .gateway
        .fetch(&user.0, &counterparty_id, query.since)
        .await?;

    let mut response = Json(messages).into_response();
    response.headers_mut().insert(
        POLL_INTERVAL_HEADER,
        HeaderValue::from(app_context.config.realtime.poll_interval_ms),
    );
    Ok(response)
}

/// POST /api/v1/messages/:counterparty_id/read
pub async fn mark_read(
    State(app_context): State<Arc<AppContext>>,
    user: TrustedUser,
    Path(counterparty_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let updated = app_context
        .gateway
        .mark_read(&user.0, &counterparty_id)
        .await?;

    Ok(Json(json!({ "updated": updated })))
}
