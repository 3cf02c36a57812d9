use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;

use crate::context::AppContext;
use crate::error::AppError;
use crate::routes::extractors::TrustedUser;

/// GET /api/v1/conversations
/// One summary per counterparty, most recent activity first
pub async fn list_conversations(
    State(app_context): State<Arc<AppContext>>,
    user: TrustedUser,
) -> Result<impl IntoResponse, AppError> {
    let summaries = app_context.gateway.conversations(&user.0).await?;
    Ok(Json(summaries))
}
