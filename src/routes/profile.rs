// ============================================================================
// Profile Routes
// ============================================================================
//
// Endpoints:
// - PUT    /api/v1/profile - Display name and avatar shown to counterparties
// - PUT    /api/v1/device-token - Register push token
// - DELETE /api/v1/device-token - Unregister push token (logout)
// - PUT    /api/v1/presence - Report foreground/background app state
//
// ============================================================================

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use std::sync::Arc;

use crate::context::AppContext;
use crate::directory::AppState;
use crate::error::AppError;
use crate::routes::extractors::TrustedUser;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub display_name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTokenRequest {
    pub device_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRequest {
    pub app_state: AppState,
}

/// PUT /api/v1/profile
pub async fn update_profile(
    State(app_context): State<Arc<AppContext>>,
    user: TrustedUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = app_context
        .directory
        .upsert_profile(&user.0, &request.display_name, request.avatar.as_deref())
        .await?;
    Ok(Json(profile))
}

/// PUT /api/v1/device-token
pub async fn register_device_token(
    State(app_context): State<Arc<AppContext>>,
    user: TrustedUser,
    Json(request): Json<DeviceTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let token = request.device_token.trim();
    if token.is_empty() {
        return Err(AppError::validation("deviceToken cannot be empty"));
    }

    app_context
        .directory
        .set_device_token(&user.0, Some(token))
        .await?;

    tracing::debug!(
        user = %app_context.config.logging.user_ref(&user.0),
        "Device token registered"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/device-token
pub async fn unregister_device_token(
    State(app_context): State<Arc<AppContext>>,
    user: TrustedUser,
) -> Result<impl IntoResponse, AppError> {
    app_context.directory.set_device_token(&user.0, None).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/presence
pub async fn update_presence(
    State(app_context): State<Arc<AppContext>>,
    user: TrustedUser,
    Json(request): Json<PresenceRequest>,
) -> Result<impl IntoResponse, AppError> {
    app_context
        .directory
        .set_app_state(&user.0, request.app_state)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
