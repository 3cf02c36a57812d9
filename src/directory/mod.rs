// ============================================================================
// User Directory
// ============================================================================
//
// Display data and push routing for participants. The identity provider is
// trusted: profiles are written as reported, never re-validated.
//
// ============================================================================

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::AppResult;

pub use memory::InMemoryDirectory;
pub use postgres::PostgresDirectory;

/// Whether the participant's app is on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    #[default]
    Foreground,
    Background,
}

impl AppState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::Foreground => "foreground",
            AppState::Background => "background",
        }
    }
}

impl std::str::FromStr for AppState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "foreground" => Ok(AppState::Foreground),
            "background" => Ok(AppState::Background),
            other => Err(format!("unknown app state '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
    pub avatar: Option<String>,
    #[serde(skip_serializing)]
    pub device_token: Option<String>,
    pub app_state: AppState,
}

impl UserProfile {
    /// Profile used when the directory knows nothing about a user
    pub fn placeholder(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name: user_id.to_string(),
            avatar: None,
            device_token: None,
            app_state: AppState::Foreground,
        }
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn profile(&self, user_id: &str) -> AppResult<Option<UserProfile>>;

    /// Batch lookup; unknown ids are simply absent from the result
    async fn profiles(&self, user_ids: &[String]) -> AppResult<HashMap<String, UserProfile>>;

    async fn upsert_profile(
        &self,
        user_id: &str,
        display_name: &str,
        avatar: Option<&str>,
    ) -> AppResult<UserProfile>;

    /// Register (`Some`) or forget (`None`) the device token for pushes
    async fn set_device_token(&self, user_id: &str, device_token: Option<&str>) -> AppResult<()>;

    async fn set_app_state(&self, user_id: &str, state: AppState) -> AppResult<()>;
}
