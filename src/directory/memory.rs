use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{AppState, UserDirectory, UserProfile};
use crate::error::AppResult;
use crate::store::validate_user_id;

#[derive(Default)]
pub struct InMemoryDirectory {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn profile(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn profiles(&self, user_ids: &[String]) -> AppResult<HashMap<String, UserProfile>> {
        let profiles = self.profiles.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| profiles.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }

    async fn upsert_profile(
        &self,
        user_id: &str,
        display_name: &str,
        avatar: Option<&str>,
    ) -> AppResult<UserProfile> {
        validate_user_id(user_id, "userId")?;
        validate_user_id(display_name, "displayName")?;

        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::placeholder(user_id));
        profile.display_name = display_name.trim().to_string();
        profile.avatar = avatar.map(str::to_string);
        Ok(profile.clone())
    }

    async fn set_device_token(&self, user_id: &str, device_token: Option<&str>) -> AppResult<()> {
        validate_user_id(user_id, "userId")?;

        let mut profiles = self.profiles.write().await;
        profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::placeholder(user_id))
            .device_token = device_token.map(str::to_string);
        Ok(())
    }

    async fn set_app_state(&self, user_id: &str, state: AppState) -> AppResult<()> {
        validate_user_id(user_id, "userId")?;

        let mut profiles = self.profiles.write().await;
        profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::placeholder(user_id))
            .app_state = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_keeps_device_token() {
        let directory = InMemoryDirectory::new();
        directory.set_device_token("worker-1", Some("ExponentPushToken[abc]")).await.unwrap();
        let profile = directory
            .upsert_profile("worker-1", " Dana ", Some("https://cdn.example/dana.png"))
            .await
            .unwrap();

        assert_eq!(profile.display_name, "Dana");
        assert_eq!(profile.device_token.as_deref(), Some("ExponentPushToken[abc]"));
        assert_eq!(profile.app_state, AppState::Foreground);
    }

    #[tokio::test]
    async fn test_batch_lookup_skips_unknown_users() {
        let directory = InMemoryDirectory::new();
        directory.upsert_profile("biz-1", "Acme Staffing", None).await.unwrap();

        let found = directory
            .profiles(&["biz-1".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["biz-1"].display_name, "Acme Staffing");
    }

    #[tokio::test]
    async fn test_app_state_and_token_removal() {
        let directory = InMemoryDirectory::new();
        directory.set_device_token("worker-1", Some("token")).await.unwrap();
        directory.set_app_state("worker-1", AppState::Background).await.unwrap();
        directory.set_device_token("worker-1", None).await.unwrap();

        let profile = directory.profile("worker-1").await.unwrap().unwrap();
        assert_eq!(profile.app_state, AppState::Background);
        assert!(profile.device_token.is_none());
        assert_eq!(profile.display_name, "worker-1");
    }
}
