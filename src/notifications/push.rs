use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use crate::config::PushConfig;

/// Deep-link payload the mobile app uses to open the chat screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushData {
    pub screen: String,
    pub counterparty_id: String,
    pub counterparty_display_name: String,
    pub counterparty_avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushNotification {
    pub device_token: String,
    pub title: String,
    pub body: String,
    pub data: PushData,
}

/// Outbound push collaborator. Delivery is fire-and-forget from the caller's
/// point of view; errors are reported for logging only.
#[async_trait]
pub trait PushClient: Send + Sync {
    /// False when pushes are configured off; callers skip `notify` entirely
    fn is_enabled(&self) -> bool {
        true
    }

    async fn notify(&self, notification: &PushNotification) -> Result<()>;
}

/// Expo-style HTTP push client
pub struct HttpPushClient {
    http: reqwest::Client,
    config: PushConfig,
}

impl HttpPushClient {
    pub fn new(config: PushConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build push HTTP client")?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl PushClient for HttpPushClient {
    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn notify(&self, notification: &PushNotification) -> Result<()> {
        if !self.config.enabled {
            anyhow::bail!("Push delivery is disabled");
        }

        let body = json!({
            "to": notification.device_token,
            "title": notification.title,
            "body": notification.body,
            "data": notification.data,
            "sound": "default",
            "priority": "high",
        });

        let mut request = self.http.post(&self.config.endpoint).json(&body);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach push service")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Push service returned {}: {}", status, detail);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool) -> PushConfig {
        PushConfig {
            enabled,
            endpoint: "http://127.0.0.1:9/push".to_string(),
            access_token: None,
            timeout_secs: 1,
        }
    }

    fn notification() -> PushNotification {
        PushNotification {
            device_token: "ExponentPushToken[w1]".to_string(),
            title: "New message from Acme".to_string(),
            body: "Hi".to_string(),
            data: PushData {
                screen: "chat".to_string(),
                counterparty_id: "biz-1".to_string(),
                counterparty_display_name: "Acme".to_string(),
                counterparty_avatar: None,
            },
        }
    }

    #[tokio::test]
    async fn test_disabled_client_reports_disabled_and_never_succeeds() {
        let client = HttpPushClient::new(config(false)).unwrap();
        assert!(!client.is_enabled());
        assert!(client.notify(&notification()).await.is_err());

        assert!(HttpPushClient::new(config(true)).unwrap().is_enabled());
    }
}
