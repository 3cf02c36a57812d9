// ============================================================================
// Notification Dispatcher
// ============================================================================
//
// Decides whether a stored message also needs a push notification:
//
// - receiver has a live connection and the app is not backgrounded: skip
// - receiver has no registered device token: skip
// - push delivery is switched off: skip
// - otherwise: one push via the PushClient
//
// Never fails the send. Every outcome is returned for logging and tests.
//
// ============================================================================

pub mod push;

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::LoggingConfig;
use crate::directory::{AppState, UserDirectory};
use crate::message::Message;
use crate::metrics;
use crate::realtime::RealtimeChannel;

pub use push::{HttpPushClient, PushClient, PushData, PushNotification};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Receiver is looking at the app; the live frame is enough
    SkippedLive,
    NoDeviceToken,
    /// Push delivery is switched off by configuration
    PushDisabled,
    Sent,
    Failed(String),
}

pub struct NotificationDispatcher {
    realtime: Arc<RealtimeChannel>,
    directory: Arc<dyn UserDirectory>,
    push: Arc<dyn PushClient>,
    logging: LoggingConfig,
}

impl NotificationDispatcher {
    pub fn new(
        realtime: Arc<RealtimeChannel>,
        directory: Arc<dyn UserDirectory>,
        push: Arc<dyn PushClient>,
        logging: LoggingConfig,
    ) -> Self {
        Self {
            realtime,
            directory,
            push,
            logging,
        }
    }

    /// Push `message` to `receiver_id` unless they are already live.
    /// `sender_display_name` and `sender_avatar` feed the title and deep link.
    pub async fn maybe_notify(
        &self,
        receiver_id: &str,
        message: &Message,
        sender_display_name: &str,
        sender_avatar: Option<&str>,
    ) -> NotifyOutcome {
        let receiver_ref = self.logging.user_ref(receiver_id);

        let profile = match self.directory.profile(receiver_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(receiver = %receiver_ref, error = %e, "Profile lookup failed, skipping push");
                metrics::PUSH_FAILED_TOTAL.inc();
                return NotifyOutcome::Failed(e.to_string());
            }
        };

        let backgrounded = profile
            .as_ref()
            .map(|p| p.app_state == AppState::Background)
            .unwrap_or(false);

        if !backgrounded && self.realtime.has_subscribers(receiver_id).await {
            debug!(receiver = %receiver_ref, message_id = message.id, "Receiver is live, no push");
            metrics::PUSH_SKIPPED_TOTAL.inc();
            return NotifyOutcome::SkippedLive;
        }

        let Some(device_token) = profile.and_then(|p| p.device_token) else {
            debug!(receiver = %receiver_ref, "No device token registered, no push");
            metrics::PUSH_SKIPPED_TOTAL.inc();
            return NotifyOutcome::NoDeviceToken;
        };

        if !self.push.is_enabled() {
            debug!(receiver = %receiver_ref, message_id = message.id, "Push disabled, no push");
            metrics::PUSH_SKIPPED_TOTAL.inc();
            return NotifyOutcome::PushDisabled;
        }

        let notification = PushNotification {
            device_token,
            title: format!("New message from {}", sender_display_name),
            body: message.text.clone(),
            data: PushData {
                screen: "chat".to_string(),
                counterparty_id: message.sender_id.clone(),
                counterparty_display_name: sender_display_name.to_string(),
                counterparty_avatar: sender_avatar.map(str::to_string),
            },
        };

        match self.push.notify(&notification).await {
            Ok(()) => {
                debug!(receiver = %receiver_ref, message_id = message.id, "Push notification sent");
                metrics::PUSH_SENT_TOTAL.inc();
                NotifyOutcome::Sent
            }
            Err(e) => {
                warn!(
                    receiver = %receiver_ref,
                    message_id = message.id,
                    error = %e,
                    "Push notification failed"
                );
                metrics::PUSH_FAILED_TOTAL.inc();
                NotifyOutcome::Failed(e.to_string())
            }
        }
    }
}
