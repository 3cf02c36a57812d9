use crate::config::Config;
use crate::delivery::DeliveryGateway;
use crate::directory::UserDirectory;
use crate::notifications::{NotificationDispatcher, PushClient};
use crate::realtime::RealtimeChannel;
use crate::store::MessageStore;
use std::sync::Arc;

/// Application context containing shared dependencies
/// Cloned into every HTTP request and WebSocket connection task
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn MessageStore>,
    pub directory: Arc<dyn UserDirectory>,
    pub realtime: Arc<RealtimeChannel>,
    pub gateway: Arc<DeliveryGateway>,
}

impl AppContext {
    /// Wires the messaging components around the given storage and push backends
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn MessageStore>,
        directory: Arc<dyn UserDirectory>,
        push: Arc<dyn PushClient>,
    ) -> Self {
        let realtime = Arc::new(RealtimeChannel::new(config.realtime.connection_buffer));
        let notifications = Arc::new(NotificationDispatcher::new(
            realtime.clone(),
            directory.clone(),
            push,
            config.logging.clone(),
        ));
        let gateway = Arc::new(DeliveryGateway::new(
            store.clone(),
            directory.clone(),
            realtime.clone(),
            notifications,
            config.logging.clone(),
        ));

        Self {
            config,
            store,
            directory,
            realtime,
            gateway,
        }
    }
}
