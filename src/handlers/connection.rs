use crate::message::ServerMessage;
use crate::realtime::{RealtimeChannel, Subscription};
use futures_util::stream::SplitSink;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;

pub type WebSocketStreamType = WebSocketStream<TcpStream>;

/// Per-connection state: `Disconnected` until a subscribe binds a user
pub struct ConnectionHandler {
    ws_sender: SplitSink<WebSocketStreamType, WsMessage>,
    subscription: Option<Subscription>,
    addr: SocketAddr,
}

impl ConnectionHandler {
    pub fn new(ws_sender: SplitSink<WebSocketStreamType, WsMessage>, addr: SocketAddr) -> Self {
        Self {
            ws_sender,
            subscription: None,
            addr,
        }
    }

    pub async fn send_json(&mut self, msg: &ServerMessage) -> Result<(), String> {
        use futures_util::SinkExt;

        let text =
            serde_json::to_string(msg).map_err(|e| format!("Failed to serialize message: {}", e))?;

        self.ws_sender
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| format!("Failed to send message: {}", e))?;

        Ok(())
    }

    pub async fn send_error(&mut self, code: &str, message: &str) {
        let error = ServerMessage::Error {
            code: code.to_string(),
            message: message.to_string(),
        };
        if self.send_json(&error).await.is_err() {
            tracing::debug!("Failed to send error to disconnected client {}", self.addr);
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.subscription.as_ref().map(|s| s.user_id.as_str())
    }

    pub fn subscription_mut(&mut self) -> &mut Option<Subscription> {
        &mut self.subscription
    }

    /// Replace the bound subscription, returning the previous one
    pub fn bind(&mut self, subscription: Subscription) -> Option<Subscription> {
        self.subscription.replace(subscription)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn ws_sender_mut(&mut self) -> &mut SplitSink<WebSocketStreamType, WsMessage> {
        &mut self.ws_sender
    }

    pub async fn disconnect(&mut self, realtime: &RealtimeChannel) {
        if let Some(sub) = self.subscription.take() {
            realtime.unsubscribe(&sub.user_id, sub.id).await;
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}
