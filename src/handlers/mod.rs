mod connection;
mod messages;
mod session;

use crate::config::MAX_WEBSOCKET_MESSAGE_SIZE;
use crate::context::AppContext;
use crate::message::{ClientMessage, ServerMessage};
use crate::metrics;
use crate::realtime::Subscription;
use connection::ConnectionHandler;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio_tungstenite::tungstenite::Message as WsMessage;

pub use connection::WebSocketStreamType;

/// Next frame for a bound connection; pends forever while unbound
async fn next_event(subscription: &mut Option<Subscription>) -> Option<ServerMessage> {
    match subscription {
        Some(sub) => sub.receiver.recv().await,
        None => std::future::pending().await,
    }
}

pub async fn handle_websocket(ws_stream: WebSocketStreamType, addr: SocketAddr, ctx: AppContext) {
    metrics::CONNECTIONS_TOTAL.inc();
    tracing::info!("New connection from: {}", addr);

    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let mut handler = ConnectionHandler::new(ws_sender, addr);

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        if text.len() > MAX_WEBSOCKET_MESSAGE_SIZE {
                            tracing::warn!(
                                size_bytes = text.len(),
                                limit_kb = MAX_WEBSOCKET_MESSAGE_SIZE / 1024,
                                "Frame too large"
                            );
                            handler.send_error("MESSAGE_TOO_LARGE", "Frame exceeds maximum size").await;
                            continue;
                        }

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Subscribe { user_id }) => {
                                session::handle_subscribe(&mut handler, &ctx, user_id).await;
                            }

                            Ok(ClientMessage::Send { receiver_id, text }) => {
                                messages::handle_send(&mut handler, &ctx, receiver_id, text).await;
                            }

                            Ok(ClientMessage::MarkRead { counterparty_id }) => {
                                messages::handle_mark_read(&mut handler, &ctx, counterparty_id).await;
                            }

                            Err(e) => {
                                tracing::warn!("Failed to parse frame from {}: {}", addr, e);
                                handler.send_error("INVALID_FORMAT", "Invalid message format").await;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Binary(_))) => {
                        handler.send_error("INVALID_FORMAT", "Expected JSON text frames").await;
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = handler.ws_sender_mut().send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        tracing::info!("Connection closed by client: {}", addr);
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }

            event = next_event(handler.subscription_mut()) => {
                match event {
                    Some(frame) => {
                        if handler.send_json(&frame).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        // Evicted as slow or server shutting down
                        tracing::info!("Live subscription closed by server: {}", addr);
                        let _ = handler.ws_sender_mut().send(WsMessage::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    if handler.is_subscribed() {
        handler.disconnect(&ctx.realtime).await;
    }
    tracing::info!("Connection closed: {}", addr);
}
