use crate::context::AppContext;
use crate::handlers::connection::ConnectionHandler;
use crate::message::ServerMessage;

/// Send over the live connection. The sender is the bound user; the stored
/// message comes back on the sender's own subscription, the ack only
/// confirms persistence.
pub async fn handle_send(
    handler: &mut ConnectionHandler,
    ctx: &AppContext,
    receiver_id: String,
    text: String,
) {
    let Some(sender_id) = handler.user_id().map(str::to_string) else {
        handler
            .send_error("NOT_SUBSCRIBED", "Subscribe before sending messages")
            .await;
        return;
    };

    match ctx.gateway.send(&sender_id, &receiver_id, &text).await {
        Ok(message) => {
            let ack = ServerMessage::Ack {
                message_id: message.id,
            };
            if let Err(e) = handler.send_json(&ack).await {
                tracing::debug!(error = %e, "Failed to acknowledge send");
            }
        }
        Err(e) => {
            e.log();
            handler.send_error(e.error_code(), &e.user_message()).await;
        }
    }
}

pub async fn handle_mark_read(
    handler: &mut ConnectionHandler,
    ctx: &AppContext,
    counterparty_id: String,
) {
    let Some(reader_id) = handler.user_id().map(str::to_string) else {
        handler
            .send_error("NOT_SUBSCRIBED", "Subscribe before marking messages read")
            .await;
        return;
    };

    match ctx.gateway.mark_read(&reader_id, &counterparty_id).await {
        Ok(updated) => {
            let frame = ServerMessage::ReadUpdated {
                counterparty_id,
                updated,
            };
            if let Err(e) = handler.send_json(&frame).await {
                tracing::debug!(error = %e, "Failed to acknowledge markRead");
            }
        }
        Err(e) => {
            e.log();
            handler.send_error(e.error_code(), &e.user_message()).await;
        }
    }
}
