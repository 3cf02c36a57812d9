use crate::context::AppContext;
use crate::handlers::connection::ConnectionHandler;
use crate::message::ServerMessage;
use crate::store::validate_user_id;

/// Bind the connection to `user_id`.
///
/// Repeating the subscribe for the same user is a no-op apart from the
/// acknowledgement. A different user rebinds: the old subscription is
/// released before the frame is acknowledged.
pub async fn handle_subscribe(handler: &mut ConnectionHandler, ctx: &AppContext, user_id: String) {
    if let Err(e) = validate_user_id(&user_id, "userId") {
        handler.send_error(e.error_code(), &e.user_message()).await;
        return;
    }

    let user_ref = ctx.config.logging.user_ref(&user_id);

    if handler.user_id() == Some(user_id.as_str()) {
        tracing::debug!(user = %user_ref, "Repeated subscribe, already bound");
    } else {
        let subscription = ctx.realtime.subscribe(&user_id).await;
        if let Some(previous) = handler.bind(subscription) {
            tracing::info!(
                previous = %ctx.config.logging.user_ref(&previous.user_id),
                user = %user_ref,
                "Rebinding live connection"
            );
            ctx.realtime.unsubscribe(&previous.user_id, previous.id).await;
        } else {
            tracing::info!(user = %user_ref, addr = %handler.addr(), "Live subscription started");
        }
    }

    let ack = ServerMessage::Subscribed {
        user_id,
        poll_interval_ms: ctx.config.realtime.poll_interval_ms,
    };
    if let Err(e) = handler.send_json(&ack).await {
        tracing::debug!(error = %e, "Failed to acknowledge subscribe");
    }
}
