// ============================================================================
// REST API Messages Tests
// ============================================================================
//
// - send / fetch / poll with `since`
// - conversation summaries with directory display data
// - validation and identity errors
// - push fallback for receivers without a live connection
//
// ============================================================================

use hirechat_server::message::{ConversationSummary, Message};
use serde_json::{json, Value};

use test_utils::{spawn_app, POLL_INTERVAL_MS};

#[tokio::test]
async fn test_send_then_fetch_both_directions() {
    let app = spawn_app().await;

    let hi = app.post_message("A", "B", "Hi").await;
    assert_eq!(hi.status(), 200);
    let hi: Message = hi.json().await.unwrap();
    assert_eq!(hi.sender_id, "A");
    assert!(!hi.read);

    let reply = app.post_message("B", "A", "Are you there?").await;
    assert_eq!(reply.status(), 200);

    let response = app.get_as("A", "/api/v1/messages/B").await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("x-poll-interval-ms")
            .and_then(|v| v.to_str().ok()),
        Some(POLL_INTERVAL_MS.to_string().as_str())
    );
    let from_a: Vec<Message> = response.json().await.unwrap();
    let texts: Vec<&str> = from_a.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["Hi", "Are you there?"]);

    let from_b: Vec<Message> = app
        .get_as("B", "/api/v1/messages/A")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(from_a, from_b);
}

#[tokio::test]
async fn test_poll_since_returns_only_newer_messages() {
    let app = spawn_app().await;

    let first: Message = app.post_message("A", "B", "one").await.json().await.unwrap();
    app.post_message("B", "A", "two").await;

    let newer: Vec<Message> = app
        .get_as("A", &format!("/api/v1/messages/B?since={}", first.id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(newer.len(), 1);
    assert_eq!(newer[0].text, "two");

    let nothing: Vec<Message> = app
        .get_as("A", &format!("/api/v1/messages/B?since={}", newer[0].id))
        .await
        .json()
        .await
        .unwrap();
    assert!(nothing.is_empty());
}

#[tokio::test]
async fn test_two_messages_from_one_sender() {
    let app = spawn_app().await;

    assert_eq!(app.post_message("A", "B", "Hi").await.status(), 200);
    assert_eq!(app.post_message("A", "B", "Are you there?").await.status(), 200);

    let thread: Vec<Message> = app
        .get_as("A", "/api/v1/messages/B")
        .await
        .json()
        .await
        .unwrap();
    let texts: Vec<&str> = thread.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["Hi", "Are you there?"]);

    let for_a: Vec<ConversationSummary> = app
        .get_as("A", "/api/v1/conversations")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(for_a.len(), 1);
    assert_eq!(for_a[0].counterparty_id, "B");
    assert_eq!(for_a[0].last_message.text, "Are you there?");
    assert!(!for_a[0].unread);

    let for_b: Vec<Value> = app
        .get_as("B", "/api/v1/conversations")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(for_b.len(), 1);
    assert_eq!(for_b[0]["counterpartyId"], "A");
    assert_eq!(for_b[0]["lastMessage"]["text"], "Are you there?");
    assert_eq!(for_b[0]["unread"], true);
}

#[tokio::test]
async fn test_conversation_summaries_and_mark_read() {
    let app = spawn_app().await;

    let response = app
        .http
        .put(app.url("/api/v1/profile"))
        .header("x-user-id", "B")
        .json(&json!({ "displayName": "Blue Cafe", "avatar": "https://cdn.example/b.png" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    app.post_message("A", "B", "Hi").await;
    app.post_message("B", "A", "Are you there?").await;

    let for_a: Vec<ConversationSummary> = app
        .get_as("A", "/api/v1/conversations")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(for_a.len(), 1);
    assert_eq!(for_a[0].counterparty_id, "B");
    assert_eq!(for_a[0].counterparty_display_name, "Blue Cafe");
    assert_eq!(for_a[0].counterparty_avatar.as_deref(), Some("https://cdn.example/b.png"));
    assert_eq!(for_a[0].last_message.text, "Are you there?");
    assert!(for_a[0].unread);

    let for_b: Vec<Value> = app
        .get_as("B", "/api/v1/conversations")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(for_b[0]["counterpartyId"], "A");
    assert_eq!(for_b[0]["counterpartyDisplayName"], "A");
    assert_eq!(for_b[0]["counterpartyAvatar"], Value::Null);
    assert_eq!(for_b[0]["unread"], true);

    let updated: Value = app
        .http
        .post(app.url("/api/v1/messages/B/read"))
        .header("x-user-id", "A")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["updated"], 1);

    let for_a: Vec<ConversationSummary> = app
        .get_as("A", "/api/v1/conversations")
        .await
        .json()
        .await
        .unwrap();
    assert!(!for_a[0].unread);
}

#[tokio::test]
async fn test_invalid_sends_are_rejected() {
    let app = spawn_app().await;

    let response = app.post_message("A", "A", "test").await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error_code"], "VALIDATION_ERROR");

    let response = app.post_message("A", "B", "   ").await;
    assert_eq!(response.status(), 400);

    let conversations: Vec<Value> = app
        .get_as("A", "/api/v1/conversations")
        .await
        .json()
        .await
        .unwrap();
    assert!(conversations.is_empty());
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let app = spawn_app().await;

    let response = app
        .http
        .post(app.url("/api/v1/messages"))
        .json(&json!({ "receiverId": "B", "text": "Hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_offline_receiver_gets_push_with_deep_link() {
    let app = spawn_app().await;

    app.http
        .put(app.url("/api/v1/profile"))
        .header("x-user-id", "biz-1")
        .json(&json!({ "displayName": "Acme Staffing" }))
        .send()
        .await
        .unwrap();
    let response = app
        .http
        .put(app.url("/api/v1/device-token"))
        .header("x-user-id", "worker-1")
        .json(&json!({ "deviceToken": "ExponentPushToken[w1]" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    app.post_message("biz-1", "worker-1", "Can you cover Saturday?").await;

    assert_eq!(app.push.wait_for(1).await, 1);
    let sent = app.push.sent.lock().await;
    assert_eq!(sent[0].device_token, "ExponentPushToken[w1]");
    assert_eq!(sent[0].title, "New message from Acme Staffing");
    assert_eq!(sent[0].body, "Can you cover Saturday?");
    assert_eq!(sent[0].data.screen, "chat");
    assert_eq!(sent[0].data.counterparty_id, "biz-1");
}

#[tokio::test]
async fn test_unregistered_token_gets_no_push() {
    let app = spawn_app().await;

    app.http
        .put(app.url("/api/v1/device-token"))
        .header("x-user-id", "worker-1")
        .json(&json!({ "deviceToken": "ExponentPushToken[w1]" }))
        .send()
        .await
        .unwrap();
    let response = app
        .http
        .delete(app.url("/api/v1/device-token"))
        .header("x-user-id", "worker-1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    app.post_message("biz-1", "worker-1", "Hello").await;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(app.push.count().await, 0);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = spawn_app().await;

    let health = app.http.get(app.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);

    app.post_message("A", "B", "count me").await;
    let metrics = app
        .http
        .get(app.url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("hirechat_messages_sent_total"));
}
