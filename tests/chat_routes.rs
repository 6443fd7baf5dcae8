mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

struct Chat {
    app: TestApp,
    offer_id: String,
    alice_id: String,
    alice: String,
    bob_id: String,
    bob: String,
    eve: String,
}

async fn chat() -> Chat {
    let app = TestApp::new().await;
    let (alice_id, alice) = app.user("alice@masterdom.test", "Alice").await;
    let (bob_id, bob) = app.user("bob@masterdom.test", "Bob").await;
    let (_, eve) = app.user("eve@masterdom.test", "Eve").await;
    let offer_id = app.create_offer(&alice, "Assemble a wardrobe", "request_for_service").await;

    Chat { app, offer_id, alice_id, alice, bob_id, bob, eve }
}

async fn initiate(c: &Chat, token: &str, recipient: &str) -> (StatusCode, serde_json::Value) {
    c.app
        .post(
            "/api/chats/initiate",
            Some(token),
            json!({ "offerId": c.offer_id, "recipientId": recipient }),
        )
        .await
}

#[tokio::test]
async fn initiate_returns_one_conversation_per_pair() {
    let c = chat().await;

    let (status, first) = initiate(&c, &c.alice, &c.bob_id).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = initiate(&c, &c.bob, &c.alice_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["conversationId"], second["conversationId"]);

    let (status, body) = initiate(&c, &c.alice, &c.alice_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot start a chat with yourself");

    let (status, _) = initiate(&c, &c.alice, &uuid::Uuid::now_v7().to_string()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn messages_flow_between_participants_only() {
    let c = chat().await;
    let (_, body) = initiate(&c, &c.alice, &c.bob_id).await;
    let conversation_id = body["conversationId"].as_str().unwrap().to_owned();
    let messages_uri = format!("/api/chats/{conversation_id}/messages");

    let (status, message) = c
        .app
        .post(&messages_uri, Some(&c.alice), json!({ "content": "hello" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["senderId"], c.alice_id.as_str());
    assert_eq!(message["senderFirstName"], "Alice");
    assert_eq!(message["isRead"], false);

    let (status, body) = c.app.get(&messages_uri, Some(&c.bob)).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "hello");

    let (status, _) = c.app.post(&messages_uri, Some(&c.bob), json!({ "content": "hey" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, body) = c.app.get(&messages_uri, Some(&c.alice)).await;
    let contents: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, ["hello", "hey"]);

    let (status, _) = c.app.get(&messages_uri, Some(&c.eve)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = c.app.post(&messages_uri, Some(&c.eve), json!({ "content": "psst" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = c.app.get(&format!("/api/chats/{conversation_id}"), Some(&c.eve)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = c.app.post(&messages_uri, Some(&c.alice), json!({ "content": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn details_and_previews() {
    let c = chat().await;
    let (_, body) = initiate(&c, &c.bob, &c.alice_id).await;
    let conversation_id = body["conversationId"].as_str().unwrap().to_owned();

    let (status, details) = c.app.get(&format!("/api/chats/{conversation_id}"), Some(&c.bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["offerId"], c.offer_id.as_str());
    assert_eq!(details["offerTitle"], "Assemble a wardrobe");
    assert_eq!(details["participants"].as_array().unwrap().len(), 2);

    c.app
        .post(
            &format!("/api/chats/{conversation_id}/messages"),
            Some(&c.bob),
            json!({ "content": "when suits you?" }),
        )
        .await;

    let (status, body) = c.app.get("/api/chats", Some(&c.alice)).await;
    assert_eq!(status, StatusCode::OK);
    let previews = body.as_array().unwrap();
    assert_eq!(previews.len(), 1);
    assert_eq!(previews[0]["conversationId"], conversation_id.as_str());
    assert_eq!(previews[0]["otherParticipantId"], c.bob_id.as_str());
    assert_eq!(previews[0]["otherParticipantName"], "Bob");
    assert_eq!(previews[0]["lastMessageContent"], "when suits you?");

    let (_, body) = c.app.get("/api/chats", Some(&c.eve)).await;
    assert!(body.as_array().unwrap().is_empty());
}
