//! Outbound client tests against a mocked Graph API

use integration_whatsapp::{ClientError, WhatsAppClient, WhatsAppClientConfig};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> WhatsAppClient {
    WhatsAppClient::new(WhatsAppClientConfig {
        access_token: "test-token".to_string(),
        phone_number_id: "123456".to_string(),
        base_url: Some(server.uri()),
        ..WhatsAppClientConfig::default()
    })
    .unwrap()
}

fn sent_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "messaging_product": "whatsapp",
        "contacts": [{ "input": "491234567890", "wa_id": "491234567890" }],
        "messages": [{ "id": "wamid.SENT123" }],
    }))
}

#[tokio::test]
async fn send_text_posts_to_messages_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v20.0/123456/messages"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "messaging_product": "whatsapp",
            "to": "491234567890",
            "type": "text",
            "text": { "body": "hello" },
        })))
        .respond_with(sent_response())
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server)
        .send_text("+491234567890", "hello")
        .await
        .unwrap();
    assert_eq!(response.message_id(), Some("wamid.SENT123"));
}

#[tokio::test]
async fn reply_text_includes_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v20.0/123456/messages"))
        .and(body_partial_json(json!({
            "context": { "message_id": "wamid.PREV" },
            "text": { "body": "quoting you" },
        })))
        .respond_with(sent_response())
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .reply_text("491234567890", "quoting you", "wamid.PREV")
        .await
        .unwrap();
}

#[tokio::test]
async fn send_reaction_uses_reaction_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v20.0/123456/messages"))
        .and(body_partial_json(json!({
            "type": "reaction",
            "reaction": { "message_id": "wamid.IN", "emoji": "👍" },
        })))
        .respond_with(sent_response())
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .send_reaction("491234567890", "wamid.IN", "👍")
        .await
        .unwrap();
}

#[tokio::test]
async fn mark_as_read_posts_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v20.0/123456/messages"))
        .and(body_partial_json(json!({
            "messaging_product": "whatsapp",
            "status": "read",
            "message_id": "wamid.UNREAD",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).mark_as_read("wamid.UNREAD").await.unwrap();
}

#[tokio::test]
async fn api_error_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v20.0/123456/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "message": "(#131030) Recipient phone number not in allowed list",
                "type": "OAuthException",
                "code": 131_030,
            },
        })))
        .mount(&server)
        .await;

    let error = client_for(&server)
        .send_text("491234567890", "hi")
        .await
        .unwrap_err();
    match error {
        ClientError::Api { code, message } => {
            assert_eq!(code, 131_030);
            assert!(message.contains("allowed list"));
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_error_body_still_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v20.0/123456/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("gateway exploded"))
        .mount(&server)
        .await;

    let error = client_for(&server)
        .send_text("491234567890", "hi")
        .await
        .unwrap_err();
    match error {
        ClientError::Api { code, .. } => assert_eq!(code, 500),
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_recipient_fails_without_a_request() {
    let server = MockServer::start().await;
    // No mock mounted: a request would 404 and surface as an API error
    let error = client_for(&server)
        .send_text("not a number", "hi")
        .await
        .unwrap_err();
    assert!(matches!(error, ClientError::InvalidRecipient(_)));
}
