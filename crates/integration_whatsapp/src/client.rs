//! Outbound Graph API client
//!
//! Covers the message operations handlers typically need while reacting
//! to an update: sending and replying with text, reacting with an emoji,
//! and marking a message as read.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com";
const DEFAULT_API_VERSION: &str = "v20.0";

/// Errors returned by outbound message operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The Graph API rejected the call
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Connection settings for the Graph API.
#[derive(Debug, Clone)]
pub struct WhatsAppClientConfig {
    /// Bearer token for the business account
    pub access_token: String,
    /// Id of the phone number messages are sent from
    pub phone_number_id: String,
    /// Graph API version segment, e.g. `v20.0`
    pub api_version: String,
    /// Base URL override, used to point tests at a mock server
    pub base_url: Option<String>,
}

impl Default for WhatsAppClientConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            api_version: DEFAULT_API_VERSION.to_string(),
            base_url: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    message_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<MessageContext<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextPayload<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reaction: Option<ReactionPayload<'a>>,
}

#[derive(Debug, Serialize)]
struct MessageContext<'a> {
    message_id: &'a str,
}

#[derive(Debug, Serialize)]
struct TextPayload<'a> {
    preview_url: bool,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct ReactionPayload<'a> {
    message_id: &'a str,
    emoji: &'a str,
}

#[derive(Debug, Serialize)]
struct MarkAsReadRequest<'a> {
    messaging_product: &'static str,
    status: &'static str,
    message_id: &'a str,
}

/// Response to a successful send
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub messages: Vec<SentMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub id: String,
}

impl SendMessageResponse {
    /// Id of the message that was just sent, when the API returned one.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.messages.first().map(|m| m.id.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Client for the WhatsApp Cloud messages endpoint.
///
/// Cheap to share: handlers receive it as `Arc<WhatsAppClient>` from the
/// dispatcher and call it concurrently.
#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    client: reqwest::Client,
    access_token: String,
    messages_url: String,
}

impl WhatsAppClient {
    /// Build a client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] when the access token or
    /// phone number id is empty.
    pub fn new(config: WhatsAppClientConfig) -> Result<Self, ClientError> {
        if config.access_token.is_empty() {
            return Err(ClientError::Configuration(
                "access token must not be empty".to_string(),
            ));
        }
        if config.phone_number_id.is_empty() {
            return Err(ClientError::Configuration(
                "phone number id must not be empty".to_string(),
            ));
        }

        let base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let messages_url = format!(
            "{}/{}/{}/messages",
            base_url.trim_end_matches('/'),
            config.api_version,
            config.phone_number_id
        );

        Ok(Self {
            client: reqwest::Client::new(),
            access_token: config.access_token,
            messages_url,
        })
    }

    /// Send a plain text message.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the recipient is malformed, the
    /// request fails, or the API rejects the call.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<SendMessageResponse, ClientError> {
        let to = normalize_recipient(to)?;
        self.send(&SendMessageRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: &to,
            message_type: "text",
            context: None,
            text: Some(TextPayload {
                preview_url: false,
                body,
            }),
            reaction: None,
        })
        .await
    }

    /// Send a text message quoting an earlier one.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send_text`].
    pub async fn reply_text(
        &self,
        to: &str,
        body: &str,
        in_reply_to: &str,
    ) -> Result<SendMessageResponse, ClientError> {
        let to = normalize_recipient(to)?;
        self.send(&SendMessageRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: &to,
            message_type: "text",
            context: Some(MessageContext {
                message_id: in_reply_to,
            }),
            text: Some(TextPayload {
                preview_url: false,
                body,
            }),
            reaction: None,
        })
        .await
    }

    /// React to a message with an emoji. An empty emoji removes a
    /// previous reaction.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send_text`].
    pub async fn send_reaction(
        &self,
        to: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<SendMessageResponse, ClientError> {
        let to = normalize_recipient(to)?;
        self.send(&SendMessageRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: &to,
            message_type: "reaction",
            context: None,
            text: None,
            reaction: Some(ReactionPayload { message_id, emoji }),
        })
        .await
    }

    /// Mark an incoming message as read (blue ticks on the sender side).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or the API rejects
    /// the call.
    pub async fn mark_as_read(&self, message_id: &str) -> Result<(), ClientError> {
        let request = MarkAsReadRequest {
            messaging_product: "whatsapp",
            status: "read",
            message_id,
        };
        self.post(&request).await?;
        debug!(message_id, "Marked message as read");
        Ok(())
    }

    async fn send(
        &self,
        request: &SendMessageRequest<'_>,
    ) -> Result<SendMessageResponse, ClientError> {
        let response = self.post(request).await?.json().await?;
        debug!(to = request.to, kind = request.message_type, "Message sent");
        Ok(response)
    }

    async fn post<T: Serialize>(&self, request: &T) -> Result<reqwest::Response, ClientError> {
        let response = self
            .client
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        match response.json::<ApiErrorResponse>().await {
            Ok(body) => Err(ClientError::Api {
                code: body.error.code,
                message: body.error.message,
            }),
            Err(_) => Err(ClientError::Api {
                code: i64::from(status.as_u16()),
                message: format!("unexpected response status {status}"),
            }),
        }
    }
}

/// Accept `+`-prefixed E.164-ish numbers and strip the prefix; the API
/// expects bare digits.
fn normalize_recipient(to: &str) -> Result<String, ClientError> {
    let digits = to.strip_prefix('+').unwrap_or(to);
    if digits.len() < 6 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ClientError::InvalidRecipient(to.to_string()));
    }
    Ok(digits.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WhatsAppClientConfig {
        WhatsAppClientConfig {
            access_token: "token".to_string(),
            phone_number_id: "123456".to_string(),
            ..WhatsAppClientConfig::default()
        }
    }

    #[test]
    fn empty_access_token_is_rejected() {
        let result = WhatsAppClient::new(WhatsAppClientConfig {
            access_token: String::new(),
            ..config()
        });
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn empty_phone_number_id_is_rejected() {
        let result = WhatsAppClient::new(WhatsAppClientConfig {
            phone_number_id: String::new(),
            ..config()
        });
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn messages_url_uses_version_and_phone_id() {
        let client = WhatsAppClient::new(config()).unwrap();
        assert_eq!(
            client.messages_url,
            "https://graph.facebook.com/v20.0/123456/messages"
        );
    }

    #[test]
    fn base_url_override_and_trailing_slash() {
        let client = WhatsAppClient::new(WhatsAppClientConfig {
            base_url: Some("http://127.0.0.1:9000/".to_string()),
            ..config()
        })
        .unwrap();
        assert_eq!(
            client.messages_url,
            "http://127.0.0.1:9000/v20.0/123456/messages"
        );
    }

    #[test]
    fn recipient_plus_prefix_is_stripped() {
        assert_eq!(normalize_recipient("+491234567890").unwrap(), "491234567890");
        assert_eq!(normalize_recipient("491234567890").unwrap(), "491234567890");
    }

    #[test]
    fn malformed_recipients_are_rejected_early() {
        assert!(matches!(
            normalize_recipient("not-a-number"),
            Err(ClientError::InvalidRecipient(_))
        ));
        assert!(matches!(
            normalize_recipient("+49 123"),
            Err(ClientError::InvalidRecipient(_))
        ));
        assert!(matches!(
            normalize_recipient("123"),
            Err(ClientError::InvalidRecipient(_))
        ));
    }

    #[test]
    fn text_request_serialization_shape() {
        let request = SendMessageRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: "491234567890",
            message_type: "text",
            context: Some(MessageContext {
                message_id: "wamid.PREV",
            }),
            text: Some(TextPayload {
                preview_url: false,
                body: "hi",
            }),
            reaction: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["context"]["message_id"], "wamid.PREV");
        assert_eq!(json["text"]["body"], "hi");
        assert!(json.get("reaction").is_none());
    }
}
