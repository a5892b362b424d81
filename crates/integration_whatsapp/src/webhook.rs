//! Inbound webhook concerns: signature verification, subscription
//! handshake, and parsing provider deliveries into typed updates.
//!
//! Parsing is tolerant by design. The provider adds fields and message
//! types without notice, so every recognized shape is matched
//! structurally and everything else becomes an `Unsupported` update
//! instead of a parse failure. Only a broken envelope is an error.

use domain::{
    ButtonSource, CallbackButton, CallbackSelection, ChatOpened, DeliveryStatus, FlowCompletion,
    IncomingMessage, MediaKind, MessageContent, MessageStatus, ParseError, StatusError,
    TemplateStatusUpdate, Update, UpdatePayload,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";
const WEBHOOK_OBJECT: &str = "whatsapp_business_account";

/// Verify the `X-Hub-Signature-256` header against the raw request body.
///
/// The header carries `sha256=<hex>` where `<hex>` is the HMAC-SHA256 of
/// the exact body bytes keyed with the app secret. Comparison happens via
/// [`Mac::verify_slice`], which is constant-time.
#[must_use]
pub fn verify_signature(app_secret: &str, signature_header: &str, body: &[u8]) -> bool {
    let Some(signature_hex) = signature_header.strip_prefix(SIGNATURE_PREFIX) else {
        debug!("Signature header lacks the sha256= prefix");
        return false;
    };

    let Ok(expected) = hex::decode(signature_hex) else {
        debug!("Signature header is not valid hex");
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Answer the provider's subscription handshake.
///
/// Returns the challenge to echo when the received token matches the
/// configured one, `None` otherwise. An empty configured token never
/// matches.
#[must_use]
pub fn check_subscription(received: &str, configured: &str, challenge: String) -> Option<String> {
    if !configured.is_empty() && received == configured {
        Some(challenge)
    } else {
        None
    }
}

// Envelope structs mirror the Graph API delivery format. Every field the
// classifier does not need is left out; serde ignores unknown fields.

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
struct WebhookEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
struct WebhookChange {
    #[serde(default)]
    field: String,
    value: WebhookValue,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookValue {
    #[serde(default)]
    messages: Vec<WebhookMessage>,
    #[serde(default)]
    statuses: Vec<WebhookStatus>,
    #[serde(default)]
    contacts: Vec<WebhookContact>,
    // Template status events carry their data on the value itself
    message_template_id: Option<serde_json::Value>,
    message_template_name: Option<String>,
    event: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookContact {
    #[serde(default)]
    wa_id: String,
    profile: Option<ContactProfile>,
}

#[derive(Debug, Deserialize)]
struct ContactProfile {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookMessage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    from: String,
    #[serde(default)]
    timestamp: String,
    #[serde(rename = "type", default)]
    msg_type: String,
    text: Option<TextObject>,
    image: Option<MediaObject>,
    video: Option<MediaObject>,
    audio: Option<MediaObject>,
    document: Option<MediaObject>,
    sticker: Option<MediaObject>,
    location: Option<LocationObject>,
    reaction: Option<ReactionObject>,
    button: Option<ButtonObject>,
    interactive: Option<InteractiveObject>,
}

#[derive(Debug, Deserialize)]
struct TextObject {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct MediaObject {
    #[serde(default)]
    id: String,
    #[serde(default)]
    mime_type: String,
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocationObject {
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
    name: Option<String>,
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReactionObject {
    #[serde(default)]
    message_id: String,
    emoji: Option<String>,
}

/// Template quick-reply button press
#[derive(Debug, Deserialize)]
struct ButtonObject {
    #[serde(default)]
    text: String,
    #[serde(default)]
    payload: String,
}

#[derive(Debug, Deserialize)]
struct InteractiveObject {
    #[serde(rename = "type", default)]
    kind: String,
    button_reply: Option<ReplyObject>,
    list_reply: Option<ListReplyObject>,
    nfm_reply: Option<NfmReplyObject>,
}

#[derive(Debug, Deserialize)]
struct ReplyObject {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct ListReplyObject {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    description: Option<String>,
}

/// Flow (natively-rendered message) completion
#[derive(Debug, Deserialize)]
struct NfmReplyObject {
    body: Option<String>,
    #[serde(default)]
    response_json: String,
}

#[derive(Debug, Deserialize)]
struct WebhookStatus {
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    recipient_id: String,
    conversation: Option<ConversationObject>,
    #[serde(default)]
    errors: Vec<StatusErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ConversationObject {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusErrorObject {
    #[serde(default)]
    code: i64,
    title: Option<String>,
    message: Option<String>,
}

/// Parse a raw webhook body into zero or more typed updates.
///
/// # Errors
///
/// Returns [`ParseError`] when the body is not JSON, lacks the envelope
/// structure, or belongs to a different provider object. Unrecognized
/// shapes inside a valid envelope are not errors; they come back as
/// `Unsupported` updates.
pub fn parse_updates(body: &[u8]) -> Result<Vec<Update>, ParseError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;

    let Some(object) = value.get("object").and_then(serde_json::Value::as_str) else {
        return Err(ParseError::MissingEnvelope);
    };
    if object != WEBHOOK_OBJECT {
        return Err(ParseError::NotAWebhook {
            object: object.to_string(),
        });
    }
    if !value.get("entry").is_some_and(serde_json::Value::is_array) {
        return Err(ParseError::MissingEnvelope);
    }

    let payload: WebhookPayload = serde_json::from_value(value)?;

    let mut updates = Vec::new();
    for entry in &payload.entry {
        for change in &entry.changes {
            classify_change(&entry.id, change, &mut updates);
        }
    }
    Ok(updates)
}

fn classify_change(entry_id: &str, change: &WebhookChange, out: &mut Vec<Update>) {
    let value = &change.value;

    if !value.messages.is_empty() {
        for message in &value.messages {
            out.push(classify_message(entry_id, &value.contacts, message));
        }
        return;
    }

    if !value.statuses.is_empty() {
        for status in &value.statuses {
            out.push(classify_status(entry_id, status));
        }
        return;
    }

    if change.field == "message_template_status_update" {
        out.push(Update {
            sender: String::new(),
            timestamp: 0,
            entry_id: entry_id.to_string(),
            payload: UpdatePayload::TemplateStatusUpdate(TemplateStatusUpdate {
                template_id: value
                    .message_template_id
                    .as_ref()
                    .map(json_value_to_string)
                    .unwrap_or_default(),
                template_name: value.message_template_name.clone().unwrap_or_default(),
                event: value.event.clone().unwrap_or_default(),
                reason: value.reason.clone(),
            }),
        });
        return;
    }

    warn!(field = %change.field, "Unrecognized webhook change");
    out.push(Update {
        sender: String::new(),
        timestamp: 0,
        entry_id: entry_id.to_string(),
        payload: UpdatePayload::Unsupported {
            field: if change.field.is_empty() {
                "unknown".to_string()
            } else {
                change.field.clone()
            },
        },
    });
}

fn classify_message(entry_id: &str, contacts: &[WebhookContact], msg: &WebhookMessage) -> Update {
    let sender_name = contacts
        .iter()
        .find(|c| c.wa_id == msg.from)
        .and_then(|c| c.profile.as_ref())
        .and_then(|p| p.name.clone());

    let base = |payload: UpdatePayload| Update {
        sender: msg.from.clone(),
        timestamp: parse_epoch(&msg.timestamp),
        entry_id: entry_id.to_string(),
        payload,
    };

    if msg.msg_type == "request_welcome" {
        return base(UpdatePayload::ChatOpened(ChatOpened {
            message_id: msg.id.clone(),
        }));
    }

    if let Some(button) = &msg.button {
        return base(UpdatePayload::CallbackButton(CallbackButton {
            message_id: msg.id.clone(),
            title: button.text.clone(),
            data: button.payload.clone(),
            source: ButtonSource::TemplateQuickReply,
        }));
    }

    if let Some(interactive) = &msg.interactive {
        return base(classify_interactive(msg, interactive));
    }

    let content = if let Some(text) = &msg.text {
        MessageContent::Text {
            body: text.body.clone(),
        }
    } else if let Some((media, kind)) = media_attachment(msg) {
        MessageContent::Media {
            media_id: media.id.clone(),
            mime_type: media.mime_type.clone(),
            caption: media.caption.clone(),
            kind,
        }
    } else if let Some(location) = &msg.location {
        MessageContent::Location {
            latitude: location.latitude,
            longitude: location.longitude,
            name: location.name.clone(),
            address: location.address.clone(),
        }
    } else if let Some(reaction) = &msg.reaction {
        MessageContent::Reaction {
            message_id: reaction.message_id.clone(),
            emoji: reaction.emoji.clone(),
        }
    } else {
        debug!(message_type = %msg.msg_type, "Unmodeled message type");
        MessageContent::Unknown {
            message_type: msg.msg_type.clone(),
        }
    };

    base(UpdatePayload::Message(IncomingMessage {
        message_id: msg.id.clone(),
        sender_name,
        content,
    }))
}

fn classify_interactive(msg: &WebhookMessage, interactive: &InteractiveObject) -> UpdatePayload {
    if let Some(reply) = &interactive.button_reply {
        return UpdatePayload::CallbackButton(CallbackButton {
            message_id: msg.id.clone(),
            title: reply.title.clone(),
            data: reply.id.clone(),
            source: ButtonSource::Interactive,
        });
    }

    if let Some(reply) = &interactive.list_reply {
        return UpdatePayload::CallbackSelection(CallbackSelection {
            message_id: msg.id.clone(),
            title: reply.title.clone(),
            data: reply.id.clone(),
            description: reply.description.clone(),
        });
    }

    if let Some(nfm) = &interactive.nfm_reply {
        let response: serde_json::Value =
            serde_json::from_str(&nfm.response_json).unwrap_or(serde_json::Value::Null);
        let token = response
            .get("flow_token")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string);
        return UpdatePayload::FlowCompletion(FlowCompletion {
            message_id: msg.id.clone(),
            token,
            body: nfm.body.clone(),
            response,
        });
    }

    debug!(interactive_type = %interactive.kind, "Unmodeled interactive reply");
    UpdatePayload::Message(IncomingMessage {
        message_id: msg.id.clone(),
        sender_name: None,
        content: MessageContent::Unknown {
            message_type: format!("interactive.{}", interactive.kind),
        },
    })
}

fn classify_status(entry_id: &str, status: &WebhookStatus) -> Update {
    let Some(delivery) = DeliveryStatus::from_provider(&status.status) else {
        warn!(status = %status.status, "Unknown delivery status value");
        return Update {
            sender: String::new(),
            timestamp: parse_epoch(&status.timestamp),
            entry_id: entry_id.to_string(),
            payload: UpdatePayload::Unsupported {
                field: "statuses".to_string(),
            },
        };
    };

    let error = status.errors.first().map(|e| StatusError {
        code: e.code,
        message: e
            .title
            .clone()
            .or_else(|| e.message.clone())
            .unwrap_or_default(),
    });

    Update {
        sender: String::new(),
        timestamp: parse_epoch(&status.timestamp),
        entry_id: entry_id.to_string(),
        payload: UpdatePayload::MessageStatus(MessageStatus {
            message_id: status.id.clone(),
            recipient: status.recipient_id.clone(),
            status: delivery,
            error,
            conversation_id: status.conversation.as_ref().map(|c| c.id.clone()),
        }),
    }
}

fn media_attachment(msg: &WebhookMessage) -> Option<(&MediaObject, MediaKind)> {
    if let Some(media) = &msg.image {
        Some((media, MediaKind::Image))
    } else if let Some(media) = &msg.video {
        Some((media, MediaKind::Video))
    } else if let Some(media) = &msg.audio {
        Some((media, MediaKind::Audio))
    } else if let Some(media) = &msg.document {
        Some((media, MediaKind::Document))
    } else if let Some(media) = &msg.sticker {
        Some((media, MediaKind::Sticker))
    } else {
        None
    }
}

fn json_value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The provider sends timestamps as decimal epoch-second strings.
fn parse_epoch(raw: &str) -> i64 {
    raw.parse().unwrap_or(0)
}
