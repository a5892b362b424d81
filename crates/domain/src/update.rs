//! Typed update model
//!
//! One `Update` is a single normalized event derived from a provider
//! webhook delivery. The kind is determined structurally by the parser,
//! never declared by the sender; shapes the parser does not recognize
//! become [`UpdateKind::Unsupported`] instead of failing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed enumeration of update kinds.
///
/// Every [`Update`] belongs to exactly one kind, derived from its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateKind {
    /// An incoming user message (text, media, location, reaction)
    Message,
    /// A template quick-reply or interactive button press
    CallbackButton,
    /// An interactive list selection
    CallbackSelection,
    /// A delivery status change for a previously sent message
    MessageStatus,
    /// A template approval/rejection event
    TemplateStatusUpdate,
    /// A completed WhatsApp Flow
    FlowCompletion,
    /// The user opened the conversation for the first time
    ChatOpened,
    /// A shape the parser does not recognize
    Unsupported,
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Message => "message",
            Self::CallbackButton => "callback_button",
            Self::CallbackSelection => "callback_selection",
            Self::MessageStatus => "message_status",
            Self::TemplateStatusUpdate => "template_status_update",
            Self::FlowCompletion => "flow_completion",
            Self::ChatOpened => "chat_opened",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{name}")
    }
}

/// Media categories for incoming media messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Sticker,
}

/// Content of an incoming message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageContent {
    /// Plain text body
    Text { body: String },
    /// A media attachment with an optional caption
    Media {
        media_id: String,
        mime_type: String,
        caption: Option<String>,
        kind: MediaKind,
    },
    /// A shared location
    Location {
        latitude: f64,
        longitude: f64,
        name: Option<String>,
        address: Option<String>,
    },
    /// An emoji reaction to an earlier message
    Reaction {
        message_id: String,
        emoji: Option<String>,
    },
    /// A message type this library does not model
    Unknown { message_type: String },
}

/// An incoming user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Provider message id (`wamid.…`)
    pub message_id: String,
    /// Display name from the contact profile, when the provider sent one
    pub sender_name: Option<String>,
    pub content: MessageContent,
}

/// Where a button press originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonSource {
    /// Quick-reply button attached to a template message
    TemplateQuickReply,
    /// Reply button of an interactive message
    Interactive,
}

/// A pressed button
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackButton {
    pub message_id: String,
    /// Button label shown to the user
    pub title: String,
    /// Developer-defined callback payload
    pub data: String,
    pub source: ButtonSource,
}

/// A selection from an interactive list message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackSelection {
    pub message_id: String,
    pub title: String,
    /// Developer-defined row id
    pub data: String,
    pub description: Option<String>,
}

/// Delivery state of a previously sent message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
    Failed,
    Deleted,
}

impl DeliveryStatus {
    /// Map the provider's status string, `None` for values we do not know.
    pub fn from_provider(status: &str) -> Option<Self> {
        match status {
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            "failed" => Some(Self::Failed),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Error details attached to a failed delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusError {
    pub code: i64,
    pub message: String,
}

/// A delivery status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageStatus {
    /// Id of the message the status refers to
    pub message_id: String,
    /// Recipient wa_id
    pub recipient: String,
    pub status: DeliveryStatus,
    /// Present when `status` is `Failed`
    pub error: Option<StatusError>,
    pub conversation_id: Option<String>,
}

/// A template approval/rejection/pause event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateStatusUpdate {
    pub template_id: String,
    pub template_name: String,
    /// Provider event name, e.g. `APPROVED` or `REJECTED`
    pub event: String,
    pub reason: Option<String>,
}

/// The result of a completed WhatsApp Flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowCompletion {
    pub message_id: String,
    /// Flow token, when the flow response carried one
    pub token: Option<String>,
    /// Confirmation body shown in the chat
    pub body: Option<String>,
    /// Raw flow response object
    pub response: serde_json::Value,
}

/// The user opened the chat (provider `request_welcome` system message)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOpened {
    pub message_id: String,
}

/// Kind-specific payload of an [`Update`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdatePayload {
    Message(IncomingMessage),
    CallbackButton(CallbackButton),
    CallbackSelection(CallbackSelection),
    MessageStatus(MessageStatus),
    TemplateStatusUpdate(TemplateStatusUpdate),
    FlowCompletion(FlowCompletion),
    ChatOpened(ChatOpened),
    /// The webhook change field or shape marker that was not recognized
    Unsupported { field: String },
}

/// One normalized, typed event derived from a provider webhook delivery.
///
/// Plain data: cheap to clone, safe to fan out across handlers. The
/// outbound client is passed to handlers by the dispatcher rather than
/// carried inside the update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Sender wa_id; empty for statuses and account-level events
    pub sender: String,
    /// Event time as epoch seconds; `0` when absent or unparseable
    pub timestamp: i64,
    /// Id of the webhook entry this update came from
    pub entry_id: String,
    pub payload: UpdatePayload,
}

impl Update {
    /// The kind this update belongs to, derived from its payload.
    pub fn kind(&self) -> UpdateKind {
        match &self.payload {
            UpdatePayload::Message(_) => UpdateKind::Message,
            UpdatePayload::CallbackButton(_) => UpdateKind::CallbackButton,
            UpdatePayload::CallbackSelection(_) => UpdateKind::CallbackSelection,
            UpdatePayload::MessageStatus(_) => UpdateKind::MessageStatus,
            UpdatePayload::TemplateStatusUpdate(_) => UpdateKind::TemplateStatusUpdate,
            UpdatePayload::FlowCompletion(_) => UpdateKind::FlowCompletion,
            UpdatePayload::ChatOpened(_) => UpdateKind::ChatOpened,
            UpdatePayload::Unsupported { .. } => UpdateKind::Unsupported,
        }
    }

    /// Extracted text for filtering: a text body, a media caption, a
    /// button/selection title, or a flow confirmation body.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            UpdatePayload::Message(msg) => match &msg.content {
                MessageContent::Text { body } => Some(body),
                MessageContent::Media { caption, .. } => caption.as_deref(),
                _ => None,
            },
            UpdatePayload::CallbackButton(btn) => Some(&btn.title),
            UpdatePayload::CallbackSelection(sel) => Some(&sel.title),
            UpdatePayload::FlowCompletion(flow) => flow.body.as_deref(),
            _ => None,
        }
    }

    /// The provider message id, for kinds that carry one.
    pub fn message_id(&self) -> Option<&str> {
        match &self.payload {
            UpdatePayload::Message(msg) => Some(&msg.message_id),
            UpdatePayload::CallbackButton(btn) => Some(&btn.message_id),
            UpdatePayload::CallbackSelection(sel) => Some(&sel.message_id),
            UpdatePayload::MessageStatus(status) => Some(&status.message_id),
            UpdatePayload::FlowCompletion(flow) => Some(&flow.message_id),
            UpdatePayload::ChatOpened(opened) => Some(&opened.message_id),
            _ => None,
        }
    }

    /// Whether this update is a message with a media attachment.
    pub fn has_media(&self) -> bool {
        matches!(
            &self.payload,
            UpdatePayload::Message(IncomingMessage {
                content: MessageContent::Media { .. },
                ..
            })
        )
    }
}
