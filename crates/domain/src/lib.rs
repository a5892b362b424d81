//! Domain layer for Cloudhook
//!
//! Contains the typed update model derived from provider webhook
//! deliveries, the composable filter algebra used for handler selection,
//! and domain errors. This layer performs no I/O.

pub mod errors;
pub mod filter;
pub mod update;

pub use errors::ParseError;
pub use filter::{ContentKind, Filter};
pub use update::{
    ButtonSource, CallbackButton, CallbackSelection, ChatOpened, DeliveryStatus, FlowCompletion,
    IncomingMessage, MediaKind, MessageContent, MessageStatus, StatusError, TemplateStatusUpdate,
    Update, UpdateKind, UpdatePayload,
};
