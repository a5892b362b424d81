//! Domain-level errors

use thiserror::Error;

/// Errors produced while turning a webhook body into updates.
///
/// Parse failures are acknowledged at the transport boundary (HTTP 200
/// without dispatch) so the provider does not retry malformed payloads
/// forever; they never crash the endpoint.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body was not valid JSON
    #[error("malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON, but the provider envelope structure is missing
    #[error("body lacks the webhook envelope structure")]
    MissingEnvelope,

    /// The envelope belongs to a different provider object
    #[error("not a WhatsApp business account webhook: object is {object:?}")]
    NotAWebhook { object: String },
}
