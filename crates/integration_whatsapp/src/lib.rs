//! WhatsApp Cloud API integration for Cloudhook
//!
//! Inbound: webhook signature verification, the subscription handshake,
//! and parsing provider deliveries into typed [`domain::Update`]s.
//! Outbound: a small Graph API message client.

pub mod client;
pub mod webhook;

pub use client::{ClientError, SendMessageResponse, WhatsAppClient, WhatsAppClientConfig};
pub use webhook::{check_subscription, parse_updates, verify_signature};
