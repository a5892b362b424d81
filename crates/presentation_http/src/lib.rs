//! HTTP endpoint adapter for Cloudhook
//!
//! Hosts the WhatsApp webhook endpoint: subscription handshake on GET,
//! authenticated delivery intake on POST, and a background worker that
//! dispatches parsed updates to registered handlers.

pub mod config;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod tasks;

pub use config::{ConfigError, OutboundConfig, ServerConfig};
pub use routes::create_router;
pub use state::AppState;
pub use tasks::spawn_dispatch_worker;
