//! Handler registration and update dispatch for Cloudhook
//!
//! The registry maps update kinds to ordered handler registrations; the
//! dispatcher evaluates one registry snapshot per update, in priority
//! order, with per-handler error isolation. Both are generic over the
//! outbound client type so this crate stays free of wire concerns.

pub mod dispatcher;
pub mod handler;
pub mod registry;

pub use dispatcher::Dispatcher;
pub use handler::{FnHandler, Handler, HandlerError, handler_fn};
pub use registry::{HandlerId, HandlerRegistry, Registration};
