//! Background tasks

pub mod dispatch_worker;

pub use dispatch_worker::spawn_dispatch_worker;
