//! # Gateway Module
//!
//! The dispatcher pipeline, the gateway context that owns all shared state, and the
//! HTTP surface on top of it.

pub mod context;
pub mod dispatcher;
pub mod server;

pub use context::{Gateway, GatewayBuilder};
pub use dispatcher::Dispatcher;
pub use server::{router, serve, ServerState};
