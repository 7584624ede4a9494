//! LiveTalk gateway HTTP API server
//!
//! Exposes signaling (`/offer`), the command endpoints and health over axum.

pub mod commands;
pub mod health_api;
pub mod server;
pub mod shutdown;
pub mod signaling;
pub mod wire;

pub use server::{router, start_server, GatewayState};
pub use shutdown::shutdown_signal;
