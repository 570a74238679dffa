//! Address brokered websocket signaling relay server.
//!
//! Clients open a persistent binary websocket to the server, listen
//! on string addresses inside an application namespace, and connect
//! to each other's addresses. The server relays short signaling
//! messages between paired peers; it carries the payloads opaquely
//! and has no knowledge of their contents.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod connection;
mod error;
mod pool;
mod server;
mod session;
mod websocket;

pub use config::{AppConfig, CorsConfig, ServerConfig, TlsConfig};
pub use error::Error;
pub use server::SignalingServer;

pub use axum;

/// Result type for the signaling relay.
pub type Result<T> = std::result::Result<T, Error>;
