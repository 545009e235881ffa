//! IPC layer for wardend
//!
//! Provides:
//! - Unix domain socket server
//! - NDJSON (newline-delimited JSON) protocol
//! - Peer-UID role assignment (root and the socket owner are admins)
//! - Event broadcast to subscribed clients

mod client;
mod server;

pub use client::*;
pub use server::*;

use thiserror::Error;

/// IPC errors
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Server error: {0}")]
    ServerError(String),
}

pub type IpcResult<T> = Result<T, IpcError>;
