//! Error types for wardend

use thiserror::Error;

/// Core error type for wardend operations
#[derive(Debug, Error)]
pub enum WardenError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid override: {0}")]
    InvalidOverride(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Host error: {0}")]
    HostError(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WardenError {
    pub fn user_not_found(name: impl Into<String>) -> Self {
        Self::UserNotFound(name.into())
    }

    pub fn session_not_found(id: impl Into<String>) -> Self {
        Self::SessionNotFound(id.into())
    }

    pub fn invalid_override(msg: impl Into<String>) -> Self {
        Self::InvalidOverride(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn host(msg: impl Into<String>) -> Self {
        Self::HostError(msg.into())
    }

    pub fn ipc(msg: impl Into<String>) -> Self {
        Self::IpcError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, WardenError>;
