//! Command types for the wardend protocol

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use warden_util::{ClientId, TimeRange};

use crate::{API_VERSION, LifecycleSignal, OverrideView, UserStatus};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    UserNotFound,
    SessionNotFound,
    InvalidOverride,
    PermissionDenied,
    StoreError,
    InternalError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Full status for one user
    Status { user: String },

    /// Would this user be permitted to log in right now?
    CheckLogin { user: String },

    /// Suspend a user's access until resumed (admin)
    Pause { user: String },

    /// Lift a pause (admin)
    Resume { user: String },

    /// Add a temporary override (admin). Exactly one of `extra_minutes`
    /// or `allowed_hours` must be given; a missing expiry defaults to the
    /// end of the current day.
    AddOverride {
        user: String,
        reason: String,
        #[serde(default)]
        extra_minutes: Option<u32>,
        #[serde(default)]
        allowed_hours: Option<TimeRange>,
        #[serde(default)]
        expires_at: Option<DateTime<Local>>,
    },

    /// Remove a user's override by index (admin)
    RemoveOverride { user: String, index: usize },

    /// List overrides for one user, or for all users when absent
    ListOverrides {
        #[serde(default)]
        user: Option<String>,
    },

    /// Push a notification to a user's active session (admin)
    Notify { user: String, message: String },

    /// Deliver a lifecycle signal from the session-event source (admin)
    SessionSignal { signal: LifecycleSignal },

    /// Subscribe to broadcast events (notifications, lock requests)
    SubscribeEvents,

    /// Ping for keepalive
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Status(UserStatus),
    LoginPermitted { permitted: bool },
    Paused,
    Resumed,
    OverrideAdded,
    OverrideRemoved,
    Overrides(HashMap<String, Vec<OverrideView>>),
    Notified,
    SignalAccepted,
    Subscribed { client_id: ClientId },
    Pong,
}
