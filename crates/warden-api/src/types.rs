//! Shared protocol types: roles, lifecycle signals, and status views

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use warden_util::{SessionId, TimeRange};

/// Role assigned to a connected client based on its peer credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// root or the socket owner: full access
    Admin,
    /// Any other local user: read-only queries and event subscription
    User,
}

impl ClientRole {
    /// Whether this role may mutate state (pause, overrides, signals)
    pub fn can_mutate(&self) -> bool {
        matches!(self, ClientRole::Admin)
    }
}

/// A lifecycle signal from the host's session manager.
///
/// The source is authoritative but unreliable: duplicates, reordering,
/// and re-announcements are expected, and handlers treat them as such.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleSignal {
    /// A user logged in (or a session was re-announced)
    Login {
        user: String,
        session_id: SessionId,
    },
    /// A session ended
    Logout { session_id: SessionId },
    /// The user locked their screen
    Lock {
        user: String,
        session_id: SessionId,
    },
    /// The user unlocked their screen
    Unlock {
        user: String,
        session_id: SessionId,
    },
    /// The host is suspending
    Sleep,
    /// The host resumed from suspend
    Wake,
}

/// One tracked segment within a session, for status output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentView {
    pub start: DateTime<Local>,
    pub end: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One login session, for status output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub start: DateTime<Local>,
    pub end: Option<DateTime<Local>>,
    pub segments: Vec<SegmentView>,
}

/// One policy override, for status output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideView {
    pub reason: String,
    pub expires_at: DateTime<Local>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_hours: Option<TimeRange>,
}

/// Full per-user status returned by the `Status` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatus {
    pub username: String,
    pub paused: bool,
    pub seconds_used_today: i64,
    pub sessions: Vec<SessionView>,
    pub overrides: Vec<OverrideView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_gate_mutation() {
        assert!(ClientRole::Admin.can_mutate());
        assert!(!ClientRole::User.can_mutate());
    }

    #[test]
    fn lifecycle_signal_round_trip() {
        let signal = LifecycleSignal::Login {
            user: "alice".into(),
            session_id: SessionId::new("s1"),
        };

        let json = serde_json::to_string(&signal).unwrap();
        let parsed: LifecycleSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, signal);
    }

    #[test]
    fn sleep_signal_has_no_fields() {
        let json = serde_json::to_string(&LifecycleSignal::Sleep).unwrap();
        assert_eq!(json, r#"{"kind":"sleep"}"#);
    }
}
