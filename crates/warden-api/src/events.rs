//! Broadcast events for subscribed clients
//!
//! Notifications are delivered this way: the system daemon has no access
//! to a user's desktop, so it broadcasts the event and a listener running
//! inside the user's session (`wardctl listen`) renders it.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use warden_util::SessionId;

/// Event wrapper with a timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp: Local::now(),
            payload,
        }
    }
}

/// Event payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A notification for one user's desktop
    Notification {
        username: String,
        summary: String,
        body: String,
    },

    /// The daemon requested a session lock
    SessionLocked {
        username: String,
        session_id: SessionId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_round_trip() {
        let event = Event::new(EventPayload::Notification {
            username: "alice".into(),
            summary: "Session time".into(),
            body: "10m remaining".into(),
        });

        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();

        assert!(matches!(
            parsed.payload,
            EventPayload::Notification { username, .. } if username == "alice"
        ));
    }
}
