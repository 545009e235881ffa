//! Strongly-typed identifiers for wardend

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one login session, as announced by the host's session
/// manager. The value is opaque to wardend: it is never parsed, only
/// compared and stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a connected IPC client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_equality() {
        let a = SessionId::new("/org/freedesktop/login1/session/_32");
        let b = SessionId::new("/org/freedesktop/login1/session/_32");
        let c = SessionId::new("/org/freedesktop/login1/session/_33");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn session_id_serializes_transparently() {
        let id = SessionId::new("s1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"s1\"");

        let parsed: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn client_id_uniqueness() {
        assert_ne!(ClientId::new(), ClientId::new());
    }
}
