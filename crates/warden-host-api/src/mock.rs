//! Mock host for testing

use async_trait::async_trait;
use std::sync::Mutex;
use warden_util::SessionId;

use crate::{HostResult, SessionHost};

/// One recorded side-effect request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Lock {
        username: String,
        session_id: SessionId,
    },
    Notify {
        username: String,
        session_id: SessionId,
        summary: String,
        body: String,
    },
}

/// A host that records every request instead of acting on it
#[derive(Debug, Default)]
pub struct MockHost {
    calls: Mutex<Vec<HostCall>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn lock_requests(&self) -> Vec<HostCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, HostCall::Lock { .. }))
            .collect()
    }

    pub fn notify_requests(&self) -> Vec<HostCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, HostCall::Notify { .. }))
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl SessionHost for MockHost {
    async fn lock_session(&self, username: &str, session_id: &SessionId) -> HostResult<()> {
        self.calls.lock().unwrap().push(HostCall::Lock {
            username: username.to_string(),
            session_id: session_id.clone(),
        });
        Ok(())
    }

    async fn notify(
        &self,
        username: &str,
        session_id: &SessionId,
        summary: &str,
        body: &str,
    ) -> HostResult<()> {
        self.calls.lock().unwrap().push(HostCall::Notify {
            username: username.to_string(),
            session_id: session_id.clone(),
            summary: summary.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_in_order() {
        let host = MockHost::new();
        let id = SessionId::new("s1");

        host.notify("alice", &id, "Session time", "10m left").await.unwrap();
        host.lock_session("alice", &id).await.unwrap();

        let calls = host.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], HostCall::Notify { .. }));
        assert!(matches!(calls[1], HostCall::Lock { .. }));
        assert_eq!(host.lock_requests().len(), 1);
    }
}
