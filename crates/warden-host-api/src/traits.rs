//! Host adapter trait definitions

use async_trait::async_trait;
use warden_util::SessionId;

use crate::HostResult;

/// Side effects the engine can request against a user's session.
///
/// Both are advisory: locking asks the session manager to lock, and a
/// notification asks whatever listener the user runs to display it.
/// Neither can stop a sufficiently privileged user.
#[async_trait]
pub trait SessionHost: Send + Sync {
    /// Request that the named session be locked
    async fn lock_session(&self, username: &str, session_id: &SessionId) -> HostResult<()>;

    /// Deliver a notification to the user's session
    async fn notify(
        &self,
        username: &str,
        session_id: &SessionId,
        summary: &str,
        body: &str,
    ) -> HostResult<()>;
}
