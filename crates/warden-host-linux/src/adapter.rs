//! loginctl-backed session locking

use tokio::process::Command;
use tracing::{debug, info};
use warden_host_api::{HostError, HostResult};
use warden_util::SessionId;

/// Locks sessions by shelling out to `loginctl lock-session`.
///
/// The session id is passed through exactly as the event source announced
/// it; wardend never interprets it.
#[derive(Debug, Default)]
pub struct LoginctlAdapter {
    _private: (),
}

impl LoginctlAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask logind to lock the named session
    pub async fn lock_session(&self, username: &str, session_id: &SessionId) -> HostResult<()> {
        debug!(user = username, session_id = %session_id, "Invoking loginctl lock-session");

        let output = Command::new("loginctl")
            .arg("lock-session")
            .arg(session_id.as_str())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostError::CommandFailed(format!(
                "loginctl lock-session {} exited with {}: {}",
                session_id,
                output.status,
                stderr.trim()
            )));
        }

        info!(user = username, session_id = %session_id, "Session lock requested");
        Ok(())
    }
}
