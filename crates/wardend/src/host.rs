//! The daemon's composite host
//!
//! Locking goes to logind; notifications are broadcast over IPC for a
//! listener inside the user's session to render (the daemon itself has no
//! access to any desktop).

use async_trait::async_trait;
use std::sync::Arc;
use warden_api::{Event, EventPayload};
use warden_host_api::{HostResult, SessionHost};
use warden_host_linux::LoginctlAdapter;
use warden_ipc::IpcServer;
use warden_util::SessionId;

pub struct DaemonHost {
    locker: LoginctlAdapter,
    ipc: Arc<IpcServer>,
}

impl DaemonHost {
    pub fn new(locker: LoginctlAdapter, ipc: Arc<IpcServer>) -> Self {
        Self { locker, ipc }
    }
}

#[async_trait]
impl SessionHost for DaemonHost {
    async fn lock_session(&self, username: &str, session_id: &SessionId) -> HostResult<()> {
        self.locker.lock_session(username, session_id).await?;

        self.ipc.broadcast_event(Event::new(EventPayload::SessionLocked {
            username: username.to_string(),
            session_id: session_id.clone(),
        }));

        Ok(())
    }

    async fn notify(
        &self,
        username: &str,
        _session_id: &SessionId,
        summary: &str,
        body: &str,
    ) -> HostResult<()> {
        self.ipc.broadcast_event(Event::new(EventPayload::Notification {
            username: username.to_string(),
            summary: summary.to_string(),
            body: body.to_string(),
        }));

        Ok(())
    }
}
