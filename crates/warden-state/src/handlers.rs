//! Lifecycle signal handlers
//!
//! Each handler translates one external signal into a state transition,
//! executed as a single store transaction. The signal source is
//! authoritative but unreliable: duplicates, reordering, and
//! re-announcements are expected, so every handler is an idempotent
//! transition keyed by `(user, session_id)`, and errors are logged and
//! dropped rather than propagated.

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};
use warden_util::SessionId;

use crate::{SegmentCloseReason, StateStore};

#[derive(Debug, PartialEq, Eq)]
enum LoginOutcome {
    Created,
    Resumed,
    Duplicate,
}

impl StateStore {
    /// A user logged in, or the session was re-announced.
    ///
    /// Unknown id: a new session starts, engaged. Known and idle: the
    /// session resumes with a fresh segment. Known and engaged: no-op.
    pub fn handle_login(&self, user: &str, session_id: &SessionId, now: DateTime<Local>) {
        let result = self.with_state(|state| {
            let record = state.ensure_user(user);
            match record.active_session_mut(session_id) {
                Some(session) => {
                    if session.open_segment_at(now) {
                        LoginOutcome::Resumed
                    } else {
                        LoginOutcome::Duplicate
                    }
                }
                None => {
                    record.add_session(session_id.clone(), now);
                    LoginOutcome::Created
                }
            }
        });

        match result {
            Ok(LoginOutcome::Created) => {
                info!(user, session_id = %session_id, "User logged in");
            }
            Ok(LoginOutcome::Resumed) => {
                info!(user, session_id = %session_id, "Session resumed");
            }
            Ok(LoginOutcome::Duplicate) => {
                debug!(user, session_id = %session_id, "Duplicate login signal ignored");
            }
            Err(e) => warn!(user, error = %e, "Failed to persist login"),
        }
    }

    /// A session ended. The session is found by id across all users; its
    /// open segment closes along with it.
    pub fn handle_logout(&self, session_id: &SessionId, now: DateTime<Local>) {
        let result = self.with_state(|state| {
            state
                .find_active_session_mut(session_id)
                .map(|(username, session)| {
                    let username = username.clone();
                    session.close(now, SegmentCloseReason::Logout);
                    username
                })
        });

        match result {
            Ok(Some(username)) => {
                info!(user = %username, session_id = %session_id, "User logged out");
            }
            Ok(None) => {
                warn!(session_id = %session_id, "Logout for unknown session");
            }
            Err(e) => warn!(session_id = %session_id, error = %e, "Failed to persist logout"),
        }
    }

    /// The user locked their screen: the open segment closes, the session
    /// stays active (idle).
    pub fn handle_lock(&self, user: &str, session_id: &SessionId, now: DateTime<Local>) {
        let result = self.with_state(|state| {
            state
                .users
                .get_mut(user)
                .and_then(|u| u.active_session_mut(session_id))
                .map(|session| session.close_segment(now, SegmentCloseReason::UserLock))
        });

        match result {
            Ok(Some(true)) => info!(user, session_id = %session_id, "Session locked"),
            Ok(Some(false)) => {
                debug!(user, session_id = %session_id, "Lock signal with no open segment");
            }
            Ok(None) => {
                warn!(user, session_id = %session_id, "Lock for unknown session");
            }
            Err(e) => warn!(user, error = %e, "Failed to persist lock"),
        }
    }

    /// The user unlocked their screen: a new segment opens on the named
    /// session.
    pub fn handle_unlock(&self, user: &str, session_id: &SessionId, now: DateTime<Local>) {
        let result = self.with_state(|state| {
            state
                .users
                .get_mut(user)
                .and_then(|u| u.active_session_mut(session_id))
                .map(|session| session.open_segment_at(now))
        });

        match result {
            Ok(Some(true)) => info!(user, session_id = %session_id, "Session unlocked"),
            Ok(Some(false)) => {
                debug!(user, session_id = %session_id, "Unlock signal while already engaged");
            }
            Ok(None) => {
                warn!(user, session_id = %session_id, "Unlock for unknown session");
            }
            Err(e) => warn!(user, error = %e, "Failed to persist unlock"),
        }
    }

    /// The host is suspending: every open segment everywhere closes.
    /// Sessions stay active; nobody is logged out by a suspend.
    pub fn handle_sleep(&self, now: DateTime<Local>) {
        let result = self.with_state(|state| {
            let mut closed = 0usize;
            for user in state.users.values_mut() {
                for session in user.sessions.iter_mut().filter(|s| s.is_active()) {
                    if session.close_segment(now, SegmentCloseReason::SystemSleep) {
                        closed += 1;
                    }
                }
            }
            closed
        });

        match result {
            Ok(closed) => info!(closed, "System sleeping, segments closed"),
            Err(e) => warn!(error = %e, "Failed to persist sleep"),
        }
    }

    /// The host woke up. No state changes: a waking host does not prove a
    /// user resumed interacting, so segments reopen only on a subsequent
    /// unlock or re-delivered login.
    pub fn handle_wake(&self) {
        debug!("System woke up");
    }
}
