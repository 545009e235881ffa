//! The state store
//!
//! Sole owner of the `State` document. Every mutation goes through one
//! exclusive lock and is persisted before the lock is released, so readers
//! only ever observe fully completed transitions. Writes go to a temporary
//! file followed by an atomic rename; a crash mid-write leaves the prior
//! document intact.
//!
//! The persisted file's modification time doubles as a heartbeat: on
//! startup, a heartbeat older than the host's uptime proves the daemon was
//! not running across a downtime window, and sessions still open in the
//! loaded document are closed at the heartbeat rather than credited the
//! gap.

use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{SegmentCloseReason, State};

/// Store errors. Any of these during `open` is fatal to the daemon.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

struct StoreInner {
    state: State,
    heartbeat: DateTime<Local>,
}

/// Exclusive-access owner of the persisted `State`
pub struct StateStore {
    path: PathBuf,
    inner: Mutex<StoreInner>,
}

impl StateStore {
    /// Load the store from `path`, creating and persisting an empty state
    /// when the file does not exist yet. Any other load error is returned
    /// (the process cannot start without its state).
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        match fs::metadata(&path) {
            Ok(meta) => {
                // The file's mtime is the last heartbeat of the previous run
                let heartbeat = meta
                    .modified()
                    .map(DateTime::<Local>::from)
                    .unwrap_or_else(|_| Local::now());

                let data = fs::read(&path)?;
                let state: State = serde_json::from_slice(&data)?;

                info!(
                    path = %path.display(),
                    users = state.users.len(),
                    last_heartbeat = %heartbeat,
                    "State loaded"
                );

                Ok(Self {
                    path,
                    inner: Mutex::new(StoreInner { state, heartbeat }),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let state = State::new();
                persist(&path, &state)?;

                info!(path = %path.display(), "State file created");

                Ok(Self {
                    path,
                    inner: Mutex::new(StoreInner {
                        state,
                        heartbeat: Local::now(),
                    }),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The heartbeat loaded from disk (or the last one written)
    pub fn last_heartbeat(&self) -> DateTime<Local> {
        self.inner.lock().unwrap().heartbeat
    }

    /// Update the heartbeat to now and touch the persisted file's mtime.
    /// Best-effort: a failed touch is logged, never propagated.
    pub fn heartbeat(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.heartbeat = Local::now();

        let touched = fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .and_then(|f| f.set_modified(SystemTime::now()));
        if let Err(e) = touched {
            warn!(path = %self.path.display(), error = %e, "Failed to touch state file");
        }
    }

    /// Close sessions left open across a downtime window.
    ///
    /// If the gap since the last heartbeat exceeds the host's uptime, the
    /// daemon conclusively did not run continuously across it (reboot, or
    /// suspend while not resident). Every open session is closed at the
    /// last heartbeat, never at `now`, so the gap is not credited as
    /// usage.
    pub fn recover(&self, now: DateTime<Local>, uptime: Duration) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();

        let gap = now - inner.heartbeat;
        let was_down = gap.num_seconds() > uptime.as_secs() as i64;

        if was_down {
            let heartbeat = inner.heartbeat;
            let mut closed = 0usize;
            for user in inner.state.users.values_mut() {
                for session in user.sessions.iter_mut().filter(|s| s.is_active()) {
                    session.close(heartbeat, SegmentCloseReason::DaemonOffline);
                    closed += 1;
                }
            }

            if closed > 0 {
                info!(
                    closed,
                    gap_secs = gap.num_seconds(),
                    uptime_secs = uptime.as_secs(),
                    "Closed sessions left open across downtime"
                );
            }
        } else {
            debug!(
                gap_secs = gap.num_seconds(),
                uptime_secs = uptime.as_secs(),
                "No downtime detected"
            );
        }

        inner.heartbeat = now;
        persist(&self.path, &inner.state)
    }

    /// An independent deep copy of the state for read-only use
    pub fn snapshot(&self) -> State {
        self.inner.lock().unwrap().state.clone()
    }

    /// The transaction primitive: lock, mutate, persist, unlock as one
    /// unit. Every mutating operation goes through here.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> StoreResult<R> {
        let mut inner = self.inner.lock().unwrap();
        let result = f(&mut inner.state);
        persist(&self.path, &inner.state)?;
        Ok(result)
    }

    /// Like [`with_state`](Self::with_state), but the mutation itself may
    /// be rejected; nothing is persisted when it is.
    pub(crate) fn with_state_checked<R>(
        &self,
        f: impl FnOnce(&mut State) -> warden_util::Result<R>,
    ) -> warden_util::Result<R> {
        let mut inner = self.inner.lock().unwrap();
        let result = f(&mut inner.state)?;
        persist(&self.path, &inner.state)
            .map_err(|e| warden_util::WardenError::store(e.to_string()))?;
        Ok(result)
    }

    /// Purge expired overrides. Not on the enforcement path (the evaluator
    /// already ignores expired ones); this keeps the document tidy.
    pub fn cleanup_expired_overrides(&self, now: DateTime<Local>) -> StoreResult<usize> {
        self.with_state(|state| {
            let mut removed = 0usize;
            for user in state.users.values_mut() {
                let before = user.overrides.len();
                user.overrides.retain(|o| !o.is_expired(now));
                removed += before - user.overrides.len();
            }
            removed
        })
    }

    /// Drop ended sessions older than the retention horizon. Active
    /// sessions are never removed regardless of age.
    pub fn remove_old_sessions(
        &self,
        now: DateTime<Local>,
        retention_days: u32,
    ) -> StoreResult<usize> {
        let horizon = now - chrono::Duration::days(retention_days as i64);
        self.with_state(|state| {
            let mut removed = 0usize;
            for user in state.users.values_mut() {
                let before = user.sessions.len();
                user.sessions
                    .retain(|s| s.is_active() || s.start >= horizon);
                removed += before - user.sessions.len();
            }
            removed
        })
    }
}

/// Serialize the whole state and write it atomically: temporary file,
/// then rename over the canonical path.
fn persist(path: &Path, state: &State) -> StoreResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let data = serde_json::to_vec_pretty(state)?;
    fs::write(&tmp, &data)?;
    fs::rename(&tmp, path)?;

    Ok(())
}
