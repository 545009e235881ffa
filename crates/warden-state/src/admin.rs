//! Administrative mutations
//!
//! Unlike the lifecycle handlers, these surface errors synchronously to
//! their caller: an unknown user or a bad override index is the admin
//! tool's problem, not a flaky signal source.

use std::collections::HashMap;
use tracing::info;
use warden_util::{Result, SessionId, WardenError};

use crate::{Override, StateStore, User};

impl StateStore {
    /// Suspend a user's access until resumed
    pub fn pause_user(&self, user: &str) -> Result<()> {
        self.mutate_user(user, |record| {
            record.paused = true;
            Ok(())
        })?;
        info!(user, "User paused");
        Ok(())
    }

    /// Lift a pause
    pub fn resume_user(&self, user: &str) -> Result<()> {
        self.mutate_user(user, |record| {
            record.paused = false;
            Ok(())
        })?;
        info!(user, "User resumed");
        Ok(())
    }

    /// Add an override, creating the user record if this is the first
    /// thing known about them
    pub fn add_override(&self, user: &str, ov: Override) -> Result<()> {
        let expires_at = ov.expires_at;
        self.with_state_checked(|state| {
            state.ensure_user(user).overrides.push(ov);
            Ok(())
        })?;

        info!(user, expires_at = %expires_at, "Override added");
        Ok(())
    }

    /// Remove a user's override by index
    pub fn remove_override(&self, user: &str, index: usize) -> Result<()> {
        self.mutate_user(user, |record| {
            if index >= record.overrides.len() {
                return Err(WardenError::invalid_override(format!(
                    "index {} out of range (user has {} overrides)",
                    index,
                    record.overrides.len()
                )));
            }
            record.overrides.remove(index);
            Ok(())
        })?;

        info!(user, index, "Override removed");
        Ok(())
    }

    /// Overrides for one user (error when unknown) or for every user that
    /// has any
    pub fn list_overrides(&self, user: Option<&str>) -> Result<HashMap<String, Vec<Override>>> {
        let state = self.snapshot();

        match user {
            Some(name) => {
                let record = state
                    .user(name)
                    .ok_or_else(|| WardenError::user_not_found(name))?;
                Ok(HashMap::from([(name.to_string(), record.overrides.clone())]))
            }
            None => Ok(state
                .users
                .into_iter()
                .filter(|(_, record)| !record.overrides.is_empty())
                .map(|(name, record)| (name, record.overrides))
                .collect()),
        }
    }

    /// The active session id for a user, if any
    pub fn active_session_id(&self, user: &str) -> Option<SessionId> {
        self.snapshot()
            .user(user)
            .and_then(|record| record.active_session().map(|s| s.session_id.clone()))
    }

    fn mutate_user(&self, user: &str, f: impl FnOnce(&mut User) -> Result<()>) -> Result<()> {
        self.with_state_checked(|state| match state.users.get_mut(user) {
            Some(record) => f(record),
            None => Err(WardenError::user_not_found(user)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Local, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap()
    }

    fn store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn pause_and_resume() {
        let (_dir, store) = store();
        store.handle_login("alice", &SessionId::new("s1"), at(9, 0));

        store.pause_user("alice").unwrap();
        assert!(store.snapshot().users["alice"].paused);

        store.resume_user("alice").unwrap();
        assert!(!store.snapshot().users["alice"].paused);
    }

    #[test]
    fn pause_unknown_user_fails_without_creating_them() {
        let (_dir, store) = store();

        let err = store.pause_user("ghost").unwrap_err();
        assert!(matches!(err, WardenError::UserNotFound(_)));
        assert!(store.snapshot().users.is_empty());
    }

    #[test]
    fn add_override_creates_user_record() {
        let (_dir, store) = store();

        store
            .add_override("newkid", Override::extra_time("first day", 30, at(23, 0)))
            .unwrap();

        let state = store.snapshot();
        assert_eq!(state.users["newkid"].overrides.len(), 1);
        assert!(state.users["newkid"].sessions.is_empty());
    }

    #[test]
    fn remove_override_checks_index() {
        let (_dir, store) = store();
        store
            .add_override("alice", Override::extra_time("a", 10, at(23, 0)))
            .unwrap();

        let err = store.remove_override("alice", 5).unwrap_err();
        assert!(matches!(err, WardenError::InvalidOverride(_)));
        assert_eq!(store.snapshot().users["alice"].overrides.len(), 1);

        store.remove_override("alice", 0).unwrap();
        assert!(store.snapshot().users["alice"].overrides.is_empty());
    }

    #[test]
    fn list_overrides_all_skips_users_without_any() {
        let (_dir, store) = store();
        store.handle_login("bob", &SessionId::new("s1"), at(9, 0));
        store
            .add_override("alice", Override::extra_time("a", 10, at(23, 0)))
            .unwrap();

        let all = store.list_overrides(None).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("alice"));

        let err = store.list_overrides(Some("ghost")).unwrap_err();
        assert!(matches!(err, WardenError::UserNotFound(_)));
    }
}
