//! The enforcement engine
//!
//! A periodic loop over a state snapshot: for each enforced user with an
//! active session, ask the evaluator whether they may stay logged in and
//! how much time is left, then request lock or notify side effects through
//! the host. The loop and the lifecycle handlers run on independent tasks
//! and share only the store's lock.

use chrono::{DateTime, Local, NaiveDate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use warden_config::Config;
use warden_host_api::SessionHost;
use warden_state::StateStore;
use warden_util::format_duration;

use crate::eval;

/// The periodic enforcement engine
pub struct Engine {
    store: Arc<StateStore>,
    config: Config,
    host: Arc<dyn SessionHost>,
    last_sweep: Option<NaiveDate>,
}

impl Engine {
    pub fn new(store: Arc<StateStore>, config: Config, host: Arc<dyn SessionHost>) -> Self {
        info!(
            users = config.users.len(),
            poll_interval_secs = config.daemon.poll_interval.as_secs(),
            "Engine initialized"
        );

        Self {
            store,
            config,
            host,
            last_sweep: None,
        }
    }

    /// Run the loop until shutdown is signalled. Ticks once immediately,
    /// then on every interval.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.daemon.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!("Engine started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(Local::now()).await;
                }
                _ = shutdown.changed() => {
                    info!("Engine shutting down");
                    return;
                }
            }
        }
    }

    /// One enforcement pass. Public so tests can drive it with a chosen
    /// `now`.
    pub async fn tick(&mut self, now: DateTime<Local>) {
        let snapshot = self.store.snapshot();
        debug!(users = snapshot.users.len(), "Enforcement tick");

        for (username, user) in &snapshot.users {
            let Some(policy) = self.config.effective(username) else {
                continue;
            };
            if !policy.enabled {
                continue;
            }
            if user.paused {
                continue;
            }
            let Some(session) = user.active_session() else {
                continue;
            };

            if !eval::permit_login(username, &snapshot, &self.config, now) {
                if policy.lock_screen {
                    info!(user = %username, session_id = %session.session_id, "Login no longer permitted, locking");
                    if let Err(e) = self.host.lock_session(username, &session.session_id).await {
                        warn!(user = %username, error = %e, "Failed to lock session");
                    }
                } else {
                    info!(user = %username, "Login no longer permitted, but lock_screen is off");
                }
                continue;
            }

            let remaining = eval::time_remaining(username, &snapshot, &self.config, now);
            if eval::should_notify(remaining, &policy.notify_before) {
                let left = format_duration(Duration::from_secs(remaining.max(0) as u64));
                let body = format!("You have {} of session time remaining", left);

                info!(user = %username, remaining_secs = remaining, "Sending low-time notification");
                if let Err(e) = self
                    .host
                    .notify(username, &session.session_id, "Session time warning", &body)
                    .await
                {
                    warn!(user = %username, error = %e, "Failed to notify");
                }
            }
        }

        self.run_daily_sweeps(now);
        self.store.heartbeat();
    }

    /// Once per calendar day: purge expired overrides and drop session
    /// history past the retention horizon. Neither is on the enforcement
    /// path.
    fn run_daily_sweeps(&mut self, now: DateTime<Local>) {
        let today = now.date_naive();
        if self.last_sweep == Some(today) {
            return;
        }
        self.last_sweep = Some(today);

        match self.store.cleanup_expired_overrides(now) {
            Ok(removed) if removed > 0 => info!(removed, "Purged expired overrides"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Override sweep failed"),
        }

        match self
            .store
            .remove_old_sessions(now, self.config.daemon.retention_days)
        {
            Ok(removed) if removed > 0 => info!(removed, "Removed old sessions"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Session retention sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use warden_host_api::{HostCall, MockHost};
    use warden_util::SessionId;

    fn config() -> Config {
        warden_config::parse_config(
            r#"
            [users.alice]
            daily_limit = "3h"
            allowed_hours = "09:00-17:00"
            weekend_hours = "10:00-14:00"
            notify_before = ["10m", "5m"]
            lock_screen = true
            enabled = true

            [users.carol]
            daily_limit = "3h"
            allowed_hours = "09:00-17:00"
            lock_screen = false
            enabled = true
        "#,
        )
        .unwrap()
    }

    fn monday(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap()
    }

    fn engine_with(cfg: Config) -> (tempfile::TempDir, Arc<StateStore>, Arc<MockHost>, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(StateStore::open(dir.path().join("state.json")).unwrap());
        let host = Arc::new(MockHost::new());
        let engine = Engine::new(store.clone(), cfg, host.clone());
        (dir, store, host, engine)
    }

    #[tokio::test]
    async fn permitted_user_is_left_alone() {
        let (_dir, store, host, mut engine) = engine_with(config());
        store.handle_login("alice", &SessionId::new("s1"), monday(9, 0));

        engine.tick(monday(10, 0)).await;

        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn lock_requested_outside_allowed_hours() {
        let (_dir, store, host, mut engine) = engine_with(config());
        store.handle_login("alice", &SessionId::new("s1"), monday(16, 0));

        engine.tick(monday(17, 30)).await;

        let locks = host.lock_requests();
        assert_eq!(locks.len(), 1);
        assert!(matches!(
            &locks[0],
            HostCall::Lock { username, session_id }
                if username == "alice" && *session_id == SessionId::new("s1")
        ));
    }

    #[tokio::test]
    async fn lock_respects_lock_screen_flag() {
        let (_dir, store, host, mut engine) = engine_with(config());
        store.handle_login("carol", &SessionId::new("s2"), monday(16, 0));

        engine.tick(monday(17, 30)).await;

        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn notification_fires_inside_threshold_window() {
        let (_dir, store, host, mut engine) = engine_with(config());
        // 2h50m used at 11:50: 10 minutes remaining
        store.handle_login("alice", &SessionId::new("s1"), monday(9, 0));

        engine.tick(monday(11, 50)).await;

        let notifies = host.notify_requests();
        assert_eq!(notifies.len(), 1);
        assert!(matches!(
            &notifies[0],
            HostCall::Notify { username, body, .. }
                if username == "alice" && body.contains("10m")
        ));
    }

    #[tokio::test]
    async fn no_notification_outside_threshold_windows() {
        let (_dir, store, host, mut engine) = engine_with(config());
        store.handle_login("alice", &SessionId::new("s1"), monday(9, 0));

        // 30 minutes remaining: between the 10m and 5m windows and above both
        engine.tick(monday(11, 30)).await;

        assert!(host.notify_requests().is_empty());
    }

    #[tokio::test]
    async fn paused_and_unconfigured_users_are_skipped() {
        let (_dir, store, host, mut engine) = engine_with(config());
        store.handle_login("alice", &SessionId::new("s1"), monday(16, 0));
        store.pause_user("alice").unwrap();
        // mallory has no policy and the default is disabled
        store.handle_login("mallory", &SessionId::new("s3"), monday(16, 0));

        engine.tick(monday(23, 0)).await;

        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn idle_session_still_counts_as_active_for_enforcement() {
        let (_dir, store, host, mut engine) = engine_with(config());
        store.handle_login("alice", &SessionId::new("s1"), monday(16, 0));
        store.handle_lock("alice", &SessionId::new("s1"), monday(16, 30));

        // Locked screen or not, the session is past hours and gets locked
        engine.tick(monday(17, 30)).await;

        assert_eq!(host.lock_requests().len(), 1);
    }

    #[tokio::test]
    async fn tick_refreshes_heartbeat() {
        let (_dir, store, _host, mut engine) = engine_with(config());
        let before = store.last_heartbeat();

        engine.tick(monday(10, 0)).await;

        assert!(store.last_heartbeat() >= before);
    }

    #[tokio::test]
    async fn daily_sweep_purges_expired_overrides_once() {
        let (_dir, store, _host, mut engine) = engine_with(config());
        store
            .add_override(
                "alice",
                warden_state::Override::extra_time("stale", 30, monday(8, 0)),
            )
            .unwrap();

        engine.tick(monday(10, 0)).await;
        assert!(store.snapshot().users["alice"].overrides.is_empty());

        // Second tick the same day: sweep does not run again
        store
            .add_override(
                "alice",
                warden_state::Override::extra_time("stale again", 30, monday(9, 0)),
            )
            .unwrap();
        engine.tick(monday(11, 0)).await;
        assert_eq!(store.snapshot().users["alice"].overrides.len(), 1);
    }
}
