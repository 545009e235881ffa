//! The policy evaluator
//!
//! Pure functions over `(username, state snapshot, config, now)`. `now` is
//! always caller-supplied, so every decision is deterministic and testable
//! without a real clock. All arithmetic is whole-second.
//!
//! One asymmetry is deliberate and pinned by tests: `permit_login` treats
//! Friday+Saturday as the weekend for window selection, while
//! `time_remaining` treats Saturday+Sunday as the weekend. See DESIGN.md
//! before changing either side.

use chrono::{DateTime, Datelike, Local, Weekday};
use std::time::Duration;
use warden_config::Config;
use warden_state::State;

/// Sentinel for "no restriction applies"
pub const UNLIMITED: i64 = i64::MAX;

/// Decide whether a user may be logged in right now.
///
/// Rules apply in order; the first failing rule denies:
/// 1. Resolve the effective policy; a user outside enforcement is
///    permitted unconditionally.
/// 2. Allowed hours: every non-expired allowed-hours override must permit
///    `now`; with none, the configured window for the day governs.
/// 3. A user with no recorded history is permitted (usage rules cannot
///    apply) - but only after the hours check above.
/// 4. A paused user is denied.
/// 5. Daily limit, with extra-time overrides added in.
pub fn permit_login(
    username: &str,
    state: &State,
    config: &Config,
    now: DateTime<Local>,
) -> bool {
    let Some(policy) = config.effective(username) else {
        return true;
    };

    let user = state.user(username);

    let override_windows = user
        .map(|u| u.active_hours_overrides(now))
        .unwrap_or_default();
    if !override_windows.is_empty() {
        // Replacement windows are conjunctive: all must permit now
        if !override_windows.iter().all(|w| w.contains(&now)) {
            return false;
        }
    } else {
        // Friday and Saturday take the weekend window here
        let weekend = matches!(now.weekday(), Weekday::Fri | Weekday::Sat);
        let window = if weekend {
            policy.weekend_hours
        } else {
            policy.allowed_hours
        };
        if let Some(window) = window
            && !window.contains(&now)
        {
            return false;
        }
    }

    let Some(user) = user else {
        return true;
    };

    if user.paused {
        return false;
    }

    let mut limit_secs = policy
        .daily_limit
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    limit_secs += user.extra_minutes(now) as i64 * 60;

    if limit_secs > 0 && user.seconds_used_today(now) >= limit_secs {
        return false;
    }

    true
}

/// Seconds until the user's session should be locked: the minimum of the
/// daily-limit remainder and the time to the end of the governing
/// allowed-hours window. [`UNLIMITED`] when nothing restricts the user.
pub fn time_remaining(
    username: &str,
    state: &State,
    config: &Config,
    now: DateTime<Local>,
) -> i64 {
    let Some(policy) = config.effective(username) else {
        return UNLIMITED;
    };
    let Some(user) = state.user(username) else {
        return UNLIMITED;
    };

    let mut by_limit = UNLIMITED;
    if let Some(limit) = policy.daily_limit
        && limit.as_secs() > 0
    {
        let limit_secs = limit.as_secs() as i64 + user.extra_minutes(now) as i64 * 60;
        by_limit = (limit_secs - user.seconds_used_today(now)).max(0);
    }

    // An active override window takes precedence over the configured one;
    // Saturday and Sunday take the weekend window here.
    let window = user
        .active_hours_overrides(now)
        .first()
        .map(|w| **w)
        .or_else(|| {
            let weekend = matches!(now.weekday(), Weekday::Sat | Weekday::Sun);
            if weekend {
                policy.weekend_hours
            } else {
                policy.allowed_hours
            }
        });

    let by_hours = match window {
        Some(w) => w.seconds_until_end(&now),
        None => UNLIMITED,
    };

    by_limit.min(by_hours)
}

/// Whether a notification should fire for this poll.
///
/// True iff `remaining_secs` lies in the half-open interval
/// `(threshold - 60, threshold]` for any threshold, so a poller running
/// every 60 seconds fires exactly once per threshold crossing.
pub fn should_notify(remaining_secs: i64, thresholds: &[Duration]) -> bool {
    thresholds.iter().any(|threshold| {
        let threshold = threshold.as_secs() as i64;
        remaining_secs <= threshold && remaining_secs > threshold - 60
    })
}
