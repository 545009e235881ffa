//! Resolved configuration types
//!
//! `Config::from_raw` turns the string-typed TOML schema into typed
//! durations and time ranges, filling unset per-user fields down from the
//! `[default]` policy.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use warden_util::{TimeRange, default_socket_path, default_state_path, parse_duration};

use crate::{ConfigError, ConfigResult, RawConfig, RawUserPolicy, ValidationError};

/// Resolved per-user policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPolicy {
    /// Daily engaged-time budget; `None` or zero means unlimited
    pub daily_limit: Option<Duration>,

    /// Weekday login window; `None` means unrestricted
    pub allowed_hours: Option<TimeRange>,

    /// Weekend login window; `None` means the weekday window governs
    pub weekend_hours: Option<TimeRange>,

    /// Lead times for low-time notifications
    pub notify_before: Vec<Duration>,

    /// Whether to force-lock the session once time runs out
    pub lock_screen: bool,

    /// Whether enforcement applies to this user
    pub enabled: bool,
}

impl Default for UserPolicy {
    fn default() -> Self {
        Self {
            daily_limit: None,
            allowed_hours: None,
            weekend_hours: None,
            notify_before: Vec::new(),
            lock_screen: false,
            enabled: false,
        }
    }
}

impl UserPolicy {
    fn from_raw(raw: &RawUserPolicy, base: &UserPolicy, prefix: &str) -> ConfigResult<Self> {
        Ok(Self {
            daily_limit: match &raw.daily_limit {
                Some(s) => Some(
                    parse_duration(s).map_err(|e| field_error(prefix, "daily_limit", e))?,
                ),
                None => base.daily_limit,
            },
            allowed_hours: match &raw.allowed_hours {
                Some(s) => Some(
                    s.parse::<TimeRange>()
                        .map_err(|e| field_error(prefix, "allowed_hours", e))?,
                ),
                None => base.allowed_hours,
            },
            weekend_hours: match &raw.weekend_hours {
                Some(s) => Some(
                    s.parse::<TimeRange>()
                        .map_err(|e| field_error(prefix, "weekend_hours", e))?,
                ),
                None => base.weekend_hours,
            },
            notify_before: match &raw.notify_before {
                Some(entries) => entries
                    .iter()
                    .map(|s| {
                        parse_duration(s).map_err(|e| field_error(prefix, "notify_before", e))
                    })
                    .collect::<ConfigResult<Vec<_>>>()?,
                None => base.notify_before.clone(),
            },
            lock_screen: raw.lock_screen.unwrap_or(base.lock_screen),
            enabled: raw.enabled.unwrap_or(base.enabled),
        })
    }
}

fn field_error(prefix: &str, field: &str, e: impl std::fmt::Display) -> ConfigError {
    ConfigError::ValidationFailed {
        errors: vec![ValidationError {
            field: format!("{}.{}", prefix, field),
            message: e.to_string(),
        }],
    }
}

/// Resolved daemon settings
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub state_path: PathBuf,
    pub poll_interval: Duration,
    pub retention_days: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            state_path: default_state_path(),
            poll_interval: Duration::from_secs(60),
            retention_days: 30,
        }
    }
}

/// The complete resolved configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub default: UserPolicy,
    pub users: HashMap<String, UserPolicy>,
}

impl Config {
    pub fn from_raw(raw: RawConfig) -> ConfigResult<Self> {
        let built_in = UserPolicy::default();
        let default = UserPolicy::from_raw(&raw.default, &built_in, "default")?;

        let mut users = HashMap::new();
        for (name, raw_policy) in &raw.users {
            let prefix = format!("users.{}", name);
            users.insert(
                name.clone(),
                UserPolicy::from_raw(raw_policy, &default, &prefix)?,
            );
        }

        let defaults = DaemonConfig::default();
        let daemon = DaemonConfig {
            socket_path: raw.daemon.socket_path.unwrap_or(defaults.socket_path),
            state_path: raw.daemon.state_path.unwrap_or(defaults.state_path),
            poll_interval: match &raw.daemon.poll_interval {
                Some(s) => {
                    parse_duration(s).map_err(|e| field_error("daemon", "poll_interval", e))?
                }
                None => defaults.poll_interval,
            },
            retention_days: raw.daemon.retention_days.unwrap_or(defaults.retention_days),
        };

        Ok(Self {
            daemon,
            default,
            users,
        })
    }

    /// Resolve the policy that actually applies to a user: the explicit
    /// entry if present, else the default policy when it is enabled, else
    /// nothing (the user is outside enforcement entirely).
    pub fn effective(&self, username: &str) -> Option<&UserPolicy> {
        if let Some(policy) = self.users.get(username) {
            return Some(policy);
        }
        if self.default.enabled {
            return Some(&self.default);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml_str: &str) -> Config {
        crate::parse_config(toml_str).unwrap()
    }

    #[test]
    fn fill_down_from_default() {
        let cfg = config(r#"
            [default]
            daily_limit = "2h"
            allowed_hours = "09:00-17:00"
            weekend_hours = "10:00-14:00"
            notify_before = ["10m", "5m"]
            lock_screen = true
            enabled = false

            [users.alice]
            daily_limit = "3h"
            enabled = true
        "#);

        let alice = &cfg.users["alice"];
        assert_eq!(alice.daily_limit, Some(Duration::from_secs(3 * 3600)));
        // Inherited from [default]
        assert_eq!(
            alice.allowed_hours,
            Some("09:00-17:00".parse().unwrap())
        );
        assert_eq!(alice.notify_before.len(), 2);
        assert!(alice.lock_screen);
        assert!(alice.enabled);
    }

    #[test]
    fn effective_prefers_explicit_entry() {
        let cfg = config(r#"
            [default]
            enabled = true
            daily_limit = "1h"

            [users.alice]
            daily_limit = "3h"
        "#);

        let alice = cfg.effective("alice").unwrap();
        assert_eq!(alice.daily_limit, Some(Duration::from_secs(3 * 3600)));

        // Unknown user falls back to the enabled default
        let other = cfg.effective("mallory").unwrap();
        assert_eq!(other.daily_limit, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn effective_none_when_default_disabled() {
        let cfg = config(r#"
            [default]
            daily_limit = "1h"
            enabled = false
        "#);

        assert!(cfg.effective("anyone").is_none());
    }

    #[test]
    fn daemon_defaults_apply() {
        let cfg = config("");
        assert_eq!(cfg.daemon.poll_interval, Duration::from_secs(60));
        assert_eq!(cfg.daemon.retention_days, 30);
    }

    #[test]
    fn daemon_overrides_apply() {
        let cfg = config(r#"
            [daemon]
            poll_interval = "30s"
            state_path = "/tmp/warden-test/state.json"
        "#);
        assert_eq!(cfg.daemon.poll_interval, Duration::from_secs(30));
        assert_eq!(
            cfg.daemon.state_path,
            PathBuf::from("/tmp/warden-test/state.json")
        );
    }
}
