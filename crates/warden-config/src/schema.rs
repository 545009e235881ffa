//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Global daemon settings
    #[serde(default)]
    pub daemon: RawDaemonConfig,

    /// Policy applied to users without an explicit entry (when enabled)
    #[serde(default)]
    pub default: RawUserPolicy,

    /// Per-user policies
    #[serde(default)]
    pub users: HashMap<String, RawUserPolicy>,
}

fn default_config_version() -> u32 {
    crate::CURRENT_CONFIG_VERSION
}

/// Daemon-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDaemonConfig {
    /// Control socket path (default: /run/wardend/wardend.sock)
    pub socket_path: Option<PathBuf>,

    /// State file path (default: /var/lib/wardend/state.json)
    pub state_path: Option<PathBuf>,

    /// Enforcement poll interval as a duration string (default: "1m")
    pub poll_interval: Option<String>,

    /// Days of ended-session history to keep (default: 30)
    pub retention_days: Option<u32>,
}

/// Raw per-user policy. All fields are optional; unset fields fill down
/// from `[default]`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawUserPolicy {
    /// Daily engaged-time budget, e.g. "2h" ("0s" or absent = unlimited)
    pub daily_limit: Option<String>,

    /// Weekday login window, e.g. "09:00-17:00" (absent = unrestricted)
    pub allowed_hours: Option<String>,

    /// Weekend login window (absent = the weekday window also applies)
    pub weekend_hours: Option<String>,

    /// Lead times for low-time notifications, e.g. ["10m", "5m"]
    pub notify_before: Option<Vec<String>>,

    /// Whether to force-lock the session once time runs out
    pub lock_screen: Option<bool>,

    /// Whether enforcement applies to this user at all
    pub enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            [daemon]
            poll_interval = "30s"
            retention_days = 14

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

            [users.bob]
            enabled = true
        "#;

        let raw: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(raw.config_version, crate::CURRENT_CONFIG_VERSION);
        assert_eq!(raw.users.len(), 2);
        assert_eq!(raw.users["alice"].daily_limit.as_deref(), Some("3h"));
        assert_eq!(raw.default.notify_before.as_ref().unwrap().len(), 2);
        assert_eq!(raw.daemon.retention_days, Some(14));
    }

    #[test]
    fn empty_config_parses() {
        let raw: RawConfig = toml::from_str("").unwrap();
        assert!(raw.users.is_empty());
        assert!(raw.default.enabled.is_none());
    }
}
