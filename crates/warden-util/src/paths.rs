//! Default paths for wardend components
//!
//! wardend normally runs as a system service, so the defaults are the
//! system locations; each can be overridden by an environment variable so
//! a non-root development instance can point everything at a scratch
//! directory.

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const WARDEND_SOCKET_ENV: &str = "WARDEND_SOCKET";

/// Environment variable for overriding the state file path
pub const WARDEND_STATE_ENV: &str = "WARDEND_STATE";

/// Environment variable for overriding the config file path
pub const WARDEND_CONFIG_ENV: &str = "WARDEND_CONFIG";

/// Default control socket path.
///
/// Order of precedence:
/// 1. `$WARDEND_SOCKET`
/// 2. `/run/wardend/wardend.sock`
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(WARDEND_SOCKET_ENV) {
        return PathBuf::from(path);
    }
    PathBuf::from("/run/wardend/wardend.sock")
}

/// Default state file path.
///
/// Order of precedence:
/// 1. `$WARDEND_STATE`
/// 2. `/var/lib/wardend/state.json`
pub fn default_state_path() -> PathBuf {
    if let Ok(path) = std::env::var(WARDEND_STATE_ENV) {
        return PathBuf::from(path);
    }
    PathBuf::from("/var/lib/wardend/state.json")
}

/// Default config file path.
///
/// Order of precedence:
/// 1. `$WARDEND_CONFIG`
/// 2. `/etc/wardend/config.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(WARDEND_CONFIG_ENV) {
        return PathBuf::from(path);
    }
    PathBuf::from("/etc/wardend/config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_name_the_daemon() {
        // Checked without env overrides applied; the fallback constants
        // must always point at wardend-owned locations.
        assert!(
            PathBuf::from("/run/wardend/wardend.sock")
                .to_string_lossy()
                .contains("wardend")
        );
        assert!(default_state_path().to_string_lossy().ends_with(".json"));
        assert!(default_config_path().to_string_lossy().ends_with(".toml"));
    }
}
