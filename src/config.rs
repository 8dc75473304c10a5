//! Path and setting resolution.
//!
//! All local state lives in one directory, `~/.dbus-serialbattery-gui/`
//! by default, shared with earlier desktop releases of the tool:
//! - `ssh_config.txt`: the persisted connection profile
//! - `config.ini`: local cache of the last pulled remote config

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name under the user's home.
pub const STATE_DIR_NAME: &str = ".dbus-serialbattery-gui";

/// Persisted connection profile file name.
pub const PROFILE_FILE_NAME: &str = "ssh_config.txt";

/// Local cache file for pulled configs.
pub const CACHE_FILE_NAME: &str = "config.ini";

/// Script that restarts the driver on the remote device.
pub const DEFAULT_RESTART_COMMAND: &str = "/data/etc/dbus-serialbattery/restart-driver.sh";

/// Connection timeout when none is given.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Get the default state directory (`~/.dbus-serialbattery-gui`).
#[must_use]
pub fn default_state_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(STATE_DIR_NAME))
}

/// Resolve the state directory.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `SBC_STATE_DIR` environment variable
/// 3. `~/.dbus-serialbattery-gui`
#[must_use]
pub fn resolve_state_dir(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(dir) = std::env::var("SBC_STATE_DIR") {
        if !dir.trim().is_empty() {
            return Some(PathBuf::from(dir));
        }
    }

    default_state_dir()
}

/// Settings shared by every remote operation.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the profile and the pull cache.
    pub state_dir: PathBuf,
    /// Remote command run by `apply`.
    pub restart_command: String,
    /// Limit for establishing and authenticating a connection.
    pub connect_timeout: Duration,
}

impl Settings {
    /// Settings rooted at `state_dir` with defaults for everything else.
    #[must_use]
    pub fn new(state_dir: PathBuf) -> Self {
        Self {
            state_dir,
            restart_command: DEFAULT_RESTART_COMMAND.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Location of the persisted connection profile.
    #[must_use]
    pub fn profile_path(&self) -> PathBuf {
        self.state_dir.join(PROFILE_FILE_NAME)
    }

    /// Location pulled configs are cached at.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.state_dir.join(CACHE_FILE_NAME)
    }
}

/// Split `host` or `host:port` into its parts.
///
/// Bracketed IPv6 literals (`[::1]:2222`) are supported; a bare IPv6
/// address without brackets is taken as a host with the default port.
#[must_use]
pub fn split_host_port(host: &str) -> (String, u16) {
    let host = host.trim();

    if let Some(rest) = host.strip_prefix('[') {
        if let Some((addr, tail)) = rest.split_once(']') {
            let port = tail
                .strip_prefix(':')
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SSH_PORT);
            return (addr.to_string(), port);
        }
    }

    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') => match port.parse() {
            Ok(port) => (name.to_string(), port),
            Err(_) => (host.to_string(), DEFAULT_SSH_PORT),
        },
        _ => (host.to_string(), DEFAULT_SSH_PORT),
    }
}
