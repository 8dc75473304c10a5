//! Remote connection profile and its on-disk store.
//!
//! The profile lives in `ssh_config.txt` as flat `key=value` lines:
//!
//! ```text
//! hostname=venus.local
//! username=root
//! password=hunter2
//! remote_config_path=/data/etc/dbus-serialbattery/config.ini
//! ```
//!
//! The password is stored in clear text, readable by the owner only. This
//! keeps files written by older releases loadable.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::file::atomic_write_private;

const KEY_HOST: &str = "hostname";
const KEY_USERNAME: &str = "username";
const KEY_SECRET: &str = "password";
const KEY_REMOTE_PATH: &str = "remote_config_path";

/// Connection details for the device running the driver.
///
/// No field is validated here; operations check what they need.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionProfile {
    /// Hostname or address, optionally with `:port`.
    pub host: String,
    pub username: String,
    #[serde(skip)]
    pub secret: String,
    /// Path of the driver config on the remote device.
    pub remote_path: String,
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("secret", &"***")
            .field("remote_path", &self.remote_path)
            .finish()
    }
}

impl ConnectionProfile {
    /// Whether a host has been set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty()
    }

    /// Render in the persisted format, fixed key order.
    #[must_use]
    pub fn to_file_content(&self) -> String {
        format!(
            "{KEY_HOST}={}\n{KEY_USERNAME}={}\n{KEY_SECRET}={}\n{KEY_REMOTE_PATH}={}\n",
            self.host, self.username, self.secret, self.remote_path
        )
    }

    /// Parse the persisted format.
    ///
    /// Keys may appear in any order and unknown keys are ignored. Trailing
    /// blank lines are ignored; every line before them must split into
    /// exactly two parts on `=`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptProfile`] naming the first bad line.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut profile = Self::default();

        for (idx, line) in text.trim_end().lines().enumerate() {
            let parts: Vec<&str> = line.split('=').collect();
            let [key, value] = parts.as_slice() else {
                return Err(Error::CorruptProfile {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    message: format!("expected key=value, found {} '=' separators", parts.len() - 1),
                });
            };
            let value = value.trim_end().to_string();
            match key.trim() {
                KEY_HOST => profile.host = value,
                KEY_USERNAME => profile.username = value,
                KEY_SECRET => profile.secret = value,
                KEY_REMOTE_PATH => profile.remote_path = value,
                other => debug!(key = other, "ignoring unknown profile key"),
            }
        }

        Ok(profile)
    }

    /// Reject values the persisted format cannot hold.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a field contains `=` or a
    /// line break; such a file could not be loaded back.
    pub fn validate_storable(&self) -> Result<()> {
        for (name, value) in [
            (KEY_HOST, &self.host),
            (KEY_USERNAME, &self.username),
            (KEY_SECRET, &self.secret),
            (KEY_REMOTE_PATH, &self.remote_path),
        ] {
            if value.contains(['=', '\n', '\r']) {
                return Err(Error::InvalidArgument(format!(
                    "{name} must not contain '=' or line breaks"
                )));
            }
        }
        Ok(())
    }
}

/// Reads and writes the profile at a fixed location.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store backed by the file at `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Location of the profile file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored profile.
    ///
    /// A missing file is the first-run case and yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file exists but cannot be read, and
    /// [`Error::CorruptProfile`] if it is malformed.
    pub fn load(&self) -> Result<Option<ConnectionProfile>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored profile");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        ConnectionProfile::parse(&text, &self.path).map(Some)
    }

    /// Load the stored profile, or an empty one on first run.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn load_or_default(&self) -> Result<ConnectionProfile> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Overwrite the stored profile, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for values the format cannot hold
    /// and [`Error::Io`] if the file cannot be written.
    pub fn save(&self, profile: &ConnectionProfile) -> Result<()> {
        profile.validate_storable()?;
        atomic_write_private(&self.path, profile.to_file_content().as_bytes())?;
        info!(path = %self.path.display(), host = %profile.host, "saved connection profile");
        Ok(())
    }

    /// Delete the stored profile. Deleting a missing profile is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
