//! Command implementations.

pub mod completions;
pub mod edit;
pub mod profile;
pub mod remote;
pub mod shell;
pub mod version;

use std::io::{self, BufRead, IsTerminal, Write};

use crate::config::Settings;
use crate::error::Result;
use crate::profile::{ConnectionProfile, CredentialStore};
use crate::remote::{RemoteSyncEngine, SshTransport};

/// Everything a command needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    pub json: bool,
}

impl Context {
    /// Store for the connection profile under the state directory.
    #[must_use]
    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(self.settings.profile_path())
    }

    /// The stored profile, or an empty (unconfigured) one on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored profile exists but is unreadable.
    pub fn active_profile(&self) -> Result<ConnectionProfile> {
        self.credential_store().load_or_default()
    }

    /// Engine over the SSH transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport runtime cannot be started.
    pub fn engine(&self) -> Result<RemoteSyncEngine<SshTransport>> {
        let transport = SshTransport::new(self.settings.connect_timeout)?;
        Ok(RemoteSyncEngine::new(transport, self.settings.clone()))
    }
}

/// Ask a yes/no question on the terminal.
///
/// `assume_yes` answers without asking. Without a terminal on stdin the
/// answer is no, so scripts must opt in with `--yes`.
pub fn confirm(prompt: &str, assume_yes: bool) -> bool {
    if assume_yes {
        return true;
    }
    if !io::stdin().is_terminal() {
        return false;
    }
    ask_yes_no(&mut io::stdin().lock(), &mut io::stderr(), prompt).unwrap_or(false)
}

/// Print `prompt` with a `[y/N]` suffix and read one answer line.
///
/// # Errors
///
/// Returns an error if reading or writing fails.
pub fn ask_yes_no(input: &mut impl BufRead, output: &mut impl Write, prompt: &str) -> io::Result<bool> {
    write!(output, "{prompt} [y/N] ")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
