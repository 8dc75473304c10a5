//! Remote synchronization: pull, push, and apply.
//!
//! The engine is stateless. Each operation takes the active
//! [`ConnectionProfile`] and, where relevant, the [`EditSession`] it acts on:
//!
//! - **Pull**: remote file → local cache → fresh session (unsaved local edits
//!   are discarded)
//! - **Push**: saved local file → remote path (blocked while edits are unsaved)
//! - **Apply**: run the driver restart command on the device
//!
//! # Session discipline
//!
//! Every operation opens exactly one [`RemoteSession`] and closes it before
//! returning, on success and on error. Nothing is retried.
//!
//! # Confirmation
//!
//! Push and apply are destructive for the device, so they take a gate
//! closure. It is called after all local pre-flight checks pass and before
//! any network activity; returning `false` aborts with [`Error::Cancelled`].

pub mod ssh;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::file::temp_path_for;
use crate::profile::ConnectionProfile;
use crate::session::EditSession;

pub use ssh::SshTransport;

/// An open, authenticated connection to the device.
pub trait RemoteSession {
    /// Download `remote_path` into `local_path`, overwriting it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transfer`] on any transport failure.
    fn get_file(&mut self, remote_path: &str, local_path: &Path) -> Result<()>;

    /// Upload `local_path` to `remote_path`, overwriting it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transfer`] on any transport failure.
    fn put_file(&mut self, local_path: &Path, remote_path: &str) -> Result<()>;

    /// Dispatch a command. Its output and exit status are not inspected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transfer`] if the command could not be dispatched.
    fn exec_command(&mut self, command: &str) -> Result<()>;

    /// Close the connection. Close failures are logged, not reported.
    fn close(&mut self);
}

/// Opens [`RemoteSession`]s.
pub trait RemoteTransport {
    type Session: RemoteSession;

    /// Connect and authenticate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the host cannot be reached and
    /// [`Error::Auth`] if the credentials are rejected.
    fn connect(&self, host: &str, username: &str, secret: &str) -> Result<Self::Session>;
}

/// Outcome of a successful pull.
#[derive(Debug, Clone, Serialize)]
pub struct PullReport {
    pub remote_path: String,
    pub local_path: PathBuf,
    pub fields: usize,
    /// Whether unsaved local edits were thrown away.
    pub discarded_edits: bool,
}

/// Outcome of a successful push.
#[derive(Debug, Clone, Serialize)]
pub struct PushReport {
    pub local_path: PathBuf,
    pub remote_path: String,
    pub bytes: u64,
}

/// Outcome of a successful apply.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub host: String,
    pub command: String,
}

/// Orchestrates remote operations over a transport.
pub struct RemoteSyncEngine<T: RemoteTransport> {
    transport: T,
    settings: Settings,
}

/// Fail with `NotConfigured` unless the profile names a host.
fn require_host(profile: &ConnectionProfile) -> Result<()> {
    if profile.is_configured() {
        Ok(())
    } else {
        Err(Error::NotConfigured)
    }
}

/// Fail with `NotConfigured` unless the profile names a host and remote path.
fn require_remote_path(profile: &ConnectionProfile) -> Result<&str> {
    require_host(profile)?;
    let remote_path = profile.remote_path.trim();
    if remote_path.is_empty() {
        return Err(Error::NotConfigured);
    }
    Ok(remote_path)
}

impl<T: RemoteTransport> RemoteSyncEngine<T> {
    /// Create an engine over `transport`.
    pub fn new(transport: T, settings: Settings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// Settings this engine runs with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Connect, run `op`, and close the session whatever `op` returned.
    fn with_session<R>(
        &self,
        profile: &ConnectionProfile,
        op: impl FnOnce(&mut T::Session) -> Result<R>,
    ) -> Result<R> {
        let mut session =
            self.transport
                .connect(&profile.host, &profile.username, &profile.secret)?;
        let result = op(&mut session);
        session.close();
        result
    }

    /// Download the remote config into the local cache and load it.
    ///
    /// The download goes to a temporary sibling of the cache file and is only
    /// renamed into place once complete. The session is replaced only after
    /// the new file loads, so any failure leaves it exactly as it was. On
    /// success, unsaved edits in `session` are discarded without warning.
    ///
    /// # Errors
    ///
    /// [`Error::NotConfigured`], transport errors, or load errors for the
    /// downloaded file.
    pub fn pull(
        &self,
        profile: &ConnectionProfile,
        session: &mut EditSession,
    ) -> Result<PullReport> {
        let remote_path = require_remote_path(profile)?;
        let cache_path = self.settings.cache_path();
        let partial_path = temp_path_for(&cache_path);
        fs::create_dir_all(&self.settings.state_dir)?;

        info!(host = %profile.host, remote_path, "pulling remote config");
        let downloaded =
            self.with_session(profile, |remote| remote.get_file(remote_path, &partial_path));
        if let Err(e) = downloaded {
            let _ = fs::remove_file(&partial_path);
            return Err(e);
        }
        fs::rename(&partial_path, &cache_path)?;

        let mut fresh = EditSession::new();
        fresh.load(&cache_path)?;
        let discarded_edits = session.is_dirty();
        if discarded_edits {
            warn!("pull replaced a session with unsaved edits");
        }
        *session = fresh;

        let fields = session.document().map_or(0, crate::document::ConfigDocument::len);
        info!(local_path = %cache_path.display(), fields, "pull complete");
        Ok(PullReport {
            remote_path: remote_path.to_string(),
            local_path: cache_path,
            fields,
            discarded_edits,
        })
    }

    /// Upload the session's saved file to the remote path.
    ///
    /// The remote file is overwritten in place; a transfer that fails midway
    /// can leave it truncated.
    ///
    /// # Errors
    ///
    /// [`Error::NotConfigured`], [`Error::MissingLocalFile`],
    /// [`Error::UnsavedChanges`], [`Error::Cancelled`] if `confirm` declines,
    /// or transport errors.
    pub fn push(
        &self,
        profile: &ConnectionProfile,
        session: &EditSession,
        confirm: impl FnOnce(&str) -> bool,
    ) -> Result<PushReport> {
        let remote_path = require_remote_path(profile)?;

        let local_path = match session.source_path() {
            Some(path) if path.is_file() => path.to_path_buf(),
            Some(path) => {
                return Err(Error::MissingLocalFile {
                    path: path.to_path_buf(),
                });
            }
            None => {
                return Err(Error::MissingLocalFile {
                    path: PathBuf::new(),
                });
            }
        };

        if session.is_dirty() {
            return Err(Error::UnsavedChanges);
        }

        let prompt = format!(
            "This will overwrite {remote_path} on {} with {}. Continue?",
            profile.host,
            local_path.display()
        );
        if !confirm(&prompt) {
            return Err(Error::Cancelled("push not confirmed".to_string()));
        }

        let bytes = fs::metadata(&local_path)?.len();
        info!(host = %profile.host, remote_path, bytes, "pushing local config");
        self.with_session(profile, |remote| remote.put_file(&local_path, remote_path))?;
        info!(remote_path, "push complete");

        Ok(PushReport {
            local_path,
            remote_path: remote_path.to_string(),
            bytes,
        })
    }

    /// Restart the driver on the device.
    ///
    /// Success means the command was dispatched; whether the restart script
    /// itself succeeded is not checked.
    ///
    /// # Errors
    ///
    /// [`Error::NotConfigured`], [`Error::Cancelled`] if `confirm` declines,
    /// or transport errors.
    pub fn apply(
        &self,
        profile: &ConnectionProfile,
        confirm: impl FnOnce(&str) -> bool,
    ) -> Result<ApplyReport> {
        require_host(profile)?;

        let prompt = format!(
            "This will restart the dbus-serialbattery driver on {}. Continue?",
            profile.host
        );
        if !confirm(&prompt) {
            return Err(Error::Cancelled("apply not confirmed".to_string()));
        }

        let command = self.settings.restart_command.clone();
        info!(host = %profile.host, command, "applying config");
        self.with_session(profile, |remote| remote.exec_command(&command))?;

        Ok(ApplyReport {
            host: profile.host.clone(),
            command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Remote {
        files: HashMap<String, Vec<u8>>,
        calls: Vec<String>,
        opened: usize,
        closed: usize,
        fail_connect: bool,
        fail_transfer: bool,
    }

    #[derive(Clone, Default)]
    struct FakeTransport(Rc<RefCell<Remote>>);

    struct FakeSession(Rc<RefCell<Remote>>);

    impl RemoteTransport for FakeTransport {
        type Session = FakeSession;

        fn connect(&self, host: &str, _username: &str, secret: &str) -> Result<FakeSession> {
            let mut remote = self.0.borrow_mut();
            remote.calls.push(format!("connect {host}"));
            if remote.fail_connect {
                return Err(Error::Network {
                    host: host.to_string(),
                    message: "unreachable".into(),
                });
            }
            if secret == "wrong" {
                return Err(Error::Auth {
                    host: host.to_string(),
                    user: "root".into(),
                    message: "rejected".into(),
                });
            }
            remote.opened += 1;
            Ok(FakeSession(Rc::clone(&self.0)))
        }
    }

    impl RemoteSession for FakeSession {
        fn get_file(&mut self, remote_path: &str, local_path: &Path) -> Result<()> {
            let mut remote = self.0.borrow_mut();
            remote.calls.push(format!("get {remote_path}"));
            if remote.fail_transfer {
                fs::write(local_path, b"partial").unwrap();
                return Err(Error::Transfer("connection reset".into()));
            }
            let bytes = remote
                .files
                .get(remote_path)
                .cloned()
                .ok_or_else(|| Error::Transfer(format!("no such file: {remote_path}")))?;
            fs::write(local_path, bytes)?;
            Ok(())
        }

        fn put_file(&mut self, local_path: &Path, remote_path: &str) -> Result<()> {
            let mut remote = self.0.borrow_mut();
            remote.calls.push(format!("put {remote_path}"));
            if remote.fail_transfer {
                return Err(Error::Transfer("connection reset".into()));
            }
            let bytes = fs::read(local_path)?;
            remote.files.insert(remote_path.to_string(), bytes);
            Ok(())
        }

        fn exec_command(&mut self, command: &str) -> Result<()> {
            self.0.borrow_mut().calls.push(format!("exec {command}"));
            Ok(())
        }

        fn close(&mut self) {
            self.0.borrow_mut().closed += 1;
        }
    }

    const REMOTE_PATH: &str = "/data/etc/dbus-serialbattery/config.ini";

    struct Fixture {
        dir: TempDir,
        transport: FakeTransport,
        engine: RemoteSyncEngine<FakeTransport>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let transport = FakeTransport::default();
        transport
            .0
            .borrow_mut()
            .files
            .insert(REMOTE_PATH.into(), b";General\nfoo = 1\nbar = 2\n".to_vec());
        let settings = Settings::new(dir.path().join("state"));
        let engine = RemoteSyncEngine::new(transport.clone(), settings);
        Fixture {
            dir,
            transport,
            engine,
        }
    }

    fn profile() -> ConnectionProfile {
        ConnectionProfile {
            host: "venus.local".into(),
            username: "root".into(),
            secret: "pw".into(),
            remote_path: REMOTE_PATH.into(),
        }
    }

    fn local_session(dir: &TempDir, text: &str) -> EditSession {
        let path = dir.path().join("local.ini");
        fs::write(&path, text).unwrap();
        let mut session = EditSession::new();
        session.load(&path).unwrap();
        session
    }

    #[test]
    fn test_not_configured_before_any_network() {
        let fx = fixture();
        let empty = ConnectionProfile::default();
        let mut session = EditSession::new();

        assert!(matches!(fx.engine.pull(&empty, &mut session), Err(Error::NotConfigured)));
        assert!(matches!(
            fx.engine.push(&empty, &session, |_| true),
            Err(Error::NotConfigured)
        ));
        assert!(matches!(fx.engine.apply(&empty, |_| true), Err(Error::NotConfigured)));
        assert!(fx.transport.0.borrow().calls.is_empty());
    }

    #[test]
    fn test_pull_loads_cache_and_closes_session() {
        let fx = fixture();
        let mut session = EditSession::new();

        let report = fx.engine.pull(&profile(), &mut session).unwrap();

        assert_eq!(report.fields, 2);
        assert_eq!(report.local_path, fx.engine.settings().cache_path());
        assert_eq!(session.source_path(), Some(report.local_path.as_path()));
        assert_eq!(session.document().unwrap().get("foo"), Some("1"));
        assert!(!session.is_dirty());
        let remote = fx.transport.0.borrow();
        assert_eq!(remote.opened, 1);
        assert_eq!(remote.closed, 1);
    }

    #[test]
    fn test_pull_discards_unsaved_edits() {
        let fx = fixture();
        let mut session = local_session(&fx.dir, "foo = local\n");
        session.set_field("foo", "edited").unwrap();

        let report = fx.engine.pull(&profile(), &mut session).unwrap();

        assert!(report.discarded_edits);
        assert!(!session.is_dirty());
        assert_eq!(session.document().unwrap().get("foo"), Some("1"));
        // the local file the edits belonged to is untouched
        assert_eq!(
            fs::read_to_string(fx.dir.path().join("local.ini")).unwrap(),
            "foo = local\n"
        );
    }

    #[test]
    fn test_failed_pull_leaves_session_and_cache() {
        let fx = fixture();
        let cache = fx.engine.settings().cache_path();
        fs::create_dir_all(cache.parent().unwrap()).unwrap();
        fs::write(&cache, "cached = yes\n").unwrap();

        let mut session = local_session(&fx.dir, "foo = local\n");
        session.set_field("foo", "edited").unwrap();
        fx.transport.0.borrow_mut().fail_transfer = true;

        let err = fx.engine.pull(&profile(), &mut session).unwrap_err();

        assert!(matches!(err, Error::Transfer(_)));
        assert_eq!(session.document().unwrap().get("foo"), Some("edited"));
        assert!(session.is_dirty());
        assert_eq!(fs::read_to_string(&cache).unwrap(), "cached = yes\n");
        assert!(!temp_path_for(&cache).exists());
        assert_eq!(fx.transport.0.borrow().closed, 1);
    }

    #[test]
    fn test_push_blocked_by_unsaved_edits() {
        let fx = fixture();
        let mut session = local_session(&fx.dir, "foo = 1\n");
        session.set_field("foo", "2").unwrap();

        let mut asked = false;
        let err = fx
            .engine
            .push(&profile(), &session, |_| {
                asked = true;
                true
            })
            .unwrap_err();

        assert!(matches!(err, Error::UnsavedChanges));
        assert!(!asked);
        assert!(fx.transport.0.borrow().calls.is_empty());
    }

    #[test]
    fn test_push_requires_local_file() {
        let fx = fixture();
        let session = EditSession::new();
        assert!(matches!(
            fx.engine.push(&profile(), &session, |_| true),
            Err(Error::MissingLocalFile { .. })
        ));

        let session = local_session(&fx.dir, "foo = 1\n");
        fs::remove_file(fx.dir.path().join("local.ini")).unwrap();
        assert!(matches!(
            fx.engine.push(&profile(), &session, |_| true),
            Err(Error::MissingLocalFile { .. })
        ));
        assert!(fx.transport.0.borrow().calls.is_empty());
    }

    #[test]
    fn test_push_declined_does_not_connect() {
        let fx = fixture();
        let session = local_session(&fx.dir, "foo = 1\n");

        let err = fx.engine.push(&profile(), &session, |_| false).unwrap_err();

        assert!(matches!(err, Error::Cancelled(_)));
        assert!(fx.transport.0.borrow().calls.is_empty());
    }

    #[test]
    fn test_push_uploads_saved_file() {
        let fx = fixture();
        let mut session = local_session(&fx.dir, ";General\nfoo = 1\n");
        session.set_field("foo", "7").unwrap();
        session.save().unwrap();

        let mut prompt = String::new();
        let report = fx
            .engine
            .push(&profile(), &session, |p| {
                prompt = p.to_string();
                true
            })
            .unwrap();

        assert!(prompt.contains(REMOTE_PATH));
        assert_eq!(report.bytes, 17);
        let remote = fx.transport.0.borrow();
        assert_eq!(remote.files[REMOTE_PATH], b";General\nfoo = 7\n");
        assert_eq!(remote.closed, 1);
    }

    #[test]
    fn test_push_transfer_error_still_closes() {
        let fx = fixture();
        let session = local_session(&fx.dir, "foo = 1\n");
        fx.transport.0.borrow_mut().fail_transfer = true;

        let err = fx.engine.push(&profile(), &session, |_| true).unwrap_err();

        assert!(matches!(err, Error::Transfer(_)));
        assert_eq!(fx.transport.0.borrow().closed, 1);
    }

    #[test]
    fn test_apply_runs_restart_command() {
        let fx = fixture();
        let report = fx.engine.apply(&profile(), |_| true).unwrap();

        assert_eq!(report.command, crate::config::DEFAULT_RESTART_COMMAND);
        let remote = fx.transport.0.borrow();
        assert_eq!(
            remote.calls,
            vec![
                "connect venus.local".to_string(),
                format!("exec {}", crate::config::DEFAULT_RESTART_COMMAND),
            ]
        );
        assert_eq!(remote.closed, 1);
    }

    #[test]
    fn test_apply_declined() {
        let fx = fixture();
        assert!(matches!(
            fx.engine.apply(&profile(), |_| false),
            Err(Error::Cancelled(_))
        ));
        assert!(fx.transport.0.borrow().calls.is_empty());
    }

    #[test]
    fn test_connect_failures_surface() {
        let fx = fixture();
        let mut bad = profile();
        bad.secret = "wrong".into();
        assert!(matches!(fx.engine.apply(&bad, |_| true), Err(Error::Auth { .. })));

        fx.transport.0.borrow_mut().fail_connect = true;
        let mut session = EditSession::new();
        assert!(matches!(
            fx.engine.pull(&profile(), &mut session),
            Err(Error::Network { .. })
        ));
        assert_eq!(session.state(), crate::session::SessionState::Empty);
    }
}
