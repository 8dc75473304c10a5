//! SSH/SFTP transport built on russh.
//!
//! The rest of the crate is synchronous, so the transport owns a private
//! current-thread tokio runtime and blocks on it for every call. Each
//! [`SshSession`] is one TCP connection: files move over a fresh SFTP
//! subsystem channel, commands over a fresh exec channel.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64;
use russh::keys::{PublicKey, PublicKeyBase64};
use russh::{ChannelMsg, Disconnect, client};
use russh_sftp::client::SftpSession;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use super::{RemoteSession, RemoteTransport};
use crate::config::split_host_port;
use crate::error::{Error, Result};

/// How long to wait for a dispatched command before closing its channel.
const EXEC_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// SHA256 fingerprint in OpenSSH notation (`SHA256:<base64>`).
#[must_use]
pub fn fingerprint(key: &PublicKey) -> String {
    let digest = Sha256::digest(key.public_key_bytes());
    format!("SHA256:{}", BASE64.encode(digest))
}

/// Server callbacks. Host keys are accepted and logged.
struct HostKeyLogger {
    host: String,
    port: u16,
}

impl client::Handler for HostKeyLogger {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        info!(
            host = %self.host,
            port = self.port,
            fingerprint = %fingerprint(server_public_key),
            "accepting server host key"
        );
        Ok(true)
    }
}

/// Blocking SSH transport.
pub struct SshTransport {
    runtime: Arc<Runtime>,
    connect_timeout: Duration,
}

impl SshTransport {
    /// Create a transport with its own runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the runtime cannot be started.
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
            connect_timeout,
        })
    }
}

impl RemoteTransport for SshTransport {
    type Session = SshSession;

    fn connect(&self, host: &str, username: &str, secret: &str) -> Result<SshSession> {
        let (hostname, port) = split_host_port(host);
        let network = |message: String| Error::Network {
            host: host.to_string(),
            message,
        };

        let handle = self.runtime.block_on(async {
            let config = Arc::new(client::Config {
                inactivity_timeout: Some(Duration::from_secs(120)),
                ..Default::default()
            });
            let handler = HostKeyLogger {
                host: hostname.clone(),
                port,
            };

            info!(host = %hostname, port, "connecting");
            let mut handle = tokio::time::timeout(
                self.connect_timeout,
                client::connect(config, (hostname.as_str(), port), handler),
            )
            .await
            .map_err(|_| network("connection timed out".to_string()))?
            .map_err(|e| network(e.to_string()))?;

            let auth = tokio::time::timeout(
                self.connect_timeout,
                handle.authenticate_password(username.to_string(), secret.to_string()),
            )
            .await
            .map_err(|_| network("authentication timed out".to_string()))?
            .map_err(|e| network(e.to_string()))?;

            if !auth.success() {
                return Err(Error::Auth {
                    host: host.to_string(),
                    user: username.to_string(),
                    message: "password rejected by server".to_string(),
                });
            }

            debug!(host = %hostname, user = username, "authenticated");
            Ok(handle)
        })?;

        Ok(SshSession {
            runtime: Arc::clone(&self.runtime),
            handle: Some(handle),
        })
    }
}

/// One authenticated SSH connection.
pub struct SshSession {
    runtime: Arc<Runtime>,
    handle: Option<client::Handle<HostKeyLogger>>,
}

fn transfer(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Transfer(format!("{context}: {e}"))
}

async fn open_sftp(handle: &client::Handle<HostKeyLogger>) -> Result<SftpSession> {
    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| transfer("failed to open channel", e))?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| transfer("failed to request SFTP subsystem", e))?;
    SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| transfer("SFTP subsystem not available", e))
}

impl SshSession {
    fn handle(&self) -> Result<&client::Handle<HostKeyLogger>> {
        self.handle
            .as_ref()
            .ok_or_else(|| Error::Transfer("session already closed".to_string()))
    }
}

impl RemoteSession for SshSession {
    fn get_file(&mut self, remote_path: &str, local_path: &Path) -> Result<()> {
        let handle = self.handle()?;
        let bytes = self.runtime.block_on(async {
            let sftp = open_sftp(handle).await?;
            let mut file = sftp
                .open(remote_path)
                .await
                .map_err(|e| transfer(&format!("failed to open {remote_path}"), e))?;
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)
                .await
                .map_err(|e| transfer(&format!("failed to read {remote_path}"), e))?;
            Ok::<_, Error>(bytes)
        })?;

        std::fs::write(local_path, &bytes)?;
        debug!(remote_path, bytes = bytes.len(), "downloaded");
        Ok(())
    }

    fn put_file(&mut self, local_path: &Path, remote_path: &str) -> Result<()> {
        let content = std::fs::read(local_path)?;
        let handle = self.handle()?;
        self.runtime.block_on(async {
            let sftp = open_sftp(handle).await?;
            let mut file = sftp
                .create(remote_path)
                .await
                .map_err(|e| transfer(&format!("failed to create {remote_path}"), e))?;
            file.write_all(&content)
                .await
                .map_err(|e| transfer(&format!("failed to write {remote_path}"), e))?;
            file.flush()
                .await
                .map_err(|e| transfer(&format!("failed to flush {remote_path}"), e))?;
            file.shutdown()
                .await
                .map_err(|e| transfer(&format!("failed to close {remote_path}"), e))
        })?;

        debug!(remote_path, bytes = content.len(), "uploaded");
        Ok(())
    }

    fn exec_command(&mut self, command: &str) -> Result<()> {
        let handle = self.handle()?;
        self.runtime.block_on(async {
            let mut channel = handle
                .channel_open_session()
                .await
                .map_err(|e| transfer("failed to open channel", e))?;
            channel
                .exec(true, command)
                .await
                .map_err(|e| transfer("failed to dispatch command", e))?;

            // Output and exit status are drained and ignored; only an explicit
            // refusal of the exec request counts as failure.
            let drained = tokio::time::timeout(EXEC_DRAIN_TIMEOUT, async {
                loop {
                    match channel.wait().await {
                        Some(ChannelMsg::Failure) => {
                            return Err(Error::Transfer(format!(
                                "server refused to run {command}"
                            )));
                        }
                        Some(ChannelMsg::ExitStatus { exit_status }) => {
                            debug!(command, exit_status, "remote command exited");
                        }
                        Some(ChannelMsg::Eof | ChannelMsg::Close) | None => return Ok(()),
                        Some(_) => {}
                    }
                }
            })
            .await;

            match drained {
                Ok(result) => result,
                Err(_) => {
                    warn!(command, "remote command still running, detaching");
                    Ok(())
                }
            }
        })
    }

    fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            let closed = self
                .runtime
                .block_on(handle.disconnect(Disconnect::ByApplication, "", "en"));
            if let Err(e) = closed {
                warn!(error = %e, "failed to close SSH session cleanly");
            }
        }
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.close();
    }
}
