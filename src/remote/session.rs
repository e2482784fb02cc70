//! SSH session management.
//!
//! # Architecture
//!
//! - `SessionHandler`: russh client handler enforcing the configured
//!   [`HostKeyPolicy`]. `Accept` behaves like `StrictHostKeyChecking=no`;
//!   `Strict` only accepts keys already listed in known_hosts.
//! - `Session`: one authenticated connection, exclusively owned by the
//!   operation that opened it. Channels derived from it are plain owned
//!   values and must be closed before the session.
//! - `Connector` / `RemoteSession`: the seam the facade talks through, so
//!   the facade can be driven without a live server.

use std::path::PathBuf;

use async_trait::async_trait;
use russh::keys::known_hosts::{check_known_hosts, check_known_hosts_path};
use russh::{Disconnect, client, keys};
use russh_sftp::client::SftpSession;
use tracing::{debug, info, warn};

use crate::remote::channel::{CommandChannel, ExecChannel, RemoteFs, TransferChannel};
use crate::remote::client::connect_and_authenticate;
use crate::remote::config::{ConnectionConfig, HostKeyPolicy};
use crate::remote::error::{ChannelKind, Error, Result};

/// Client handler for russh applying the host key policy.
pub struct SessionHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
    known_hosts_path: Option<PathBuf>,
}

impl SessionHandler {
    pub(crate) fn new(
        host: impl Into<String>,
        port: u16,
        policy: HostKeyPolicy,
        known_hosts_path: Option<PathBuf>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            policy,
            known_hosts_path,
        }
    }

    fn is_known(&self, server_public_key: &keys::PublicKey) -> bool {
        let checked = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match checked {
            Ok(known) => known,
            Err(e) => {
                warn!(
                    "Host key verification for {}:{} failed: {}",
                    self.host, self.port, e
                );
                false
            }
        }
    }
}

impl client::Handler for SessionHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        match self.policy {
            HostKeyPolicy::Accept => Ok(true),
            HostKeyPolicy::Strict => {
                let known = self.is_known(server_public_key);
                if !known {
                    warn!(
                        "Rejecting host key for {}:{}: not present in known_hosts",
                        self.host, self.port
                    );
                }
                Ok(known)
            }
        }
    }
}

/// Opens sessions for a [`ConnectionConfig`].
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: RemoteSession;

    /// Connect and authenticate. Fails with [`Error::Connect`].
    async fn connect(&self, config: &ConnectionConfig) -> Result<Self::Session>;
}

/// An authenticated session able to derive command and transfer channels.
#[async_trait]
pub trait RemoteSession: Send {
    type Command: ExecChannel;
    type Transfer: RemoteFs;

    /// Host this session is connected to.
    fn host(&self) -> &str;

    /// Open an `exec` channel. Fails with [`Error::Channel`].
    async fn open_command_channel(&mut self) -> Result<Self::Command>;

    /// Open an `sftp` subsystem channel. Fails with [`Error::Channel`].
    async fn open_transfer_channel(&mut self) -> Result<Self::Transfer>;

    /// Disconnect if connected. Idempotent and infallible.
    async fn close(&mut self);
}

/// The russh-backed [`Connector`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

#[async_trait]
impl Connector for SshConnector {
    type Session = Session;

    async fn connect(&self, config: &ConnectionConfig) -> Result<Session> {
        Session::connect(config).await
    }
}

/// An authenticated SSH connection to one host.
pub struct Session {
    host: String,
    port: u16,
    handle: Option<client::Handle<SessionHandler>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Session {
    /// Connect and authenticate. Not retried on failure.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let handle = connect_and_authenticate(config).await?;
        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            handle: Some(handle),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_closed())
    }

    fn connected_handle(&self, kind: ChannelKind) -> Result<&client::Handle<SessionHandler>> {
        match &self.handle {
            Some(handle) if !handle.is_closed() => Ok(handle),
            _ => Err(Error::channel(kind, "session is not connected")),
        }
    }
}

#[async_trait]
impl RemoteSession for Session {
    type Command = CommandChannel;
    type Transfer = TransferChannel;

    fn host(&self) -> &str {
        &self.host
    }

    async fn open_command_channel(&mut self) -> Result<CommandChannel> {
        let handle = self.connected_handle(ChannelKind::Command)?;
        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| Error::channel(ChannelKind::Command, e))?;

        debug!("Opened exec channel to {}", self.host);
        Ok(CommandChannel::new(channel))
    }

    async fn open_transfer_channel(&mut self) -> Result<TransferChannel> {
        let handle = self.connected_handle(ChannelKind::Transfer)?;
        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| Error::channel(ChannelKind::Transfer, e))?;

        // Requires `Subsystem sftp ...` in the server's sshd_config
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| Error::channel(ChannelKind::Transfer, e))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| Error::channel(ChannelKind::Transfer, e))?;

        debug!("Opened sftp channel to {}", self.host);
        TransferChannel::open(sftp).await
    }

    async fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.is_closed() {
            return;
        }

        if let Err(e) = handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            debug!("Disconnect from {}:{} failed: {}", self.host, self.port, e);
        }
        info!("Disconnected from {}:{}", self.host, self.port);
    }
}
