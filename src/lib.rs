#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Remote command execution and recursive file upload over SSH.
//!
//! [`RemoteShell`] is the entry point: it owns a [`ConnectionConfig`] and,
//! for every call, opens a fresh session with the channels the call needs,
//! runs the command or upload, and closes everything again.
//!
//! ```ignore
//! use remote_shell::{ConnectionConfig, Credential, RemoteShell};
//!
//! let config = ConnectionConfig::new("10.0.0.5", "deploy", Credential::key_file("/home/me/.ssh/id_ed25519"));
//! let shell = RemoteShell::new(config);
//!
//! shell.copy("/tmp/app", "/opt/deploy").await?;
//! shell.exec("systemctl restart app").await?;
//! let uptime = shell.exec_with_output("uptime").await?;
//! ```

pub mod remote;

pub use remote::{
    ChannelKind, ConnectFailure, ConnectionConfig, Connector, Credential, Error, ExecChannel,
    ExecEvent, ExecResult, HostKeyPolicy, OutputMode, RemoteFs, RemoteSession, RemoteShell,
    Result, SshConnector, UploadFailure, UploadReport,
};
