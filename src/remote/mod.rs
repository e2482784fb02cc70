//! SSH remote shell module providing command execution and tree upload.
//!
//! This module is organized into the following submodules:
//!
//! - `config`: Connection configuration with environment variable support
//! - `error`: Error taxonomy and connect failure classification
//! - `auth`: Password and private key authentication
//! - `client`: russh client configuration and connection establishment
//! - `session`: Host key policy handler and session lifecycle
//! - `channel`: Command and transfer channels plus the seam traits
//! - `types`: Execution results, channel events and upload reports
//! - `executor`: Command execution protocol
//! - `uploader`: Recursive directory upload
//! - `shell`: The operation-level facade

pub(crate) mod auth;
pub mod channel;
pub(crate) mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod session;
pub mod shell;
pub mod types;
pub mod uploader;

#[cfg(test)]
pub(crate) mod test_server;

pub use channel::{CommandChannel, ExecChannel, RemoteFs, TransferChannel};
pub use config::{ConnectionConfig, Credential, HostKeyPolicy};
pub use error::{ChannelKind, ConnectFailure, Error, Result};
pub use session::{Connector, RemoteSession, Session, SshConnector};
pub use shell::RemoteShell;
pub use types::{ExecEvent, ExecResult, OutputMode, UploadFailure, UploadReport};
