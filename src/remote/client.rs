//! SSH client connection and authentication logic.
//!
//! ## Connection Lifecycle
//!
//! 1. **Client Configuration**: Build the russh client configuration with
//!    keepalive and compression settings. There is no inactivity timeout:
//!    a command may stay silent for as long as it runs.
//!
//! 2. **Connection Establishment**: Establish the TCP connection and run the
//!    SSH handshake. The server host key is checked by [`SessionHandler`]
//!    according to the configured [`HostKeyPolicy`](crate::HostKeyPolicy).
//!
//! 3. **Authentication**: Authenticate with the method the
//!    [`Credential`](crate::Credential) names: password or private key file.
//!
//! Steps 2 and 3 together are bounded by the connect timeout when one is
//! configured. Failures at any step are reported once as
//! [`Error::Connect`]; nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use russh::client;
use tracing::{debug, info};

use crate::remote::auth::{authenticate, method_name};
use crate::remote::config::ConnectionConfig;
use crate::remote::error::{Error, Result};
use crate::remote::session::SessionHandler;

/// Keepalive interval for established sessions
pub(crate) const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Unanswered keepalives before the session is dropped
pub(crate) const KEEPALIVE_MAX: usize = 3;

/// Build russh client configuration.
///
/// Creates an `Arc<client::Config>` with:
/// - No inactivity timeout
/// - Keepalive interval of 30 seconds with max 3 keepalives
/// - Compression preference based on `compress` (ZLIB if enabled, NONE if disabled)
pub(crate) fn build_client_config(compress: bool) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(KEEPALIVE_INTERVAL),
        keepalive_max: KEEPALIVE_MAX,
        preferred,
        ..Default::default()
    })
}

/// Establish an SSH connection and authenticate.
pub(crate) async fn connect_and_authenticate(
    config: &ConnectionConfig,
) -> Result<client::Handle<SessionHandler>> {
    let host = config.host.as_str();
    let port = config.port;

    let established = async {
        let handler = SessionHandler::new(
            host,
            port,
            config.host_key_policy,
            config.known_hosts_path.clone(),
        );

        debug!("Connecting to {}@{}:{}", config.user, host, port);
        let mut handle = client::connect(build_client_config(config.compression), (host, port), handler)
            .await
            .map_err(|e| Error::connect(host, port, e.to_string()))?;

        debug!(
            "Authenticating {} with {}",
            config.user,
            method_name(&config.credential)
        );
        authenticate(&mut handle, &config.user, &config.credential)
            .await
            .map_err(|e| Error::connect(host, port, e))?;

        Ok::<_, Error>(handle)
    };

    let handle = match config.connect_timeout() {
        Some(timeout) => tokio::time::timeout(timeout, established)
            .await
            .map_err(|_| {
                Error::connect(host, port, format!("Connection timed out after {:?}", timeout))
            })??,
        None => established.await?,
    };

    info!("Connected to {}@{}:{}", config.user, host, port);
    Ok(handle)
}
