//! Credential authentication over an established transport.
//!
//! A [`Credential`] names exactly one method, so there is one attempt and no
//! fallback chain. A rejection reports what the server would have accepted
//! instead, which is usually the quickest hint at a misconfigured account.

use std::path::Path;
use std::sync::Arc;

use russh::client::{self, AuthResult};
use russh::keys::{self, PrivateKeyWithHashAlg};
use tracing::debug;

use crate::remote::config::Credential;
use crate::remote::session::SessionHandler;

/// Method name of a credential, as it appears in log and error messages.
pub(crate) fn method_name(credential: &Credential) -> &'static str {
    match credential {
        Credential::Password(_) => "password",
        Credential::KeyFile(_) => "publickey",
    }
}

/// Authenticate `user` with `credential`.
///
/// The error is a human-readable message; the caller turns it into a
/// connect error so it gets classified.
pub(crate) async fn authenticate(
    handle: &mut client::Handle<SessionHandler>,
    user: &str,
    credential: &Credential,
) -> Result<(), String> {
    let result = match credential {
        Credential::Password(password) => handle
            .authenticate_password(user, password.as_str())
            .await
            .map_err(|e| format!("Password authentication failed: {}", e))?,
        Credential::KeyFile(path) => {
            let key = signing_key(handle, path).await?;
            handle
                .authenticate_publickey(user, key)
                .await
                .map_err(|e| format!("Key authentication failed: {}", e))?
        }
    };

    match rejection(method_name(credential), user, &result) {
        Some(message) => Err(message),
        None => Ok(()),
    }
}

/// Load a passphrase-less private key, choosing the RSA signature hash the
/// server advertises for RSA keys.
async fn signing_key(
    handle: &client::Handle<SessionHandler>,
    path: &Path,
) -> Result<PrivateKeyWithHashAlg, String> {
    let key = keys::load_secret_key(path, None)
        .map_err(|e| format!("Failed to load private key from {}: {}", path.display(), e))?;

    let hash_alg = if key.algorithm().is_rsa() {
        handle
            .best_supported_rsa_hash()
            .await
            .map_err(|e| format!("Key authentication failed: {}", e))?
            .flatten()
    } else {
        None
    };
    debug!("Signing with {} (hash {:?})", key.algorithm(), hash_alg);

    Ok(PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
}

/// Describe a rejected attempt, `None` on success.
fn rejection(method: &str, user: &str, result: &AuthResult) -> Option<String> {
    let AuthResult::Failure {
        remaining_methods,
        partial_success,
    } = result
    else {
        return None;
    };

    let mut message = format!(
        "Authentication failed: {} credential rejected for user {}",
        method, user
    );
    if *partial_success {
        message.push_str(", further authentication required");
    }
    let offered: Vec<&'static str> = remaining_methods.iter().map(<&'static str>::from).collect();
    if !offered.is_empty() {
        message.push_str(&format!(" (server accepts: {})", offered.join(", ")));
    }
    Some(message)
}
