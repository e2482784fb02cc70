//! Recursive directory upload.
//!
//! `upload` mirrors a local file or directory into a remote base directory:
//!
//! 1. Change into the base directory. If that fails, create it with
//!    `mkdir -p` over the command channel and change into it again; a second
//!    failure is fatal.
//! 2. Walk the local tree in the order the file system lists it. Each
//!    directory is looked up on the remote side and only created when
//!    missing, so repeated uploads take the "already exists" path. A failed
//!    lookup counts as "missing".
//! 3. Each file is streamed under its own name. A file that cannot be read
//!    or written is logged, recorded in the [`UploadReport`] and skipped;
//!    its siblings are still uploaded.
//!
//! Symbolic links are followed; link cycles are not detected.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tracing::{debug, error, info};

use crate::remote::channel::{ExecChannel, RemoteFs, join_remote};
use crate::remote::error::{Error, Result};
use crate::remote::executor::execute_checked;
use crate::remote::types::{OutputMode, UploadFailure, UploadReport};

/// Shell command creating `path` and any missing parents.
pub(crate) fn mkdir_command(path: &str) -> String {
    format!("mkdir -p {}", shell_quote(path))
}

/// Single-quote `value` unless it only contains characters that are safe
/// unquoted.
fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '-'));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Upload `local` into `remote_base`.
///
/// `commands` is only used when `remote_base` has to be created.
pub async fn upload<F, C>(
    fs: &mut F,
    commands: &mut C,
    host: &str,
    local: &Path,
    remote_base: &str,
) -> Result<UploadReport>
where
    F: RemoteFs,
    C: ExecChannel + ?Sized,
{
    if let Err(e) = fs.change_dir(remote_base).await {
        debug!("Remote directory {} not usable ({}), creating it", remote_base, e);
        execute_checked(commands, host, &mkdir_command(remote_base), OutputMode::Discard).await?;
        info!("Created remote directory {}", remote_base);
        fs.change_dir(remote_base).await?;
    }

    // A missing source is an error, not a skipped file
    tokio::fs::metadata(local)
        .await
        .map_err(|e| Error::local_io(local, e))?;
    let local = match local.file_name() {
        Some(_) => local.to_path_buf(),
        None => tokio::fs::canonicalize(local)
            .await
            .map_err(|e| Error::local_io(local, e))?,
    };

    let mut report = UploadReport::default();
    let pwd = fs.working_dir().to_string();
    mirror(fs, local, pwd, &mut report).await?;

    info!(
        "Uploaded {} file(s), {} byte(s) to {}:{} ({} skipped)",
        report.files_copied,
        report.bytes_copied,
        host,
        remote_base,
        report.failures.len()
    );
    Ok(report)
}

fn entry_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(OsStr::to_string_lossy)
        .map(|name| name.into_owned())
        .ok_or_else(|| {
            Error::local_io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })
}

/// Mirror `local` into the remote directory `pwd`.
fn mirror<'a, F>(
    fs: &'a mut F,
    local: PathBuf,
    pwd: String,
    report: &'a mut UploadReport,
) -> BoxFuture<'a, Result<()>>
where
    F: RemoteFs,
{
    Box::pin(async move {
        let name = entry_name(&local)?;
        let is_dir = tokio::fs::metadata(&local)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);

        if is_dir {
            fs.change_dir(&pwd).await?;
            let next_pwd = join_remote(&pwd, &name);

            let exists = match fs.is_dir(&name).await {
                Ok(exists) => exists,
                Err(e) => {
                    debug!("Lookup of {} failed, treating as missing: {}", next_pwd, e);
                    false
                }
            };
            if exists {
                debug!("Remote directory already exists: {}", next_pwd);
            } else {
                fs.make_dir(&name).await?;
                report.dirs_created += 1;
                debug!("Created remote directory: {}", next_pwd);
            }
            fs.change_dir(&name).await?;

            let mut entries = tokio::fs::read_dir(&local)
                .await
                .map_err(|e| Error::local_io(&local, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::local_io(&local, e))?
            {
                mirror(&mut *fs, entry.path(), next_pwd.clone(), &mut *report).await?;
            }
        } else {
            fs.change_dir(&pwd).await?;
            debug!("Copying file {}", local.display());
            match copy_file(fs, &local, &name).await {
                Ok(bytes) => {
                    report.files_copied += 1;
                    report.bytes_copied += bytes;
                    info!("Copied {} to {}", local.display(), join_remote(&pwd, &name));
                }
                Err(e) => {
                    error!("Failed to copy {}: {}", local.display(), e);
                    report.failures.push(UploadFailure {
                        path: local.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    })
}

async fn copy_file<F: RemoteFs>(fs: &mut F, local: &Path, name: &str) -> Result<u64> {
    let mut file = tokio::fs::File::open(local)
        .await
        .map_err(|e| Error::local_io(local, e))?;
    fs.put(&mut file, name).await
}
