//! File helpers shared by the credential store and the master ledger
//!
//! Per-user files are replaced as a whole (tempfile + fsync + rename), the
//! ledger is only ever appended to. Both are created readable by the owner
//! only on Unix systems.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};

/// Read a whole text file.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| read_error(path, e))
}

/// Replace the contents of `path` with `contents`.
///
/// Either the old file or the new file exists afterwards, never a partial
/// one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| io_error(ErrorCategory::Internal, "failed to create tempfile", e))?;

    temp_file
        .write_all(contents)
        .map_err(|e| io_error(ErrorCategory::Internal, "failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| io_error(ErrorCategory::Internal, "failed to flush tempfile", e))?;
    temp_file.as_file().sync_all().map_err(|e| {
        io_error(
            ErrorCategory::Internal,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                io_error(
                    ErrorCategory::Internal,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }

    temp_file.persist(path).map_err(|e| {
        io_error(
            ErrorCategory::Internal,
            format!("failed to rename to target file {}", path.display()),
            e.error,
        )
    })?;
    Ok(())
}

/// Append `contents` to `path`, creating it if needed.
pub fn append(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.append(true).create(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| {
        io_error(
            ErrorCategory::User,
            format!("failed to open {}", path.display()),
            e,
        )
    })?;
    file.write_all(contents).map_err(|e| {
        io_error(
            ErrorCategory::Internal,
            format!("failed to append to {}", path.display()),
            e,
        )
    })?;
    file.flush().map_err(|e| {
        io_error(
            ErrorCategory::Internal,
            format!("failed to flush {}", path.display()),
            e,
        )
    })
}

pub(crate) fn read_error(path: &Path, err: io::Error) -> VaultError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    io_error(
        category,
        format!("failed to read from {}", path.display()),
        err,
    )
}

fn io_error(category: ErrorCategory, msg: impl Into<String>, err: io::Error) -> VaultError {
    VaultError::with_kind_and_source(category, ErrorKind::Io, msg, err)
}
