//! Master-credential ledger
//!
//! A shared, append-only text file with one `username,master_password`
//! record per line. Passwords are stored in clear text and commas are not
//! escaped: a comma inside a password truncates what can later be matched.
//! Re-registering a username appends another record; the first matching
//! record in file order is the one that authenticates.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::cipher;
use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::persist;

/// One parsed ledger line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterLedgerRecord {
    pub username: String,
    pub master_password: String,
}

impl MasterLedgerRecord {
    fn parse_line(line: &str) -> Self {
        let mut fields = line.split(',');
        Self {
            username: fields.next().unwrap_or_default().to_string(),
            master_password: fields.next().unwrap_or_default().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MasterLedger {
    path: PathBuf,
}

impl MasterLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a new registration.
    pub fn register(&self, username: &str, master_password: &str) -> Result<()> {
        if !cipher::is_strong(master_password) {
            return Err(VaultError::weak_secret(
                "master password is too weak; it must be longer than 8 characters",
            ));
        }
        if username.contains(['\n', '\r']) || master_password.contains(['\n', '\r']) {
            return Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidField,
                "username and master password must not contain line breaks",
            ));
        }

        let line = format!("{},{}\n", username, master_password);
        persist::append(&self.path, line.as_bytes())
            .map_err(|e| e.with_context("failed to record registration"))?;
        info!(username, ledger = %self.path.display(), "user registered");
        Ok(())
    }

    /// True if a record with exactly this username and password exists.
    ///
    /// A missing ledger simply means nobody is registered yet.
    pub fn authenticate(&self, username: &str, master_password: &str) -> Result<bool> {
        let matched = self
            .records()?
            .iter()
            .any(|r| r.username == username && r.master_password == master_password);
        debug!(username, matched, "ledger lookup");
        Ok(matched)
    }

    /// True if any record exists for `username`.
    pub fn contains_user(&self, username: &str) -> Result<bool> {
        Ok(self.records()?.iter().any(|r| r.username == username))
    }

    /// All records in file order; empty if the ledger does not exist.
    pub fn records(&self) -> Result<Vec<MasterLedgerRecord>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(persist::read_error(&self.path, e)),
        };
        Ok(text.lines().map(MasterLedgerRecord::parse_line).collect())
    }
}
