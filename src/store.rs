//! Per-user credential store
//!
//! Entries are kept in insertion order and mirrored to a per-user text file
//! with one record per line:
//!
//! ```text
//! <service> <username>:<protected secret as hex>
//! ```
//!
//! Every mutation rewrites the whole file. Service names are not unique;
//! lookups return the first match.

use std::path::{Path, PathBuf};

use tracing::debug;
use zeroize::Zeroizing;

use crate::cipher::SecretProtector;
use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::hexcodec;
use crate::persist;

/// One stored record. The secret only exists here in protected, hex-encoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    pub service: String,
    pub username: String,
    pub protected_secret: String,
}

impl CredentialEntry {
    /// The `username:protected_secret` value stored after the service name.
    pub fn credential_field(&self) -> String {
        format!("{}:{}", self.username, self.protected_secret)
    }

    fn to_line(&self) -> String {
        format!("{} {}\n", self.service, self.credential_field())
    }

    /// Lines `add` could never have written, such as one with an empty
    /// service name, do not parse.
    fn parse_line(line: &str) -> Option<Self> {
        let (service, rest) = line.split_once(' ')?;
        if service.is_empty() {
            return None;
        }
        let (username, protected_secret) = rest.split_once(':')?;
        Some(Self {
            service: service.to_string(),
            username: username.to_string(),
            protected_secret: protected_secret.to_string(),
        })
    }
}

/// A record with its secret revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedCredential {
    pub service: String,
    pub username: String,
    pub secret: Zeroizing<String>,
}

/// The credentials of one authenticated user.
pub struct CredentialStore {
    entries: Vec<CredentialEntry>,
    path: PathBuf,
    protector: Box<dyn SecretProtector>,
}

impl CredentialStore {
    /// Create an empty store that persists mutations to `path`.
    ///
    /// Nothing is read or written until the first mutation.
    pub fn new(path: impl Into<PathBuf>, protector: Box<dyn SecretProtector>) -> Self {
        Self {
            entries: Vec::new(),
            path: path.into(),
            protector,
        }
    }

    /// Create a store populated from the file at `path`.
    pub fn open(path: impl Into<PathBuf>, protector: Box<dyn SecretProtector>) -> Result<Self> {
        let mut store = Self::new(path, protector);
        let path = store.path.clone();
        store.load_from_file(&path)?;
        Ok(store)
    }

    /// The file mutations are persisted to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[CredentialEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Protect `secret` and append a new entry, then persist the store.
    ///
    /// Existing entries for the same service are kept.
    pub fn add(&mut self, service: &str, username: &str, secret: &str) -> Result<()> {
        if !self.protector.validate(secret) {
            return Err(VaultError::weak_secret(
                "password is too weak; it must be longer than 8 characters",
            ));
        }
        check_service(service)?;
        check_username(username)?;

        let blob = self.protector.protect(secret);
        self.entries.push(CredentialEntry {
            service: service.to_string(),
            username: username.to_string(),
            protected_secret: hexcodec::to_hex(&blob),
        });

        if let Err(e) = self.persist() {
            self.entries.pop();
            return Err(e.with_context(format!("failed to save entry for service '{}'", service)));
        }
        debug!(service, entries = self.entries.len(), "credential added");
        Ok(())
    }

    /// Reveal every entry, in store order.
    ///
    /// Each call returns a fresh iterator; the store is not modified.
    pub fn list_decrypted(&self) -> impl Iterator<Item = Result<DecryptedCredential>> + '_ {
        self.entries.iter().map(|entry| self.decrypt_entry(entry))
    }

    /// The raw `username:protected_secret` field of the first entry for
    /// `service`. Matching is exact and case-sensitive.
    pub fn find(&self, service: &str) -> Option<String> {
        self.first(service).map(CredentialEntry::credential_field)
    }

    pub fn has(&self, service: &str) -> bool {
        self.first(service).is_some()
    }

    /// Reveal the first entry for `service`.
    pub fn reveal(&self, service: &str) -> Result<DecryptedCredential> {
        let entry = self
            .first(service)
            .ok_or_else(|| VaultError::not_found(format!("no entry for service '{}'", service)))?;
        self.decrypt_entry(entry)
    }

    /// Remove every entry for `service`, then persist the store.
    pub fn delete(&mut self, service: &str) -> Result<()> {
        let before = self.entries.clone();
        self.entries.retain(|entry| entry.service != service);
        let removed = before.len() - self.entries.len();
        if removed == 0 {
            return Err(VaultError::not_found(format!(
                "no entry for service '{}'",
                service
            )));
        }

        if let Err(e) = self.persist() {
            self.entries = before;
            return Err(e.with_context(format!("failed to save after deleting '{}'", service)));
        }
        debug!(service, removed, "credentials deleted");
        Ok(())
    }

    /// Replace the in-memory entries with the contents of `path`.
    ///
    /// Blank lines are ignored. Any malformed line, bad hex, or secret that
    /// cannot be revealed aborts the load and leaves the store empty.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        self.entries.clear();
        let text = persist::read_text(path)?;

        let mut loaded = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }
            let entry = CredentialEntry::parse_line(line).ok_or_else(|| {
                VaultError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::Format,
                    format!(
                        "{}:{}: expected '<service> <username>:<secret>'",
                        path.display(),
                        line_no
                    ),
                )
            })?;
            self.decrypt_entry(&entry).map_err(|e| {
                e.with_context(format!(
                    "{}:{}: unreadable secret for service '{}'",
                    path.display(),
                    line_no,
                    entry.service
                ))
            })?;
            loaded.push(entry);
        }

        self.entries = loaded;
        debug!(path = %path.display(), entries = self.entries.len(), "credential store loaded");
        Ok(())
    }

    /// Write every entry to `path`, replacing its previous contents.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents: String = self.entries.iter().map(CredentialEntry::to_line).collect();
        persist::write_atomic(path, contents.as_bytes())?;
        debug!(path = %path.display(), entries = self.entries.len(), "credential store saved");
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        self.save_to_file(&self.path)
    }

    fn first(&self, service: &str) -> Option<&CredentialEntry> {
        self.entries.iter().find(|entry| entry.service == service)
    }

    fn decrypt_entry(&self, entry: &CredentialEntry) -> Result<DecryptedCredential> {
        let blob = hexcodec::from_hex(&entry.protected_secret)?;
        let secret = self.protector.reveal(&blob)?;
        Ok(DecryptedCredential {
            service: entry.service.clone(),
            username: entry.username.clone(),
            secret,
        })
    }
}

fn check_service(service: &str) -> Result<()> {
    if service.is_empty() || service.chars().any(char::is_whitespace) {
        return Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidField,
            "service name must be non-empty and must not contain whitespace",
        ));
    }
    Ok(())
}

fn check_username(username: &str) -> Result<()> {
    if username.contains([':', '\n', '\r']) {
        return Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidField,
            "username must not contain ':' or line breaks",
        ));
    }
    Ok(())
}
