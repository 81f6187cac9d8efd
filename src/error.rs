use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// Use of Internal is never a guarantee that the error was not caused by
    /// the user - merely that the code cannot tell.
    Internal,

    /// The user provided invalid input or asked for something that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for callers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A secret or master password does not satisfy the strength policy.
    WeakSecret,
    /// No entry matched the requested service.
    NotFound,
    /// Persisted data or a hex string is malformed.
    Format,
    /// Ciphertext length or padding is invalid, or the revealed bytes are
    /// not text. Usually means corruption or a key mismatch.
    Decode,
    /// A field contains a delimiter that the line-oriented file formats
    /// cannot represent.
    InvalidField,
    /// Username and master password did not match any ledger record.
    AuthenticationFailed,
    /// A password or secret could not be obtained from the configured reader.
    SecretUnavailable,
    /// Unexpected state reached within vault logic.
    InternalInvariant,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct VaultError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag. Any code consuming errors MUST
    /// handle the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl VaultError {
    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Shorthand for the user-correctable strength policy violation.
    pub fn weak_secret(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorCategory::User, ErrorKind::WeakSecret, msg)
    }

    /// Shorthand for a lookup or delete miss.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorCategory::User, ErrorKind::NotFound, msg)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns true if the error is tagged with `kind`.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == Some(kind)
    }

    /// Wraps the current error with a higher-level message while preserving
    /// the original as source. Category and kind carry over.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, VaultError>;
