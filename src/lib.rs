//! credvault - a single-user local credential vault
//!
//! Master credentials live in a shared plain-text ledger; each user's
//! service credentials live in their own file with secrets encrypted under a
//! fixed-IV AES-256-CBC scheme, kept compatible with existing vault files.

#![forbid(unsafe_code)]

pub mod cipher;
pub mod codec;
pub mod config;
pub mod error;
pub mod generator;
pub mod hexcodec;
pub mod ledger;
pub mod persist;
pub mod prompt;
pub mod session;
pub mod store;

pub use config::VaultConfig;
pub use error::{ErrorCategory, ErrorKind, Result, VaultError};
pub use session::{Session, Vault};
pub use store::{CredentialEntry, CredentialStore, DecryptedCredential};
