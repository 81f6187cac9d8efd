//! Where the vault keeps its files, and which key it uses

use std::path::PathBuf;

use crate::cipher::VaultKey;

/// Default name of the shared master-credential ledger.
pub const DEFAULT_LEDGER_FILE: &str = "user_credentials.csv";

/// Suffix of the per-user credential file: `<username>_secrets`.
pub const SECRETS_SUFFIX: &str = "_secrets";

/// Suffix appended to the ledger path for its compressed copy.
pub const COMPRESSED_SUFFIX: &str = ".gz";

#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub data_dir: PathBuf,
    pub ledger_file: String,
    pub key: VaultKey,
    /// Compress the ledger on close and restore it on open.
    pub compress_ledger: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            ledger_file: DEFAULT_LEDGER_FILE.to_string(),
            key: VaultKey::legacy(),
            compress_ledger: false,
        }
    }
}

impl VaultConfig {
    /// Defaults, rooted at `data_dir`.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(&self.ledger_file)
    }

    pub fn compressed_ledger_path(&self) -> PathBuf {
        let mut name = self.ledger_file.clone();
        name.push_str(COMPRESSED_SUFFIX);
        self.data_dir.join(name)
    }

    pub fn secrets_path(&self, username: &str) -> PathBuf {
        self.data_dir.join(format!("{}{}", username, SECRETS_SUFFIX))
    }
}
