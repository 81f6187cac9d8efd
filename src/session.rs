//! Authenticated access to a user's credential store
//!
//! [`Vault`] is the unauthenticated state: it can only register or log in.
//! Both return a [`Session`], the only way to reach a [`CredentialStore`].
//! [`Session::close`] consumes the session, so nothing can be done with it
//! afterwards.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::cipher::LegacyCbcCipher;
use crate::codec::{GzipCodec, LedgerCodec};
use crate::config::VaultConfig;
use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::ledger::MasterLedger;
use crate::store::{CredentialStore, DecryptedCredential};

pub struct Vault {
    config: VaultConfig,
    ledger: MasterLedger,
    codec: Option<Rc<dyn LedgerCodec>>,
    /// Only a compressed ledger exists and it could not be restored.
    ledger_unrestored: bool,
}

impl Vault {
    /// Open the vault described by `config`, using gzip for the ledger when
    /// compression is enabled.
    pub fn open(config: VaultConfig) -> Self {
        let codec: Option<Rc<dyn LedgerCodec>> = if config.compress_ledger {
            Some(Rc::new(GzipCodec))
        } else {
            None
        };
        Self::with_codec(config, codec)
    }

    /// Open the vault with an explicit compression collaborator.
    pub fn with_codec(config: VaultConfig, codec: Option<Rc<dyn LedgerCodec>>) -> Self {
        let ledger = MasterLedger::new(config.ledger_path());
        let mut vault = Self {
            config,
            ledger,
            codec,
            ledger_unrestored: false,
        };
        vault.ledger_unrestored = !vault.restore_ledger();
        vault
    }

    pub fn ledger(&self) -> &MasterLedger {
        &self.ledger
    }

    /// Authenticate against the ledger and load the user's credentials.
    ///
    /// A user without a credential file starts with an empty store.
    pub fn login(&self, username: &str, master_password: &str) -> Result<Session> {
        check_username(username)?;
        self.check_ledger_restored()?;
        if !self.ledger.authenticate(username, master_password)? {
            return Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "invalid username or password",
            ));
        }

        let path = self.config.secrets_path(username);
        let store = if path.exists() {
            CredentialStore::open(&path, self.protector()).map_err(|e| {
                e.with_context(format!("failed to load credentials for '{}'", username))
            })?
        } else {
            warn!(username, path = %path.display(), "no credential file; starting empty");
            CredentialStore::new(&path, self.protector())
        };
        info!(username, entries = store.len(), "login successful");
        Ok(self.session(username, store))
    }

    /// Append a registration to the ledger and start with an empty store.
    ///
    /// The user's credential file is (re)created empty.
    pub fn register(&self, username: &str, master_password: &str) -> Result<Session> {
        check_username(username)?;
        self.check_ledger_restored()?;
        if self.ledger.contains_user(username)? {
            warn!(username, "username already registered; appending another record");
        }
        self.ledger.register(username, master_password)?;

        let store = CredentialStore::new(self.config.secrets_path(username), self.protector());
        store.save_to_file(store.path())?;
        Ok(self.session(username, store))
    }

    fn session(&self, username: &str, store: CredentialStore) -> Session {
        Session {
            username: username.to_string(),
            store,
            ledger_path: self.config.ledger_path(),
            compressed_path: self.config.compressed_ledger_path(),
            codec: self.codec.clone(),
        }
    }

    fn protector(&self) -> Box<LegacyCbcCipher> {
        Box::new(LegacyCbcCipher::new(self.config.key.clone()))
    }

    /// End use of the vault without a session, e.g. after a failed login.
    /// With compression enabled a restored ledger is compressed again.
    pub fn close(self) {
        if let Some(codec) = &self.codec {
            compress_ledger(
                codec.as_ref(),
                &self.config.ledger_path(),
                &self.config.compressed_ledger_path(),
            );
        }
    }

    /// Bring back the plain ledger from its compressed copy, if that is all
    /// there is. The copy is restored even with compression disabled, so
    /// the registrations it holds are never shadowed by a fresh ledger.
    ///
    /// Returns false if the compressed copy could not be restored.
    fn restore_ledger(&self) -> bool {
        let plain = self.config.ledger_path();
        let packed = self.config.compressed_ledger_path();
        if plain.exists() || !packed.exists() {
            return true;
        }
        let gzip = GzipCodec;
        let codec: &dyn LedgerCodec = match &self.codec {
            Some(codec) => codec.as_ref(),
            None => &gzip,
        };
        if codec.decompress(&packed, &plain) {
            debug!(ledger = %plain.display(), "ledger restored from compressed copy");
            true
        } else {
            warn!(ledger = %packed.display(), "could not decompress ledger");
            false
        }
    }

    fn check_ledger_restored(&self) -> Result<()> {
        if self.ledger_unrestored {
            return Err(VaultError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!(
                    "compressed ledger {} could not be restored",
                    self.config.compressed_ledger_path().display()
                ),
            ));
        }
        Ok(())
    }
}

/// An authenticated user's view of the vault.
pub struct Session {
    username: String,
    store: CredentialStore,
    ledger_path: PathBuf,
    compressed_path: PathBuf,
    codec: Option<Rc<dyn LedgerCodec>>,
}

impl Session {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn add(&mut self, service: &str, username: &str, secret: &str) -> Result<()> {
        self.store.add(service, username, secret)
    }

    pub fn delete(&mut self, service: &str) -> Result<()> {
        self.store.delete(service)
    }

    pub fn find(&self, service: &str) -> Option<String> {
        self.store.find(service)
    }

    pub fn has(&self, service: &str) -> bool {
        self.store.has(service)
    }

    pub fn reveal(&self, service: &str) -> Result<DecryptedCredential> {
        self.store.reveal(service)
    }

    pub fn list_decrypted(&self) -> impl Iterator<Item = Result<DecryptedCredential>> + '_ {
        self.store.list_decrypted()
    }

    /// End the session. With compression enabled the ledger is replaced by
    /// its compressed copy; a failure there is logged and otherwise ignored.
    pub fn close(self) {
        if let Some(codec) = &self.codec {
            compress_ledger(codec.as_ref(), &self.ledger_path, &self.compressed_path);
        }
        info!(username = %self.username, "session closed");
    }
}

fn compress_ledger(codec: &dyn LedgerCodec, plain: &Path, packed: &Path) {
    if !plain.exists() {
        return;
    }
    if !codec.compress(plain, packed) {
        warn!(ledger = %plain.display(), "ledger compression failed; keeping plain ledger");
        return;
    }
    if let Err(e) = std::fs::remove_file(plain) {
        warn!(ledger = %plain.display(), error = %e, "could not remove plain ledger after compression");
    }
}

fn check_username(username: &str) -> Result<()> {
    if username.is_empty() || username.contains([',', '/', '\\', '\n', '\r']) {
        return Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidField,
            "username must be non-empty and must not contain ',', '/', '\\' or line breaks",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::VaultKey;
    use std::cell::Cell;
    use std::fs;
    use tempfile::TempDir;

    fn vault(dir: &TempDir) -> Vault {
        Vault::open(VaultConfig::in_dir(dir.path()))
    }

    #[test]
    fn test_register_add_close_login() {
        let dir = TempDir::new().unwrap();

        let mut session = vault(&dir).register("alice", "realpassword1").unwrap();
        session.add("email", "alice@example.com", "password123").unwrap();
        session.close();

        let session = vault(&dir).login("alice", "realpassword1").unwrap();
        assert_eq!(session.username(), "alice");
        assert_eq!(session.reveal("email").unwrap().secret.as_str(), "password123");
        session.close();
    }

    #[test]
    fn test_register_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let session = vault(&dir).register("alice", "realpassword1").unwrap();
        assert!(session.store().is_empty());
        assert_eq!(fs::read_to_string(dir.path().join("alice_secrets")).unwrap(), "");
    }

    #[test]
    fn test_wrong_password_rejected() {
        let dir = TempDir::new().unwrap();
        let vault = vault(&dir);
        vault.register("alice", "realpassword1").unwrap().close();

        let err = vault
            .login("alice", "wrongpass")
            .err()
            .expect("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));

        // Still usable after a failed attempt.
        assert!(vault.login("alice", "realpassword1").is_ok());
    }

    #[test]
    fn test_unknown_user_rejected() {
        let dir = TempDir::new().unwrap();
        let err = vault(&dir)
            .login("nobody", "whatever123")
            .err()
            .expect("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_weak_master_password() {
        let dir = TempDir::new().unwrap();
        let err = vault(&dir)
            .register("alice", "short")
            .err()
            .expect("expected weak secret");
        assert_eq!(err.kind, Some(ErrorKind::WeakSecret));
        assert!(!dir.path().join("alice_secrets").exists());
    }

    #[test]
    fn test_invalid_username() {
        let dir = TempDir::new().unwrap();
        for username in ["", "../etc", "a,b", "x\\y"] {
            let err = vault(&dir)
                .register(username, "realpassword1")
                .err()
                .expect("expected invalid field");
            assert_eq!(err.kind, Some(ErrorKind::InvalidField));
        }
    }

    #[test]
    fn test_login_without_credential_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("user_credentials.csv"), "bob,bobspassword\n").unwrap();

        let session = vault(&dir).login("bob", "bobspassword").unwrap();
        assert!(session.store().is_empty());
    }

    #[test]
    fn test_login_with_corrupt_file_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("user_credentials.csv"), "bob,bobspassword\n").unwrap();
        fs::write(dir.path().join("bob_secrets"), "garbage\n").unwrap();

        let err = vault(&dir)
            .login("bob", "bobspassword")
            .err()
            .expect("expected format error");
        assert_eq!(err.kind, Some(ErrorKind::Format));
    }

    #[test]
    fn test_custom_key_is_used() {
        let dir = TempDir::new().unwrap();
        let mut config = VaultConfig::in_dir(dir.path());
        config.key = VaultKey::from_material("another installation key");

        let mut session = Vault::open(config.clone()).register("alice", "realpassword1").unwrap();
        session.add("email", "alice", "password123").unwrap();
        // Not the legacy-key ciphertext.
        assert_ne!(
            session.find("email").unwrap(),
            "alice:7664dcb4ba1d8d1034e1ab15bac5b00e"
        );
        session.close();

        let session = Vault::open(config).login("alice", "realpassword1").unwrap();
        assert_eq!(session.reveal("email").unwrap().secret.as_str(), "password123");
    }

    #[test]
    fn test_compressed_ledger_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut config = VaultConfig::in_dir(dir.path());
        config.compress_ledger = true;

        Vault::open(config.clone())
            .register("alice", "realpassword1")
            .unwrap()
            .close();
        assert!(!config.ledger_path().exists());
        assert!(config.compressed_ledger_path().exists());

        let session = Vault::open(config.clone()).login("alice", "realpassword1").unwrap();
        assert!(config.ledger_path().exists());
        session.close();
    }

    #[test]
    fn test_corrupt_compressed_ledger_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let mut config = VaultConfig::in_dir(dir.path());
        config.compress_ledger = true;
        fs::write(config.compressed_ledger_path(), b"not gzip").unwrap();

        let vault = Vault::open(config.clone());
        assert!(!config.ledger_path().exists());

        let err = vault
            .register("bob", "bobspassword")
            .err()
            .expect("expected unrestored ledger error");
        assert_eq!(err.kind, Some(ErrorKind::Io));
        let err = vault
            .login("alice", "realpassword1")
            .err()
            .expect("expected unrestored ledger error");
        assert_eq!(err.kind, Some(ErrorKind::Io));
        vault.close();

        assert!(!config.ledger_path().exists());
        assert_eq!(fs::read(config.compressed_ledger_path()).unwrap(), b"not gzip");
    }

    #[test]
    fn test_compressed_ledger_restored_with_compression_off() {
        let dir = TempDir::new().unwrap();
        let mut packed_config = VaultConfig::in_dir(dir.path());
        packed_config.compress_ledger = true;
        let plain_config = VaultConfig::in_dir(dir.path());

        Vault::open(packed_config.clone())
            .register("alice", "realpassword1")
            .unwrap()
            .close();
        assert!(!plain_config.ledger_path().exists());

        Vault::open(plain_config.clone())
            .register("bob", "bobspassword")
            .unwrap()
            .close();

        let vault = Vault::open(packed_config.clone());
        vault.login("bob", "bobspassword").unwrap().close();
        vault.close();

        let vault = Vault::open(packed_config);
        assert!(vault.login("alice", "realpassword1").is_ok());
        assert!(vault.login("bob", "bobspassword").is_ok());
    }

    #[test]
    fn test_vault_close_recompresses_after_failed_login() {
        let dir = TempDir::new().unwrap();
        let mut config = VaultConfig::in_dir(dir.path());
        config.compress_ledger = true;
        Vault::open(config.clone())
            .register("alice", "realpassword1")
            .unwrap()
            .close();

        let vault = Vault::open(config.clone());
        assert!(config.ledger_path().exists());
        assert!(vault.login("alice", "wrongpass").is_err());
        vault.close();

        assert!(!config.ledger_path().exists());
        assert!(config.compressed_ledger_path().exists());
    }

    struct FailingCodec {
        calls: Cell<usize>,
    }

    impl LedgerCodec for FailingCodec {
        fn compress(&self, _src: &Path, _dst: &Path) -> bool {
            self.calls.set(self.calls.get() + 1);
            false
        }

        fn decompress(&self, _src: &Path, _dst: &Path) -> bool {
            false
        }
    }

    #[test]
    fn test_codec_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let config = VaultConfig::in_dir(dir.path());
        let codec = Rc::new(FailingCodec {
            calls: Cell::new(0),
        });

        let vault = Vault::with_codec(config.clone(), Some(codec.clone() as Rc<dyn LedgerCodec>));
        vault.register("alice", "realpassword1").unwrap().close();

        assert_eq!(codec.calls.get(), 1);
        assert!(config.ledger_path().exists());
        assert!(vault.login("alice", "realpassword1").is_ok());
    }
}
