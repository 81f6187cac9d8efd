//! Secret protection using AES-256-CBC
//!
//! Secrets are encrypted before they are written to a per-user file and
//! decrypted when they are displayed. The scheme is kept byte-compatible with
//! existing vault files:
//!
//! - AES-256 in CBC mode with PKCS#7 padding
//! - a constant all-zero 16-byte IV for every call
//! - a 32-byte key shared by every installation unless overridden
//!
//! This provides no semantic security (equal secrets produce equal
//! ciphertext) and no integrity protection. Replacing it with a randomized,
//! authenticated scheme changes the on-disk format; such a scheme can be
//! plugged in through [`SecretProtector`] without touching the store.

use std::fmt;

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Length of the key in bytes
pub const KEY_LEN: usize = 32;

/// AES block length in bytes
pub const BLOCK_LEN: usize = 16;

/// Key material used by every legacy installation.
pub const LEGACY_KEY: &str = "my_32_byte_secure_key";

/// Secrets and master passwords must have at least this many characters.
pub const MIN_SECRET_CHARS: usize = 9;

const ZERO_IV: [u8; BLOCK_LEN] = [0u8; BLOCK_LEN];

/// A 32-byte cipher key, wiped from memory on drop.
#[derive(Clone)]
pub struct VaultKey(Zeroizing<[u8; KEY_LEN]>);

impl VaultKey {
    /// Build a key from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Build a key from textual key material: the UTF-8 bytes are
    /// zero-padded, or truncated, to exactly 32 bytes.
    pub fn from_material(material: &str) -> Self {
        let mut bytes = [0u8; KEY_LEN];
        let src = material.as_bytes();
        let n = src.len().min(KEY_LEN);
        bytes[..n].copy_from_slice(&src[..n]);
        let key = Self::new(bytes);
        zeroize::Zeroize::zeroize(&mut bytes);
        key
    }

    /// The compiled-in key shared by every legacy installation.
    pub fn legacy() -> Self {
        Self::from_material(LEGACY_KEY)
    }

    fn bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Default for VaultKey {
    fn default() -> Self {
        Self::legacy()
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey(<redacted>)")
    }
}

/// Encrypt `plaintext` under `key` with the fixed zero IV.
///
/// The output is always a positive multiple of [`BLOCK_LEN`].
pub fn protect(plaintext: &[u8], key: &VaultKey) -> Vec<u8> {
    Aes256CbcEnc::new(&(*key.bytes()).into(), &ZERO_IV.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt a blob produced by [`protect`].
pub fn reveal(blob: &[u8], key: &VaultKey) -> Result<Vec<u8>> {
    if blob.is_empty() || blob.len() % BLOCK_LEN != 0 {
        return Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::Decode,
            format!(
                "ciphertext length {} is not a positive multiple of {}",
                blob.len(),
                BLOCK_LEN
            ),
        ));
    }

    Aes256CbcDec::new(&(*key.bytes()).into(), &ZERO_IV.into())
        .decrypt_padded_vec_mut::<Pkcs7>(blob)
        .map_err(|_| {
            VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::Decode,
                "invalid padding; corrupt data or wrong key",
            )
        })
}

/// Strength policy shared by entry secrets and master passwords.
pub fn is_strong(secret: &str) -> bool {
    secret.chars().count() >= MIN_SECRET_CHARS
}

/// The encryption and validation contract the credential store relies on.
pub trait SecretProtector {
    /// Encrypt a textual secret.
    fn protect(&self, plaintext: &str) -> Vec<u8>;

    /// Decrypt a blob back to the textual secret.
    fn reveal(&self, blob: &[u8]) -> Result<Zeroizing<String>>;

    /// Check a secret against the strength policy.
    fn validate(&self, secret: &str) -> bool {
        is_strong(secret)
    }
}

/// The legacy fixed-IV AES-256-CBC scheme.
#[derive(Debug, Clone, Default)]
pub struct LegacyCbcCipher {
    key: VaultKey,
}

impl LegacyCbcCipher {
    pub fn new(key: VaultKey) -> Self {
        Self { key }
    }
}

impl SecretProtector for LegacyCbcCipher {
    fn protect(&self, plaintext: &str) -> Vec<u8> {
        protect(plaintext.as_bytes(), &self.key)
    }

    fn reveal(&self, blob: &[u8]) -> Result<Zeroizing<String>> {
        let bytes = reveal(blob, &self.key)?;
        let text = String::from_utf8(bytes).map_err(|e| {
            let mut bytes = e.into_bytes();
            zeroize::Zeroize::zeroize(&mut bytes);
            VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::Decode,
                "revealed secret is not valid UTF-8; corrupt data or wrong key",
            )
        })?;
        Ok(Zeroizing::new(text))
    }
}
