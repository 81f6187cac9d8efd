//! Random password generation

use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()";

/// Generate a password of `length` characters drawn from letters, digits
/// and `!@#$%^&*()`.
///
/// Passwords of four or more characters contain at least one character of
/// each class.
pub fn generate_password(length: usize) -> Result<String> {
    generate_with(&mut rand::thread_rng(), length)
}

fn generate_with<R: Rng>(rng: &mut R, length: usize) -> Result<String> {
    if length == 0 {
        return Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidField,
            "password length must be greater than 0",
        ));
    }

    let classes = [LOWER, UPPER, DIGITS, SYMBOLS];
    let alphabet: Vec<u8> = classes.concat();

    let mut chars: Vec<u8> = Vec::with_capacity(length);
    if length >= classes.len() {
        for class in classes {
            chars.push(class[rng.gen_range(0..class.len())]);
        }
    }
    while chars.len() < length {
        chars.push(alphabet[rng.gen_range(0..alphabet.len())]);
    }
    chars.shuffle(rng);

    // Every byte comes from an ASCII alphabet.
    Ok(chars.into_iter().map(char::from).collect())
}
