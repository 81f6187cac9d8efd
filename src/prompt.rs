//! Reading master passwords and secrets from the user

use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};

use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};

/// Source of passwords and secrets for the front-end.
pub trait SecretReader {
    /// Read one secret. `label` names what is being asked for.
    ///
    /// The value is wrapped in `Zeroizing` so it is wiped from memory when
    /// dropped.
    fn read_secret(&mut self, label: &str) -> Result<Zeroizing<String>>;
}

/// Hands out a fixed sequence of secrets (for testing).
pub struct ConstantSecretReader {
    secrets: VecDeque<Zeroizing<String>>,
}

impl ConstantSecretReader {
    pub fn new<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            secrets: secrets
                .into_iter()
                .map(|s| Zeroizing::new(s.into()))
                .collect(),
        }
    }
}

impl SecretReader for ConstantSecretReader {
    fn read_secret(&mut self, label: &str) -> Result<Zeroizing<String>> {
        self.secrets
            .pop_front()
            .ok_or_else(|| unavailable(format!("no value left for {}", label)))
    }
}

/// Reads one secret per line from any buffered source, e.g. piped stdin.
pub struct StreamSecretReader {
    reader: Box<dyn BufRead>,
}

impl StreamSecretReader {
    pub fn new(reader: Box<dyn BufRead>) -> Self {
        Self { reader }
    }
}

impl SecretReader for StreamSecretReader {
    fn read_secret(&mut self, label: &str) -> Result<Zeroizing<String>> {
        let mut line = Zeroizing::new(String::new());
        let n = self.reader.read_line(&mut line).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading {}: {}", label, e),
                e,
            )
        })?;
        if n == 0 {
            return Err(unavailable(format!("input ended before {} was read", label)));
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(line)
    }
}

/// Reads from the terminal with no echo.
#[derive(Debug, Default)]
pub struct TerminalSecretReader;

impl TerminalSecretReader {
    pub fn new() -> Self {
        Self
    }
}

impl SecretReader for TerminalSecretReader {
    fn read_secret(&mut self, label: &str) -> Result<Zeroizing<String>> {
        if !io::stdin().is_terminal() {
            return Err(unavailable(
                "cannot read from terminal - stdin is not a terminal (try --password-stdin)",
            ));
        }

        let mut stderr = io::stderr();
        write!(stderr, "{}: ", label)
            .and_then(|_| stderr.flush())
            .map_err(|e| {
                VaultError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to write prompt: {}", e),
                    e,
                )
            })?;

        // rpassword hands back a plain String; wrap it straight away.
        let secret = rpassword::read_password().map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::SecretUnavailable,
                format!("failure reading {}: {}", label, e),
                e,
            )
        })?;
        Ok(Zeroizing::new(secret))
    }
}

fn unavailable(msg: impl Into<String>) -> VaultError {
    VaultError::with_kind(ErrorCategory::User, ErrorKind::SecretUnavailable, msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_reader_in_order() {
        let mut reader = ConstantSecretReader::new(["first-secret", "second-secret"]);
        assert_eq!(reader.read_secret("a").unwrap().as_str(), "first-secret");
        assert_eq!(reader.read_secret("b").unwrap().as_str(), "second-secret");

        let err = reader.read_secret("c").expect_err("expected exhaustion");
        assert_eq!(err.kind, Some(ErrorKind::SecretUnavailable));
    }

    #[test]
    fn test_stream_reader_one_line_per_call() {
        let data: &[u8] = b"realpassword1\r\npassword123\nlast-without-newline";
        let mut reader = StreamSecretReader::new(Box::new(data));
        assert_eq!(reader.read_secret("master password").unwrap().as_str(), "realpassword1");
        assert_eq!(reader.read_secret("secret").unwrap().as_str(), "password123");
        assert_eq!(reader.read_secret("secret").unwrap().as_str(), "last-without-newline");

        let err = reader.read_secret("secret").expect_err("expected end of input");
        assert_eq!(err.kind, Some(ErrorKind::SecretUnavailable));
    }

    #[test]
    fn test_stream_reader_keeps_inner_whitespace() {
        let data: &[u8] = b"  spaced out secret \n";
        let mut reader = StreamSecretReader::new(Box::new(data));
        assert_eq!(reader.read_secret("secret").unwrap().as_str(), "  spaced out secret ");
    }

    #[test]
    fn test_stream_reader_non_utf8() {
        let data: &[u8] = &[0xff, 0xfe, b'\n'];
        let mut reader = StreamSecretReader::new(Box::new(data));
        let err = reader.read_secret("secret").expect_err("expected io error");
        assert_eq!(err.kind, Some(ErrorKind::Io));
    }

    /// Needs a human at a terminal:
    ///
    /// cargo test test_terminal_reader_interactive -- --ignored --nocapture
    #[test]
    #[ignore]
    fn test_terminal_reader_interactive() {
        let mut reader = TerminalSecretReader::new();
        let secret = reader.read_secret("Test secret").unwrap();
        assert!(!secret.is_empty(), "Expected non-empty secret");
    }
}
