//! Whole-file compression of the master ledger
//!
//! The vault only relies on a boolean success contract; failures are logged
//! by the caller and never affect vault operations.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::warn;

pub trait LedgerCodec {
    /// Compress `src` into `dst`. Returns false on any failure.
    fn compress(&self, src: &Path, dst: &Path) -> bool;

    /// Decompress `src` into `dst`. Returns false on any failure.
    fn decompress(&self, src: &Path, dst: &Path) -> bool;
}

/// gzip via flate2.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCodec;

impl GzipCodec {
    fn try_compress(src: &Path, dst: &Path) -> io::Result<()> {
        let mut input = BufReader::new(File::open(src)?);
        let temp_file = temp_beside(dst)?;
        let mut encoder = GzEncoder::new(BufWriter::new(temp_file), Compression::default());
        io::copy(&mut input, &mut encoder)?;
        let temp_file = encoder.finish()?.into_inner().map_err(|e| e.into_error())?;
        replace_with(temp_file, dst)
    }

    fn try_decompress(src: &Path, dst: &Path) -> io::Result<()> {
        let mut decoder = GzDecoder::new(BufReader::new(File::open(src)?));
        let mut output = BufWriter::new(temp_beside(dst)?);
        io::copy(&mut decoder, &mut output)?;
        let temp_file = output.into_inner().map_err(|e| e.into_error())?;
        replace_with(temp_file, dst)
    }
}

/// A temporary file in the directory of `dst`, so it can be renamed over it.
fn temp_beside(dst: &Path) -> io::Result<NamedTempFile> {
    match dst.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => NamedTempFile::new_in(parent),
        _ => NamedTempFile::new_in("."),
    }
}

/// Sync `temp_file` and rename it to `dst`. `dst` is untouched unless the
/// whole output was written.
fn replace_with(temp_file: NamedTempFile, dst: &Path) -> io::Result<()> {
    temp_file.as_file().sync_all()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    temp_file.persist(dst).map_err(|e| e.error)?;
    Ok(())
}

impl LedgerCodec for GzipCodec {
    fn compress(&self, src: &Path, dst: &Path) -> bool {
        Self::try_compress(src, dst)
            .inspect_err(|e| warn!(src = %src.display(), error = %e, "gzip compression failed"))
            .is_ok()
    }

    fn decompress(&self, src: &Path, dst: &Path) -> bool {
        Self::try_decompress(src, dst)
            .inspect_err(|e| warn!(src = %src.display(), error = %e, "gzip decompression failed"))
            .is_ok()
    }
}
