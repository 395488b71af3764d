//! File-bearing flag support
//!
//! Photo uploads, PKCS#12 keys, and S/MIME material arrive as file paths on
//! the command line and leave as URL-safe base64 strings on the wire. The
//! assembler never touches the filesystem directly; it goes through
//! [`FileSource`] so tests can substitute in-memory content.

use std::io;
use std::path::Path;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;

use crate::error::{Error, Result};

/// Byte source behind file-bearing flags
pub trait FileSource: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// The real filesystem
#[derive(Debug, Default)]
pub struct FsSource;

impl FileSource for FsSource {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// Reads a file and encodes it with the URL-safe base64 alphabet
pub fn read_base64_urlsafe(source: &dyn FileSource, path: &Path) -> Result<String> {
    let bytes = source.read(path).map_err(|e| {
        Error::InvalidInvocation(format!("cannot read file {}: {}", path.display(), e))
    })?;
    Ok(URL_SAFE.encode(bytes))
}
