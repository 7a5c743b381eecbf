//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! [`Hasher`] computes BLAKE3 digests of whole files. Small and medium files
//! are streamed through a fixed buffer; files at or above
//! [`MMAP_THRESHOLD`] are memory-mapped and hashed with BLAKE3's internal
//! rayon parallelism.
//!
//! # Example
//!
//! ```no_run
//! use dupefox::scanner::{hash_to_hex, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let hash = hasher.full_hash(Path::new("photo.jpg")).unwrap();
//! println!("{}", hash_to_hex(&hash));
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use super::HashError;

/// A 32-byte BLAKE3 digest.
pub type Hash = [u8; 32];

/// Files at least this large are hashed through a memory map.
pub const MMAP_THRESHOLD: u64 = 16 * 1024 * 1024;

/// Read buffer size for streaming hashing.
const BUFFER_SIZE: usize = 64 * 1024;

/// Streaming content hasher.
#[derive(Debug, Clone)]
pub struct Hasher {
    mmap_threshold: u64,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default memory-map threshold.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mmap_threshold: MMAP_THRESHOLD,
        }
    }

    /// Override the size at which files are hashed through a memory map.
    #[must_use]
    pub fn with_mmap_threshold(mut self, bytes: u64) -> Self {
        self.mmap_threshold = bytes;
        self
    }

    /// Hash the full contents of a file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn full_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| HashError::from_io(path, e))?
            .len();

        let mut hasher = blake3::Hasher::new();
        if len >= self.mmap_threshold {
            log::trace!("Hashing {} via mmap ({} bytes)", path.display(), len);
            drop(file);
            hasher
                .update_mmap_rayon(path)
                .map_err(|e| HashError::from_io(path, e))?;
        } else {
            stream(file, &mut hasher).map_err(|e| HashError::from_io(path, e))?;
        }

        Ok(*hasher.finalize().as_bytes())
    }
}

fn stream(mut file: File, hasher: &mut blake3::Hasher) -> io::Result<()> {
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        match file.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Render a hash as 64 lowercase hex characters.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    blake3::Hash::from(*hash).to_hex().to_string()
}

/// Parse 64 hex characters back into a hash.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Hash> {
    blake3::Hash::from_hex(hex).ok().map(|h| *h.as_bytes())
}
