//! Streaming xxHash3 content digests
//!
//! Files are read through a fixed-size buffer so arbitrarily large videos
//! never need to fit in memory. The 128-bit digest is rendered as lower-case
//! hex and only used for duplicate and change bookkeeping.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::trace;
use xxhash_rust::xxh3::Xxh3;

/// Read buffer size (256KB)
const BUFFER_SIZE: usize = 256 * 1024;

/// Length of a rendered digest in hex characters
pub const DIGEST_HEX_LEN: usize = 32;

/// Compute the content digest of a file
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| Error::from_io(path, e))?;
    let digest = hash_reader(file).map_err(|e| Error::HashComputation {
        path: path.to_path_buf(),
        message: format!("Failed to read file: {}", e),
    })?;

    trace!(?path, %digest, "Computed file hash");
    Ok(digest)
}

/// Digest everything a reader yields
pub fn hash_reader<R: Read>(reader: R) -> std::io::Result<String> {
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, reader);
    let mut hasher = Xxh3::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:032x}", hasher.digest128()))
}
