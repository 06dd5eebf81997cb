use std::path::Path;

use filekeep_core::ContentHash;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::IndexError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the `SHA-256` of a file by streaming it once in fixed-size chunks.
pub async fn hash_file(path: &Path) -> Result<ContentHash, IndexError> {
    let io_err = |source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::open(path).await.map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await.map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(ContentHash::from_digest(&hasher.finalize()))
}

/// Compute the `SHA-256` of an in-memory buffer.
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    ContentHash::from_digest(&Sha256::digest(bytes))
}
