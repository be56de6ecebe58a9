//! Hashing for cache addressing and package checksums.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Width, in hex characters, of the digest used in content-addressed paths.
pub const SHORT_HASH_LEN: usize = 16;

/// Compute SHA256 hash of a string.
pub fn sha256_str(s: &str) -> String {
    hex::encode(Sha256::digest(s.as_bytes()))
}

/// Compute SHA256 hash of a byte slice.
pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Fixed-width digest of a canonical identity string.
pub fn short_hash(s: &str) -> String {
    let mut full = sha256_str(s);
    full.truncate(SHORT_HASH_LEN);
    full
}

fn update_with_file(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

    let mut reader = BufReader::new(file);
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(())
}

/// Checksum of a package directory.
///
/// Covers every regular file's relative path (with `/` separators) and
/// contents, in sorted order. VCS metadata is skipped so a checkout and an
/// extracted archive of the same tree hash identically.
pub fn sha256_dir(root: &Path) -> Result<String> {
    let mut hasher = Sha256::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        hasher.update(rel.as_bytes());
        hasher.update(b"\0");
        update_with_file(&mut hasher, entry.path())?;
        hasher.update(b"\0");
    }

    Ok(hex::encode(hasher.finalize()))
}
