//! Salted key hashes
//!
//! Decoders that need to recognise a card by one of its keys compare a salted
//! MD5 of the key against a hash shipped in the source, so the key itself
//! never has to be published. The salt is usually the card name.
//!
//! The hash is `MD5(salt || key || salt)`, rendered as lowercase hex.
//! Changing this breaks every hash already in use.

use md5::{Digest, Md5};

/// Compute the salted hash of a key.
pub fn key_hash(key: &[u8], salt: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(salt.as_bytes());
    hasher.update(key);
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Find which of `expected_hashes` matches the salted hash of `key`.
///
/// Returns the index of the first match, or `None` if nothing matches.
/// Hash comparison is case-insensitive.
pub fn check_key_hash(key: &[u8], salt: &str, expected_hashes: &[&str]) -> Option<usize> {
    if expected_hashes.is_empty() {
        return None;
    }
    let digest = key_hash(key, salt);
    expected_hashes
        .iter()
        .position(|h| h.eq_ignore_ascii_case(&digest))
}
