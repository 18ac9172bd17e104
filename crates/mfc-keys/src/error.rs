use thiserror::Error;

/// Errors raised while loading or parsing key material.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Key data must be 6 bytes (CRYPTO1) or 16 bytes (AES).
    #[error("expected a 6 or 16 byte key, got {0} bytes")]
    InvalidKeyLength(usize),

    /// Static key files must say which sector each key belongs to.
    #[error("key entry {0} has no sector index")]
    MissingSector(usize),
}
