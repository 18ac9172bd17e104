//! Scan tuning

use serde::{Deserialize, Serialize};

/// How the reader picks RndA during MIFARE Plus authentication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonceSource {
    /// `RndA[i] = i * i`. The card only needs a fresh challenge from its own
    /// side, so a fixed RndA is enough.
    #[default]
    Deterministic,
    /// Draw RndA from the thread RNG.
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Passes over the candidate keys (and over all keys) per sector.
    pub auth_retry_limit: usize,
    /// Re-authenticate and re-read a refused block this many times.
    pub block_read_retries: usize,
    pub nonce_source: NonceSource,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            auth_retry_limit: 5,
            block_read_retries: 3,
            nonce_source: NonceSource::Deterministic,
        }
    }
}
