//! Sector keys

use mfc_common::Buffer;
use serde::{Deserialize, Serialize};

use crate::KeyError;

/// Key length used by MIFARE Classic (CRYPTO1).
pub const CRYPTO1_KEY_LEN: usize = 6;

/// Key length used by MIFARE Plus in security level 3 (AES-128).
pub const AES_KEY_LEN: usize = 16;

/// Which of the two sector keys a key is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum KeyType {
    #[serde(rename = "KeyA")]
    A = 1,
    #[serde(rename = "KeyB")]
    B = 2,
    #[default]
    #[serde(rename = "", other)]
    Unknown = 0,
}

impl KeyType {
    /// The other key. `Unknown` is treated as A, so it inverts to B.
    pub fn inverse(self) -> KeyType {
        match self {
            KeyType::B => KeyType::A,
            _ => KeyType::B,
        }
    }

    /// Unknown keys are tried as key A first.
    pub fn canon(self) -> KeyType {
        match self {
            KeyType::B => KeyType::B,
            _ => KeyType::A,
        }
    }
}

/// A candidate key for one sector, tagged with the bundle it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectorKey {
    pub key: Buffer,
    pub key_type: KeyType,
    pub bundle: String,
}

impl SectorKey {
    /// Build a key, checking that it is a CRYPTO1 or AES sized key.
    pub fn new(
        key: Buffer,
        key_type: KeyType,
        bundle: impl Into<String>,
    ) -> Result<Self, KeyError> {
        if key.len() != CRYPTO1_KEY_LEN && key.len() != AES_KEY_LEN {
            return Err(KeyError::InvalidKeyLength(key.len()));
        }
        Ok(Self {
            key,
            key_type,
            bundle: bundle.into(),
        })
    }

    pub fn from_hex(
        hex_str: &str,
        key_type: KeyType,
        bundle: impl Into<String>,
    ) -> Result<Self, KeyError> {
        Self::new(Buffer::from_hex(hex_str)?, key_type, bundle)
    }

    pub fn with_type(&self, key_type: KeyType) -> SectorKey {
        SectorKey {
            key: self.key.clone(),
            key_type,
            bundle: self.bundle.clone(),
        }
    }

    pub fn invert_type(&self) -> SectorKey {
        self.with_type(self.key_type.inverse())
    }

    pub fn canon_type(&self) -> SectorKey {
        self.with_type(self.key_type.canon())
    }
}
