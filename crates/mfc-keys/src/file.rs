//! JSON key files and key dictionaries
//!
//! Key file layout:
//!
//! ```json
//! {
//!   "KeyType": "MifareClassic",
//!   "TagId": "0a1b2c3d",
//!   "Description": "Office badge",
//!   "keys": [
//!     { "sector": 0, "type": "KeyA", "key": "a0a1a2a3a4a5", "bundle": "office" },
//!     { "sector": 2, "type": "KeyB", "hash": "93bf0db4...", "card": "office" }
//!   ]
//! }
//! ```
//!
//! `MifareClassic` files hold keys dumped from one card and may leave out
//! `sector`, in which case the entry index is the sector. `MifareClassicStatic`
//! files hold fleet-wide keys and must give a sector for every entry.

use mfc_common::Buffer;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::key::{KeyType, SectorKey};
use crate::keyset::{ClassicKeySet, HashedKey, KeySetKind};
use crate::KeyError;

/// Value of `KeyType` for per-tag key files.
pub const TYPE_CLASSIC: &str = "MifareClassic";
/// Value of `KeyType` for static key files.
pub const TYPE_CLASSIC_STATIC: &str = "MifareClassicStatic";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFile {
    #[serde(rename = "KeyType")]
    pub key_type: String,
    #[serde(rename = "TagId", default, skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<String>,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub keys: Vec<KeyEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<usize>,
    #[serde(rename = "type", default)]
    pub key_type: KeyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,
}

impl KeyFile {
    pub fn parse(json: &str) -> Result<Self, KeyError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Unrecognised file types are read as per-tag dumps.
    pub fn kind(&self) -> KeySetKind {
        match self.key_type.as_str() {
            TYPE_CLASSIC_STATIC => KeySetKind::Static,
            TYPE_CLASSIC => KeySetKind::PerTag,
            other => {
                debug!(key_type = other, "unknown key file type, assuming per-tag keys");
                KeySetKind::PerTag
            }
        }
    }

    /// Convert into a key set. Keys without an explicit bundle get
    /// `default_bundle`, usually the file name.
    pub fn into_key_set(self, default_bundle: &str) -> Result<ClassicKeySet, KeyError> {
        let kind = self.kind();
        let mut set = ClassicKeySet::new(kind);
        set.tag_id = self.tag_id.as_deref().map(Buffer::from_hex).transpose()?;
        set.description = self.description;

        for (index, entry) in self.keys.into_iter().enumerate() {
            let sector = match (entry.sector, kind) {
                (Some(s), _) => s,
                (None, KeySetKind::PerTag) => index,
                (None, KeySetKind::Static) => return Err(KeyError::MissingSector(index)),
            };
            let bundle = entry.bundle.unwrap_or_else(|| default_bundle.to_string());

            match (entry.key, entry.hash, entry.card) {
                (Some(key), _, _) => {
                    set.add_key(sector, SectorKey::from_hex(&key, entry.key_type, bundle)?);
                }
                (None, Some(hash), Some(card)) => set.add_hashed(HashedKey {
                    sector,
                    key_type: entry.key_type,
                    hash,
                    card,
                    bundle,
                }),
                _ => debug!(index, sector, "key entry has neither key nor hash, skipping"),
            }
        }
        Ok(set)
    }
}

impl ClassicKeySet {
    /// Parse a key file.
    pub fn from_json(json: &str, default_bundle: &str) -> Result<ClassicKeySet, KeyError> {
        KeyFile::parse(json)?.into_key_set(default_bundle)
    }
}

/// Parse a key dictionary: one hex key per line, blank lines and `#`
/// comments ignored.
pub fn parse_dictionary(text: &str) -> Result<Vec<Buffer>, KeyError> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(|line| {
            let key = Buffer::from_hex(line)?;
            SectorKey::new(key, KeyType::Unknown, "").map(|k| k.key)
        })
        .collect()
}
