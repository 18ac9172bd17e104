//! Key sources
//!
//! A key source answers two questions for the authenticator: which keys are
//! likely for a given sector, and which keys are known at all.

use std::collections::{BTreeMap, HashSet};

use mfc_common::Buffer;
use tracing::debug;

use crate::hash::check_key_hash;
use crate::key::{KeyType, SectorKey};

/// Bundle assigned to keys returned by [`ClassicKeys::all_keys`].
pub const ALL_KEYS_BUNDLE: &str = "all-keys";

/// Widely used MIFARE Classic / Plus keys.
///
/// None of these are unique to a transit operator or ticketing vendor, and
/// operator keys must never be added here. Decoders that need to recognise a
/// fixed operator key should compare a salted hash instead (see
/// [`crate::hash::check_key_hash`]).
const WELL_KNOWN_KEYS: &[(&[u8], &str)] = &[
    (&[0xFF; 6], "well-known-ff"),
    (&[0x00; 6], "well-known-zero"),
    (&[0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5], "well-known-mad"),
    (&[0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7], "well-known-ndef"),
    (&[0xFF; 16], "well-known-ff-aes"),
    (&[0x00; 16], "well-known-zero-aes"),
    (
        &[
            0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5,
            0xA6, 0xA7,
        ],
        "well-known-mad-aes",
    ),
    (
        &[
            0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7,
            0xD3, 0xF7,
        ],
        "well-known-ndef-aes",
    ),
];

/// The well-known keys as key-A candidates.
pub fn well_known_keys() -> Vec<SectorKey> {
    WELL_KNOWN_KEYS
        .iter()
        .map(|(key, bundle)| SectorKey {
            key: Buffer::from(*key),
            key_type: KeyType::A,
            bundle: (*bundle).to_string(),
        })
        .collect()
}

/// Pluggable key lookup used by the authenticator.
pub trait ClassicKeys {
    /// Candidate keys for `sector`, ordered so that keys whose bundle appears
    /// earlier in `preferred_bundles` come first.
    fn candidates(&self, sector: usize, preferred_bundles: &[String]) -> Vec<SectorKey>;

    /// Every key this source knows about, regardless of sector.
    fn all_keys(&self) -> Vec<SectorKey>;
}

/// Where a key set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySetKind {
    /// Keys dumped from one specific card, looked up by UID.
    PerTag,
    /// Keys shared by a whole fleet of cards.
    Static,
}

/// A static key entry that only carries a salted hash until a dictionary
/// supplies the matching key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedKey {
    pub sector: usize,
    pub key_type: KeyType,
    pub hash: String,
    pub card: String,
    pub bundle: String,
}

/// Sector-indexed key material, plus the well-known keys.
#[derive(Debug, Clone)]
pub struct ClassicKeySet {
    pub kind: KeySetKind,
    pub tag_id: Option<Buffer>,
    pub description: Option<String>,
    keys: BTreeMap<usize, Vec<SectorKey>>,
    hashed: Vec<HashedKey>,
}

impl ClassicKeySet {
    pub fn new(kind: KeySetKind) -> Self {
        Self {
            kind,
            tag_id: None,
            description: None,
            keys: BTreeMap::new(),
            hashed: Vec::new(),
        }
    }

    /// An empty static set: only the well-known keys are tried.
    pub fn fallback() -> Self {
        Self::new(KeySetKind::Static)
    }

    pub fn add_key(&mut self, sector: usize, key: SectorKey) {
        self.keys.entry(sector).or_default().push(key);
    }

    pub fn add_hashed(&mut self, hashed: HashedKey) {
        self.hashed.push(hashed);
    }

    pub fn is_empty(&self) -> bool {
        self.keys.values().all(Vec::is_empty)
    }

    /// Keys explicitly listed for `sector`, without the well-known keys.
    pub fn sector_keys(&self, sector: usize) -> &[SectorKey] {
        self.keys.get(&sector).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sectors that have keys listed, in ascending order.
    pub fn sectors(&self) -> impl Iterator<Item = (usize, &[SectorKey])> + '_ {
        self.keys
            .iter()
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(sector, keys)| (*sector, keys.as_slice()))
    }

    /// Number of distinct key values in the set (well-known keys excluded).
    pub fn key_count(&self) -> usize {
        self.keys
            .values()
            .flatten()
            .map(|k| &k.key)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Hashed entries still waiting for a dictionary match.
    pub fn pending_hashes(&self) -> &[HashedKey] {
        &self.hashed
    }

    /// Append every key of `other` to this set.
    pub fn merge(&mut self, other: ClassicKeySet) {
        for (sector, keys) in other.keys {
            self.keys.entry(sector).or_default().extend(keys);
        }
        self.hashed.extend(other.hashed);
    }

    /// Resolve hashed entries against a dictionary of raw keys.
    ///
    /// Entries whose salted hash matches a dictionary key become real keys;
    /// entries that stay unmatched are dropped. Returns the number of
    /// entries that were resolved.
    pub fn qualify(&mut self, dictionary: &[Buffer]) -> usize {
        let mut resolved = 0;
        for entry in std::mem::take(&mut self.hashed) {
            let found = dictionary
                .iter()
                .find(|key| check_key_hash(key, &entry.card, &[entry.hash.as_str()]).is_some());

            match found {
                Some(key) => {
                    resolved += 1;
                    self.add_key(
                        entry.sector,
                        SectorKey {
                            key: key.clone(),
                            key_type: entry.key_type,
                            bundle: entry.bundle,
                        },
                    );
                }
                None => {
                    debug!(card = %entry.card, sector = entry.sector, "no dictionary key for hash")
                }
            }
        }
        resolved
    }
}

impl ClassicKeys for ClassicKeySet {
    fn candidates(&self, sector: usize, preferred_bundles: &[String]) -> Vec<SectorKey> {
        let mut candidates: Vec<SectorKey> = self.sector_keys(sector).to_vec();
        candidates.extend(well_known_keys());

        let rank = |key: &SectorKey| {
            preferred_bundles
                .iter()
                .position(|b| *b == key.bundle)
                .unwrap_or(preferred_bundles.len())
        };
        // Stable: keys from the same bundle keep their file order.
        candidates.sort_by_key(rank);
        candidates
    }

    fn all_keys(&self) -> Vec<SectorKey> {
        let mut seen = HashSet::new();
        self.keys
            .values()
            .flatten()
            .cloned()
            .chain(well_known_keys())
            .filter(|k| seen.insert(k.key.clone()))
            .map(|k| SectorKey {
                key: k.key,
                key_type: KeyType::Unknown,
                bundle: ALL_KEYS_BUNDLE.to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::key_hash;

    fn key(hex_str: &str, bundle: &str) -> SectorKey {
        SectorKey::from_hex(hex_str, KeyType::A, bundle).unwrap()
    }

    #[test]
    fn test_fallback_has_only_well_known() {
        let keys = ClassicKeySet::fallback();
        assert!(keys.is_empty());
        let candidates = keys.candidates(3, &[]);
        assert_eq!(candidates.len(), 8);
        assert_eq!(candidates[0].bundle, "well-known-ff");
        assert_eq!(keys.all_keys().len(), 8);
    }

    #[test]
    fn test_sector_keys_come_first() {
        let mut keys = ClassicKeySet::new(KeySetKind::Static);
        keys.add_key(1, key("112233445566", "operator"));
        let candidates = keys.candidates(1, &[]);
        assert_eq!(candidates[0].key.to_hex(), "112233445566");
        // Other sectors only see the well-known keys
        assert_eq!(keys.candidates(2, &[])[0].bundle, "well-known-ff");
        let listed: Vec<usize> = keys.sectors().map(|(s, _)| s).collect();
        assert_eq!(listed, vec![1]);
    }

    #[test]
    fn test_preferred_bundles_reorder() {
        let mut keys = ClassicKeySet::new(KeySetKind::Static);
        keys.add_key(0, key("112233445566", "operator"));
        keys.add_key(0, key("665544332211", "other"));
        let preferred = vec!["well-known-mad".to_string(), "other".to_string()];
        let candidates = keys.candidates(0, &preferred);
        assert_eq!(candidates[0].bundle, "well-known-mad");
        assert_eq!(candidates[1].bundle, "other");
        assert_eq!(candidates[2].bundle, "operator");
    }

    #[test]
    fn test_all_keys_dedup_and_order() {
        let mut keys = ClassicKeySet::new(KeySetKind::Static);
        keys.add_key(0, key("112233445566", "operator"));
        keys.add_key(5, key("112233445566", "operator"));
        keys.add_key(5, key("ffffffffffff", "operator"));
        let all = keys.all_keys();
        assert_eq!(all[0].key.to_hex(), "112233445566");
        assert_eq!(all[1].key.to_hex(), "ffffffffffff");
        // Duplicated ff key from the well-known list is dropped
        assert_eq!(all.len(), 8);
        assert!(all.iter().all(|k| k.key_type == KeyType::Unknown));
        assert!(all.iter().all(|k| k.bundle == ALL_KEYS_BUNDLE));
    }

    #[test]
    fn test_merge() {
        let mut a = ClassicKeySet::new(KeySetKind::Static);
        a.add_key(0, key("112233445566", "a"));
        let mut b = ClassicKeySet::new(KeySetKind::Static);
        b.add_key(0, key("665544332211", "b"));
        b.add_key(1, key("010203040506", "b"));
        a.merge(b);
        assert_eq!(a.sector_keys(0).len(), 2);
        assert_eq!(a.sector_keys(1).len(), 1);
        assert_eq!(a.key_count(), 3);
    }

    #[test]
    fn test_qualify_from_dictionary() {
        let secret = Buffer::from_hex("0a1b2c3d4e5f").unwrap();
        let mut keys = ClassicKeySet::new(KeySetKind::Static);
        keys.add_hashed(HashedKey {
            sector: 2,
            key_type: KeyType::B,
            hash: key_hash(&secret, "somecard"),
            card: "somecard".to_string(),
            bundle: "somecard".to_string(),
        });
        keys.add_hashed(HashedKey {
            sector: 3,
            key_type: KeyType::A,
            hash: "00000000000000000000000000000000".to_string(),
            card: "somecard".to_string(),
            bundle: "somecard".to_string(),
        });

        let dictionary = vec![Buffer::from_hex("ffffffffffff").unwrap(), secret.clone()];
        assert_eq!(keys.qualify(&dictionary), 1);
        assert_eq!(keys.sector_keys(2)[0].key, secret);
        assert_eq!(keys.sector_keys(2)[0].key_type, KeyType::B);
        assert!(keys.sector_keys(3).is_empty());
        assert!(keys.pending_hashes().is_empty());
    }
}
