//! MFC Keys - Sector key management for MIFARE Classic / Plus cards
//!
//! This crate provides the key material the acquisition engine tries against
//! each sector: per-tag key files, merged static key files, the public
//! well-known keys, and salted key hashes for identifying keys without
//! shipping them.
//!
//! # Example
//! ```
//! use mfc_keys::{ClassicKeySet, ClassicKeys};
//!
//! // The fallback source only knows the public well-known keys.
//! let keys = ClassicKeySet::fallback();
//! let candidates = keys.candidates(0, &[]);
//! assert_eq!(candidates[0].key.to_hex(), "ffffffffffff");
//! ```

pub mod error;
pub mod file;
pub mod hash;
pub mod key;
pub mod keyset;
pub mod retriever;

pub use error::KeyError;
pub use hash::{check_key_hash, key_hash};
pub use key::{KeyType, SectorKey, AES_KEY_LEN, CRYPTO1_KEY_LEN};
pub use keyset::{ClassicKeySet, ClassicKeys, KeySetKind};
pub use retriever::{DirectoryKeyRetriever, KeyRetriever, NoKeys};
