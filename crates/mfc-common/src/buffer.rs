//! Immutable byte buffer

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed-length immutable byte sequence.
///
/// Two buffers are equal when their contents are equal. Slicing produces a
/// new buffer; the original is never modified.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Buffer(Vec<u8>);

impl Buffer {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Parse a hex string. Whitespace is ignored so dumps can be pasted as-is.
    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let compact: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(compact).map(Self)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex rendering, as used in key files and JSON dumps.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Copy `len` bytes starting at `offset`.
    ///
    /// # Panics
    /// Panics if the range is out of bounds, like slice indexing.
    pub fn slice(&self, offset: usize, len: usize) -> Buffer {
        Buffer(self.0[offset..offset + len].to_vec())
    }

    /// Checked variant of [`Buffer::slice`].
    pub fn get_slice(&self, offset: usize, len: usize) -> Option<Buffer> {
        let end = offset.checked_add(len)?;
        self.0.get(offset..end).map(|s| Buffer(s.to_vec()))
    }

    /// Concatenate two byte sequences into a new buffer.
    pub fn concat(&self, other: &[u8]) -> Buffer {
        let mut data = Vec::with_capacity(self.0.len() + other.len());
        data.extend_from_slice(&self.0);
        data.extend_from_slice(other);
        Buffer(data)
    }

    /// Pairwise XOR. The result is as long as the shorter operand.
    pub fn xor(&self, other: &[u8]) -> Buffer {
        Buffer(self.0.iter().zip(other).map(|(a, b)| a ^ b).collect())
    }

    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0x00)
    }

    pub fn is_all_ff(&self) -> bool {
        self.0.iter().all(|&b| b == 0xFF)
    }

    /// Read `len` bits (at most 32) starting at bit `start`, where bit 0 is
    /// the most significant bit of byte 0.
    ///
    /// # Panics
    /// Panics if `len > 32` or the bit range runs past the end of the buffer.
    pub fn bits_be(&self, start: usize, len: usize) -> u32 {
        assert!(len <= 32, "cannot extract more than 32 bits, asked for {}", len);
        (start..start + len).fold(0u32, |acc, bit| {
            let value = (self.0[bit / 8] >> (7 - bit % 8)) & 1;
            (acc << 1) | u32::from(value)
        })
    }

    /// Read `len` bits (at most 32) starting at bit `start`, where bit 0 is
    /// the least significant bit of byte 0 and the first bit read becomes the
    /// least significant bit of the result.
    pub fn bits_le(&self, start: usize, len: usize) -> u32 {
        assert!(len <= 32, "cannot extract more than 32 bits, asked for {}", len);
        (start..start + len).fold(0u32, |acc, bit| {
            let value = (self.0[bit / 8] >> (bit % 8)) & 1;
            acc | (u32::from(value) << (bit - start))
        })
    }

    /// Big-endian unsigned integer from `len` bytes (at most 8) at `offset`.
    pub fn int_be(&self, offset: usize, len: usize) -> u64 {
        assert!(len <= 8, "cannot read more than 8 bytes into an integer");
        self.0[offset..offset + len]
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }

    /// Little-endian unsigned integer from `len` bytes (at most 8) at `offset`.
    pub fn int_le(&self, offset: usize, len: usize) -> u64 {
        assert!(len <= 8, "cannot read more than 8 bytes into an integer");
        self.0[offset..offset + len]
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(data: Vec<u8>) -> Self {
        Self(data)
    }
}

impl From<&[u8]> for Buffer {
    fn from(data: &[u8]) -> Self {
        Self(data.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Buffer {
    fn from(data: [u8; N]) -> Self {
        Self(data.to_vec())
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.to_hex())
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.0))
    }
}

impl Serialize for Buffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Buffer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Buffer::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
