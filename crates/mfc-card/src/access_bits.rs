//! Sector trailer access conditions
//!
//! Bytes 6..10 of a sector trailer hold the access conditions: three 4-bit
//! values C1, C2 and C3 (bit `s` of each belongs to slot `s`), their
//! inverses, and a general purpose byte. Slots 0..2 cover the data blocks and
//! slot 3 the trailer itself.
//!
//! ```text
//!   byte 6: !C2 (hi) | !C1 (lo)
//!   byte 7:  C1 (hi) | !C3 (lo)
//!   byte 8:  C3 (hi) |  C2 (lo)
//!   byte 9:  general purpose byte
//! ```

use std::fmt;

use mfc_keys::KeyType;

/// Slot of the sector trailer.
pub const TRAILER_SLOT: usize = 3;

/// Offset of the access bytes inside a trailer block.
const ACCESS_OFFSET: usize = 6;

/// Who may read a data block under a given access code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAccess {
    /// Readable with key A or key B.
    Either,
    /// Readable only with key B, and only while key B is secret.
    KeyBOnly,
    /// Code 7: no documented way to read the block. Usually a corrupt trailer.
    Never,
}

/// Decoded access conditions of one sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessBits {
    raw: [u8; 4],
}

impl AccessBits {
    /// Decode the access bytes of a trailer block. Returns `None` when the
    /// block is too short to hold them.
    pub fn from_trailer(trailer: &[u8]) -> Option<AccessBits> {
        let bytes = trailer.get(ACCESS_OFFSET..ACCESS_OFFSET + 4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        Some(Self::from_access_bytes(raw))
    }

    pub fn from_access_bytes(raw: [u8; 4]) -> AccessBits {
        AccessBits { raw }
    }

    /// Encode per-slot access codes into well-formed access bytes.
    pub fn from_codes(codes: [u8; 4], gpb: u8) -> AccessBits {
        let (mut c1, mut c2, mut c3) = (0u8, 0u8, 0u8);
        for (slot, code) in codes.iter().enumerate() {
            c1 |= ((code >> 2) & 1) << slot;
            c2 |= ((code >> 1) & 1) << slot;
            c3 |= (code & 1) << slot;
        }
        AccessBits {
            raw: [
                ((!c2 & 0x0F) << 4) | (!c1 & 0x0F),
                (c1 << 4) | (!c3 & 0x0F),
                (c3 << 4) | c2,
                gpb,
            ],
        }
    }

    pub fn raw(&self) -> [u8; 4] {
        self.raw
    }

    /// The general purpose byte.
    pub fn gpb(&self) -> u8 {
        self.raw[3]
    }

    fn c1(&self) -> u8 {
        (self.raw[1] & 0xF0) >> 4
    }

    fn c2(&self) -> u8 {
        self.raw[2] & 0x0F
    }

    fn c3(&self) -> u8 {
        (self.raw[2] & 0xF0) >> 4
    }

    /// 3-bit access code `C1 C2 C3` for a slot.
    pub fn code(&self, slot: usize) -> u8 {
        let slot = slot & 3;
        (((self.c1() >> slot) & 1) << 2)
            | (((self.c2() >> slot) & 1) << 1)
            | ((self.c3() >> slot) & 1)
    }

    pub fn block_access(&self, slot: usize) -> BlockAccess {
        match self.code(slot) {
            0 | 1 | 2 | 4 | 6 => BlockAccess::Either,
            3 | 5 => BlockAccess::KeyBOnly,
            _ => BlockAccess::Never,
        }
    }

    /// Whether key B can be read out of the trailer with key A. A readable
    /// key B cannot be used for authentication.
    pub fn is_key_b_readable(&self) -> bool {
        self.code(TRAILER_SLOT) <= 2
    }

    /// Whether a data block in `slot` can be read after authenticating with
    /// `key_type`.
    pub fn is_data_block_readable(&self, slot: usize, key_type: KeyType) -> bool {
        match self.block_access(slot) {
            BlockAccess::Either => true,
            BlockAccess::KeyBOnly => key_type == KeyType::B && !self.is_key_b_readable(),
            BlockAccess::Never => false,
        }
    }

    /// Whether the stored inverse bits match the access bits.
    pub fn is_valid(&self) -> bool {
        let inverted = self.raw[0] as u16 | (((self.raw[1] & 0x0F) as u16) << 8);
        let plain = (((self.raw[1] & 0xF0) >> 4) as u16) | ((self.raw[2] as u16) << 4);
        inverted == (!plain & 0x0FFF)
    }
}

impl Default for AccessBits {
    /// Transport configuration: `FF 07 80 69`.
    fn default() -> Self {
        AccessBits::from_access_bytes([0xFF, 0x07, 0x80, 0x69])
    }
}

impl fmt::Display for AccessBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:03b} {:03b} {:03b} {:03b}",
            self.code(0),
            self.code(1),
            self.code(2),
            self.code(3)
        )?;
        if !self.is_valid() {
            write!(f, " (invalid)")?;
        }
        Ok(())
    }
}

/// Access-bit slot of a block, given its offset within the sector.
///
/// Small sectors map one block per slot. In 16-block sectors each data slot
/// covers five blocks and the last block is the trailer.
pub fn slot_for_block(block_in_sector: usize, blocks_in_sector: usize) -> usize {
    if block_in_sector + 1 >= blocks_in_sector {
        return TRAILER_SLOT;
    }
    if blocks_in_sector <= 4 {
        block_in_sector
    } else {
        block_in_sector / 5
    }
}
