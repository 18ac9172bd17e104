//! Storage-card ATRs (PC/SC Part 3)
//!
//! PC/SC readers synthesise an ATR for memory cards that carries the card
//! standard and a two-byte card name:
//!
//! ```text
//!   3B 8F 80 01 80 4F 0C A0 00 00 03 06 SS NN NN 00 00 00 00 TCK
//! ```

/// Registered application provider identifier of the PC/SC workgroup.
const PCSC_RID: [u8; 5] = [0xA0, 0x00, 0x00, 0x03, 0x06];

/// ISO/IEC 14443 A, part 3.
pub const STANDARD_ISO14443A_3: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardName {
    ClassicMini,
    Classic1K,
    Classic4K,
    Ultralight,
    Plus2K,
    Plus4K,
    Other(u16),
}

impl CardName {
    pub fn from_code(code: u16) -> Self {
        match code {
            0x0001 => CardName::Classic1K,
            0x0002 => CardName::Classic4K,
            0x0003 => CardName::Ultralight,
            0x0026 => CardName::ClassicMini,
            0x0036 | 0x0038 => CardName::Plus2K,
            0x0037 | 0x0039 => CardName::Plus4K,
            other => CardName::Other(other),
        }
    }

    /// Number of sectors when the card speaks the MIFARE Classic protocol.
    pub fn sector_count(&self) -> Option<usize> {
        match self {
            CardName::ClassicMini => Some(5),
            CardName::Classic1K => Some(16),
            CardName::Classic4K | CardName::Plus4K => Some(40),
            CardName::Plus2K => Some(32),
            CardName::Ultralight | CardName::Other(_) => None,
        }
    }
}

/// The fields of a PC/SC storage-card ATR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageCardAtr {
    pub standard: u8,
    pub card_name: CardName,
}

/// Parse a PC/SC Part 3 storage-card ATR. Returns `None` for anything else,
/// including ISO 14443-4 cards such as MIFARE Plus in security level 3.
pub fn parse_storage_atr(atr: &[u8]) -> Option<StorageCardAtr> {
    if atr.len() < 15 || atr[0] != 0x3B || atr[4] != 0x80 || atr[5] != 0x4F {
        return None;
    }
    if atr[7..12] != PCSC_RID {
        return None;
    }
    Some(StorageCardAtr {
        standard: atr[12],
        card_name: CardName::from_code(u16::from_be_bytes([atr[13], atr[14]])),
    })
}
