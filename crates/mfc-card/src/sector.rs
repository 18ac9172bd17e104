//! Blocks and sectors as read from the card

use std::ops::Deref;

use mfc_common::Buffer;
use serde::{Deserialize, Serialize};

use crate::access_bits::AccessBits;

/// One-byte reply a card gives instead of block data when it refuses a read.
pub const UNAUTHORIZED_SENTINEL: u8 = 0x04;

/// Size of a data block.
pub const BLOCK_LEN: usize = 16;

/// Value block holding 0 at address 0, as left behind by some erasers.
const ZERO_VALUE_BLOCK: [u8; BLOCK_LEN] = [
    0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00, 0xFF,
];

/// Contents of one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassicBlock(Buffer);

impl ClassicBlock {
    pub fn new(data: Buffer) -> Self {
        Self(data)
    }

    /// The sentinel block recorded for a refused read.
    pub fn unauthorized() -> Self {
        Self(Buffer::from([UNAUTHORIZED_SENTINEL]))
    }

    pub fn data(&self) -> &Buffer {
        &self.0
    }

    pub fn is_unauthorized(&self) -> bool {
        self.0.as_slice() == [UNAUTHORIZED_SENTINEL]
    }

    /// True for blocks that look erased.
    pub fn is_empty(&self) -> bool {
        self.0.len() == BLOCK_LEN
            && (self.0.is_all_zero() || self.0.is_all_ff() || self.0.as_slice() == ZERO_VALUE_BLOCK)
    }
}

impl Deref for ClassicBlock {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Buffer> for ClassicBlock {
    fn from(data: Buffer) -> Self {
        Self(data)
    }
}

/// Serializable snapshot of one sector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorRaw {
    pub blocks: Vec<ClassicBlock>,
    #[serde(rename = "keyA", default, skip_serializing_if = "Option::is_none")]
    pub key_a: Option<Buffer>,
    #[serde(rename = "keyB", default, skip_serializing_if = "Option::is_none")]
    pub key_b: Option<Buffer>,
    #[serde(rename = "isUnauthorized", default)]
    pub is_unauthorized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SectorRaw {
    pub fn unauthorized() -> Self {
        Self {
            is_unauthorized: true,
            ..Default::default()
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// A sector after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sector {
    Valid(SectorRaw),
    /// No working key was found.
    Unauthorized,
    /// Reading failed for another reason.
    Invalid(String),
}

impl Sector {
    pub fn from_raw(raw: SectorRaw) -> Sector {
        if raw.is_unauthorized {
            Sector::Unauthorized
        } else if let Some(error) = raw.error {
            Sector::Invalid(error)
        } else {
            Sector::Valid(raw)
        }
    }

    pub fn raw(&self) -> SectorRaw {
        match self {
            Sector::Valid(raw) => raw.clone(),
            Sector::Unauthorized => SectorRaw::unauthorized(),
            Sector::Invalid(error) => SectorRaw::invalid(error.clone()),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Sector::Valid(_))
    }

    /// Blocks of a valid sector; empty otherwise.
    pub fn blocks(&self) -> &[ClassicBlock] {
        match self {
            Sector::Valid(raw) => &raw.blocks,
            _ => &[],
        }
    }

    pub fn block(&self, index: usize) -> Option<&ClassicBlock> {
        self.blocks().get(index)
    }

    pub fn key_a(&self) -> Option<&Buffer> {
        match self {
            Sector::Valid(raw) => raw.key_a.as_ref(),
            _ => None,
        }
    }

    pub fn key_b(&self) -> Option<&Buffer> {
        match self {
            Sector::Valid(raw) => raw.key_b.as_ref(),
            _ => None,
        }
    }

    /// Last block of the sector.
    pub fn trailer(&self) -> Option<&ClassicBlock> {
        self.blocks().last()
    }

    /// Access conditions from the trailer, if the trailer was read.
    pub fn access_bits(&self) -> Option<AccessBits> {
        self.trailer()
            .filter(|t| t.len() == BLOCK_LEN)
            .and_then(|t| AccessBits::from_trailer(t))
    }

    /// Whether every data block (trailer excluded) looks erased.
    pub fn is_empty(&self) -> bool {
        let blocks = self.blocks();
        !blocks.is_empty() && blocks[..blocks.len() - 1].iter().all(ClassicBlock::is_empty)
    }
}

impl From<SectorRaw> for Sector {
    fn from(raw: SectorRaw) -> Self {
        Sector::from_raw(raw)
    }
}
