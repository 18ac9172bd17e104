//! The card capability the reader drives
//!
//! MIFARE Classic and MIFARE Plus (security level 3) cards look the same to
//! the reader: authenticate a sector with a key, then read its blocks. The
//! cipher behind `authenticate` differs (CRYPTO1 or AES) and lives behind
//! this trait.

use mfc_common::Buffer;
use mfc_keys::SectorKey;

use crate::card::SubType;
use crate::CardError;

/// Sectors at or above this index hold 16 blocks instead of 4.
pub const LARGE_SECTOR_START: usize = 32;

pub fn block_count_in_sector(sector: usize) -> usize {
    if sector >= LARGE_SECTOR_START {
        16
    } else {
        4
    }
}

/// First block of a sector.
pub fn sector_to_block(sector: usize) -> usize {
    if sector < LARGE_SECTOR_START {
        sector * 4
    } else {
        16 * sector - 32 * 12
    }
}

pub fn block_to_sector(block: usize) -> usize {
    if block < LARGE_SECTOR_START * 4 {
        block / 4
    } else {
        (block + 32 * 12) / 16
    }
}

/// Sector-level access to a MIFARE Classic compatible card.
pub trait ClassicCardTech {
    /// Try to authenticate `sector` with `key`.
    ///
    /// A wrong key or a malformed reply is `Ok(false)`. Errors are reserved
    /// for transport failures.
    fn authenticate(&mut self, sector: usize, key: &SectorKey) -> Result<bool, CardError>;

    /// Read one 16-byte block of the authenticated sector.
    ///
    /// A card that refuses the read answers with the one-byte unauthorized
    /// sentinel instead of 16 bytes.
    fn read_block(&mut self, block: usize) -> Result<Buffer, CardError>;

    fn sector_count(&self) -> usize;

    fn block_count_in_sector(&self, sector: usize) -> usize {
        block_count_in_sector(sector)
    }

    fn sector_to_block(&self, sector: usize) -> usize {
        sector_to_block(sector)
    }

    fn tag_id(&self) -> Buffer;

    fn sub_type(&self) -> SubType;
}

impl<T: ClassicCardTech + ?Sized> ClassicCardTech for &mut T {
    fn authenticate(&mut self, sector: usize, key: &SectorKey) -> Result<bool, CardError> {
        (**self).authenticate(sector, key)
    }

    fn read_block(&mut self, block: usize) -> Result<Buffer, CardError> {
        (**self).read_block(block)
    }

    fn sector_count(&self) -> usize {
        (**self).sector_count()
    }

    fn block_count_in_sector(&self, sector: usize) -> usize {
        (**self).block_count_in_sector(sector)
    }

    fn sector_to_block(&self, sector: usize) -> usize {
        (**self).sector_to_block(sector)
    }

    fn tag_id(&self) -> Buffer {
        (**self).tag_id()
    }

    fn sub_type(&self) -> SubType {
        (**self).sub_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry() {
        assert_eq!(block_count_in_sector(0), 4);
        assert_eq!(block_count_in_sector(31), 4);
        assert_eq!(block_count_in_sector(32), 16);
        assert_eq!(sector_to_block(1), 4);
        assert_eq!(sector_to_block(31), 124);
        assert_eq!(sector_to_block(32), 128);
        assert_eq!(sector_to_block(39), 240);
    }

    #[test]
    fn test_block_to_sector_inverse() {
        for sector in 0..40 {
            let first = sector_to_block(sector);
            for offset in 0..block_count_in_sector(sector) {
                assert_eq!(block_to_sector(first + offset), sector);
            }
        }
        assert_eq!(block_to_sector(255), 39);
    }
}
