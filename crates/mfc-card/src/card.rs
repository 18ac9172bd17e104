//! The result of a scan

use serde::{Deserialize, Serialize};

use crate::sector::{ClassicBlock, Sector, SectorRaw};

/// Which card technology produced the sectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubType {
    #[default]
    Classic,
    Plus,
}

/// Persisted form of a [`ClassicCard`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassicCardRaw {
    pub sectors: Vec<SectorRaw>,
    #[serde(rename = "isPartialRead", default)]
    pub is_partial_read: bool,
    #[serde(rename = "subType", default)]
    pub sub_type: SubType,
}

/// Sectors read from one card, indexed by sector number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ClassicCardRaw", into = "ClassicCardRaw")]
pub struct ClassicCard {
    sectors: Vec<Sector>,
    is_partial_read: bool,
    sub_type: SubType,
}

impl ClassicCard {
    pub fn new(sectors: Vec<SectorRaw>, is_partial_read: bool, sub_type: SubType) -> Self {
        Self {
            sectors: sectors.into_iter().map(Sector::from_raw).collect(),
            is_partial_read,
            sub_type,
        }
    }

    pub fn from_sectors(sectors: Vec<Sector>, is_partial_read: bool, sub_type: SubType) -> Self {
        Self {
            sectors,
            is_partial_read,
            sub_type,
        }
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn sector(&self, index: usize) -> Option<&Sector> {
        self.sectors.get(index)
    }

    pub fn block(&self, sector: usize, block: usize) -> Option<&ClassicBlock> {
        self.sector(sector)?.block(block)
    }

    /// True when the card left the field before every sector was read.
    pub fn is_partial_read(&self) -> bool {
        self.is_partial_read
    }

    pub fn sub_type(&self) -> SubType {
        self.sub_type
    }

    pub fn to_raw(&self) -> ClassicCardRaw {
        ClassicCardRaw {
            sectors: self.sectors.iter().map(Sector::raw).collect(),
            is_partial_read: self.is_partial_read,
            sub_type: self.sub_type,
        }
    }

    pub fn from_raw(raw: ClassicCardRaw) -> Self {
        Self::new(raw.sectors, raw.is_partial_read, raw.sub_type)
    }
}

impl From<ClassicCardRaw> for ClassicCard {
    fn from(raw: ClassicCardRaw) -> Self {
        ClassicCard::from_raw(raw)
    }
}

impl From<ClassicCard> for ClassicCardRaw {
    fn from(card: ClassicCard) -> Self {
        card.to_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfc_common::Buffer;

    fn sample() -> ClassicCard {
        let valid = SectorRaw {
            blocks: vec![ClassicBlock::new(Buffer::from([0x11; 16])); 4],
            key_a: Some(Buffer::from([0xFF; 6])),
            ..Default::default()
        };
        ClassicCard::new(
            vec![valid, SectorRaw::unauthorized(), SectorRaw::invalid("card lost")],
            true,
            SubType::Plus,
        )
    }

    #[test]
    fn test_accessors() {
        let card = sample();
        assert_eq!(card.sectors().len(), 3);
        assert!(card.is_partial_read());
        assert_eq!(card.sub_type(), SubType::Plus);
        assert_eq!(card.block(0, 2).unwrap().data().as_slice(), &[0x11; 16]);
        assert!(card.block(1, 0).is_none());
        assert!(card.block(7, 0).is_none());
        assert_eq!(card.sector(2), Some(&Sector::Invalid("card lost".to_string())));
    }

    #[test]
    fn test_json_round_trip() {
        let card = sample();
        let json = serde_json::to_string(&card).unwrap();
        assert!(json.contains("\"isPartialRead\":true"));
        assert!(json.contains("\"subType\":\"Plus\""));
        let back: ClassicCard = serde_json::from_str(&json).unwrap();
        assert_eq!(back, card);
    }
}
