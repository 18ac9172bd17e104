//! MIFARE Classic through reader firmware
//!
//! CRYPTO1 runs inside the PC/SC reader. The host loads a key into a reader
//! key slot, asks the reader to authenticate a block with it and then reads
//! blocks with READ BINARY.

use mfc_common::Buffer;
use mfc_keys::{KeyType, SectorKey, CRYPTO1_KEY_LEN};
use tracing::{debug, trace};

use crate::apdu::commands;
use crate::atr::parse_storage_atr;
use crate::card::SubType;
use crate::sector::{BLOCK_LEN, UNAUTHORIZED_SENTINEL};
use crate::tech::ClassicCardTech;
use crate::transceiver::CardTransceiver;
use crate::CardError;

const KEY_TYPE_A: u8 = 0x60;
const KEY_TYPE_B: u8 = 0x61;

pub struct PcscClassic<T: CardTransceiver> {
    tag: T,
    sector_count: usize,
}

impl<T: CardTransceiver> PcscClassic<T> {
    pub fn new(tag: T, sector_count: usize) -> Self {
        Self { tag, sector_count }
    }

    /// Wrap a tag whose storage-card ATR names a MIFARE Classic compatible card.
    pub fn from_atr(tag: T, atr: &[u8]) -> Option<Self> {
        let sector_count = parse_storage_atr(atr)?.card_name.sector_count()?;
        Some(Self::new(tag, sector_count))
    }

    pub fn into_inner(self) -> T {
        self.tag
    }
}

impl<T: CardTransceiver> ClassicCardTech for PcscClassic<T> {
    fn authenticate(&mut self, sector: usize, key: &SectorKey) -> Result<bool, CardError> {
        if key.key.len() != CRYPTO1_KEY_LEN {
            return Ok(false);
        }

        let resp = commands::load_key(commands::KEY_SLOT, &key.key).send(&mut self.tag)?;
        if !resp.is_success() {
            debug!(sw = %resp.status_string(), "LOAD KEYS rejected");
            return Ok(false);
        }

        let key_type = match key.key_type {
            KeyType::B => KEY_TYPE_B,
            _ => KEY_TYPE_A,
        };
        let block = self.sector_to_block(sector) as u16;
        let resp = commands::general_authenticate(block, key_type, commands::KEY_SLOT)
            .send(&mut self.tag)?;
        trace!(sector, sw = %resp.status_string(), "GENERAL AUTHENTICATE");
        Ok(resp.is_success())
    }

    fn read_block(&mut self, block: usize) -> Result<Buffer, CardError> {
        let resp = commands::read_binary(block as u16).send(&mut self.tag)?;
        if resp.is_success() && resp.data.len() == BLOCK_LEN {
            Ok(Buffer::from(resp.data))
        } else {
            debug!(block, sw = %resp.status_string(), "READ BINARY refused");
            Ok(Buffer::from([UNAUTHORIZED_SENTINEL]))
        }
    }

    fn sector_count(&self) -> usize {
        self.sector_count
    }

    fn tag_id(&self) -> Buffer {
        self.tag.uid()
    }

    fn sub_type(&self) -> SubType {
        SubType::Classic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    /// Reader that accepts one key and records every APDU.
    struct ScriptedReader {
        key: [u8; 6],
        loaded: Option<Vec<u8>>,
        sent: Vec<Vec<u8>>,
    }

    impl CardTransceiver for ScriptedReader {
        fn transceive(&mut self, data: &[u8]) -> Result<Buffer, CardError> {
            self.sent.push(data.to_vec());
            let reply = match data[1] {
                0x82 => {
                    self.loaded = Some(data[5..].to_vec());
                    vec![0x90, 0x00]
                }
                0x86 if self.loaded.as_deref() == Some(&self.key[..]) => vec![0x90, 0x00],
                0x86 => vec![0x63, 0x00],
                0xB0 => {
                    let mut block = vec![data[3]; 16];
                    block.extend_from_slice(&[0x90, 0x00]);
                    block
                }
                _ => vec![0x6D, 0x00],
            };
            Ok(Buffer::from(reply))
        }

        fn uid(&self) -> Buffer {
            Buffer::from([0xDE, 0xAD, 0xBE, 0xEF])
        }
    }

    fn tech() -> PcscClassic<ScriptedReader> {
        let reader = ScriptedReader {
            key: [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5],
            loaded: None,
            sent: Vec::new(),
        };
        PcscClassic::from_atr(reader, &hex!("3B8F8001804F0CA000000306030001000000006A")).unwrap()
    }

    #[test]
    fn test_authenticate_sends_pcsc_commands() {
        let mut tech = tech();
        assert_eq!(tech.sector_count(), 16);
        let key = SectorKey::from_hex("a0a1a2a3a4a5", KeyType::B, "mad").unwrap();
        assert!(tech.authenticate(2, &key).unwrap());

        let sent = tech.into_inner().sent;
        assert_eq!(sent[0], hex!("FF82000006A0A1A2A3A4A5"));
        assert_eq!(sent[1], hex!("FF860000050100086100"));
    }

    #[test]
    fn test_wrong_and_aes_keys_fail() {
        let mut tech = tech();
        let wrong = SectorKey::from_hex("ffffffffffff", KeyType::A, "ff").unwrap();
        assert!(!tech.authenticate(0, &wrong).unwrap());
        let aes =
            SectorKey::from_hex("a0a1a2a3a4a5a6a7a0a1a2a3a4a5a6a7", KeyType::A, "aes").unwrap();
        assert!(!tech.authenticate(0, &aes).unwrap());
    }

    #[test]
    fn test_read_block() {
        let mut tech = tech();
        assert_eq!(tech.read_block(5).unwrap().as_slice(), &[5u8; 16]);
        assert_eq!(tech.tag_id().to_hex(), "deadbeef");
    }
}
