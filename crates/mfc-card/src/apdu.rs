//! PC/SC pseudo-APDUs for contactless storage cards
//!
//! PC/SC Part 3 reserves class `FF` for commands handled by the reader
//! itself: reading the UID, loading MIFARE keys into the reader and running
//! CRYPTO1 authentication and block reads on the card's behalf.

use crate::transceiver::CardTransceiver;
use crate::CardError;

/// APDU response containing data and status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    /// Response data (without status word)
    pub data: Vec<u8>,
    pub sw1: u8,
    pub sw2: u8,
}

impl ApduResponse {
    /// Split a raw reply into data and status word
    pub fn parse(raw: &[u8]) -> Result<Self, CardError> {
        if raw.len() < 2 {
            return Err(CardError::Transceive(format!(
                "short APDU response ({} bytes)",
                raw.len()
            )));
        }
        let (data, sw) = raw.split_at(raw.len() - 2);
        Ok(Self {
            data: data.to_vec(),
            sw1: sw[0],
            sw2: sw[1],
        })
    }

    /// Check if the response indicates success (9000)
    pub fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    pub fn status_word(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Get status word as hex string (e.g., "9000")
    pub fn status_string(&self) -> String {
        format!("{:02X}{:02X}", self.sw1, self.sw2)
    }
}

/// APDU command builder
#[derive(Debug, Clone)]
pub struct ApduCommand {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Vec<u8>,
    le: Option<u8>,
}

impl ApduCommand {
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    /// Set command data
    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Set expected response length
    pub fn le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Build the APDU command bytes
    pub fn build(&self) -> Vec<u8> {
        let mut apdu = vec![self.cla, self.ins, self.p1, self.p2];

        if !self.data.is_empty() {
            apdu.push(self.data.len() as u8);
            apdu.extend_from_slice(&self.data);
        }

        if let Some(le) = self.le {
            apdu.push(le);
        }

        apdu
    }

    /// Send this command through a transceiver and parse the status word
    pub fn send<T: CardTransceiver + ?Sized>(
        &self,
        tag: &mut T,
    ) -> Result<ApduResponse, CardError> {
        let raw = tag.transceive(&self.build())?;
        ApduResponse::parse(&raw)
    }
}

/// Reader-handled commands (PC/SC Part 3, class FF)
pub mod commands {
    use super::ApduCommand;

    /// Key slot in reader memory used for MIFARE keys.
    pub const KEY_SLOT: u8 = 0x00;

    /// GET DATA: card UID
    pub fn get_uid() -> ApduCommand {
        ApduCommand::new(0xFF, 0xCA, 0x00, 0x00).le(0x00)
    }

    /// LOAD KEYS into volatile reader memory
    pub fn load_key(slot: u8, key: &[u8]) -> ApduCommand {
        ApduCommand::new(0xFF, 0x82, 0x00, slot).data(key.to_vec())
    }

    /// GENERAL AUTHENTICATE against one block with a loaded key.
    /// `key_type` is 0x60 for key A and 0x61 for key B.
    pub fn general_authenticate(block: u16, key_type: u8, slot: u8) -> ApduCommand {
        ApduCommand::new(0xFF, 0x86, 0x00, 0x00).data(vec![
            0x01,
            (block >> 8) as u8,
            block as u8,
            key_type,
            slot,
        ])
    }

    /// READ BINARY of one 16-byte block
    pub fn read_binary(block: u16) -> ApduCommand {
        ApduCommand::new(0xFF, 0xB0, (block >> 8) as u8, block as u8).le(0x10)
    }
}
