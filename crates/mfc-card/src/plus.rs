//! MIFARE Plus (security level 3) sector access
//!
//! In security level 3 a Plus card replaces CRYPTO1 with AES-128. Each
//! sector key is addressed by a key number, authentication is a three pass
//! mutual challenge (AuthenticateFirst / AuthenticateSecond), and every
//! subsequent read carries an 8-byte CMAC over a read counter that both
//! sides advance in lock step.

use mfc_common::Buffer;
use mfc_keys::{KeyType, SectorKey, AES_KEY_LEN};
use rand::RngCore;
use tracing::{debug, trace, warn};

use crate::card::SubType;
use crate::config::NonceSource;
use crate::crypto::{aes_cbc_decrypt, aes_cbc_encrypt, aes_cmac, AES_BLOCK_LEN};
use crate::sector::UNAUTHORIZED_SENTINEL;
use crate::tech::{ClassicCardTech, LARGE_SECTOR_START};
use crate::transceiver::CardTransceiver;
use crate::CardError;

const CMD_AUTH_FIRST: u8 = 0x70;
const CMD_AUTH_SECOND: u8 = 0x72;
const CMD_READ_MACED: u8 = 0x33;
const STATUS_OK: u8 = 0x90;

/// Key numbers for sector keys start here; key B is `+ 1`.
const SECTOR_KEY_BASE: u16 = 0x4000;

/// Length of PCDcap2 in AuthenticateFirst (all zero).
const PCD_CAP_LEN: u8 = 0x06;

/// Secure-channel state established by a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlusSession {
    /// Session MAC key.
    pub kmac: [u8; AES_BLOCK_LEN],
    /// Transaction identifier chosen by the card.
    pub ti: [u8; 4],
    /// Read counter, advanced after every MACed command.
    pub rctr: u16,
}

impl PlusSession {
    /// 8-byte MAC of a command: CMAC over `cmd[0] || rctr || ti || cmd[1..]`,
    /// keeping the odd-indexed bytes of the tag.
    pub fn command_mac(&self, cmd: &[u8]) -> Result<[u8; 8], CardError> {
        let mut mac_data = Vec::with_capacity(cmd.len() + 6);
        mac_data.push(cmd[0]);
        mac_data.extend_from_slice(&self.rctr.to_le_bytes());
        mac_data.extend_from_slice(&self.ti);
        mac_data.extend_from_slice(&cmd[1..]);
        Ok(truncate_mac(&aes_cmac(&mac_data, &self.kmac)?))
    }
}

/// Keep bytes 1, 3, .., 15 of a CMAC tag.
pub fn truncate_mac(tag: &[u8; AES_BLOCK_LEN]) -> [u8; 8] {
    let mut out = [0u8; 8];
    for (i, b) in out.iter_mut().enumerate() {
        *b = tag[2 * i + 1];
    }
    out
}

/// Rotate left by one byte.
pub fn rotate_left(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    if !out.is_empty() {
        out.rotate_left(1);
    }
    out
}

/// Key number of a sector key.
pub fn key_number(sector: usize, key_type: KeyType) -> u16 {
    let b = if key_type == KeyType::B { 1 } else { 0 };
    SECTOR_KEY_BASE + 2 * sector as u16 + b
}

fn auth_first_command(key_num: u16) -> [u8; 10] {
    let [lo, hi] = key_num.to_le_bytes();
    [CMD_AUTH_FIRST, lo, hi, PCD_CAP_LEN, 0, 0, 0, 0, 0, 0]
}

/// Session MAC key derivation input:
/// `RndA[7..12] || RndB[7..12] || (RndA[0..5] ^ RndB[0..5]) || 0x22`.
fn kmac_input(rnd_a: &[u8], rnd_b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(AES_BLOCK_LEN);
    out.extend_from_slice(&rnd_a[7..12]);
    out.extend_from_slice(&rnd_b[7..12]);
    out.extend(rnd_a[..5].iter().zip(&rnd_b[..5]).map(|(a, b)| a ^ b));
    out.push(0x22);
    out
}

/// A MIFARE Plus card in security level 3 behind a raw transceiver.
pub struct PlusProtocol<T: CardTransceiver> {
    tag: T,
    sector_count: usize,
    session: Option<PlusSession>,
    nonce_source: NonceSource,
}

impl<T: CardTransceiver> PlusProtocol<T> {
    /// Probe the card and work out its capacity.
    ///
    /// Returns `None` when sector 0 does not answer AuthenticateFirst, or on
    /// any transport error. A card that also answers for sector 32 has 40
    /// sectors, otherwise 32.
    pub fn connect(mut tag: T) -> Option<Self> {
        match Self::probe_capacity(&mut tag) {
            Ok(Some(sector_count)) => {
                debug!(sector_count, "MIFARE Plus SL3 card detected");
                Some(Self {
                    tag,
                    sector_count,
                    session: None,
                    nonce_source: NonceSource::default(),
                })
            }
            Ok(None) => None,
            Err(e) => {
                debug!(error = %e, "MIFARE Plus probe failed");
                None
            }
        }
    }

    fn probe_capacity(tag: &mut T) -> Result<Option<usize>, CardError> {
        if !Self::sector_present(tag, 0)? {
            return Ok(None);
        }
        let count = if Self::sector_present(tag, LARGE_SECTOR_START)? {
            40
        } else {
            32
        };
        Ok(Some(count))
    }

    fn sector_present(tag: &mut T, sector: usize) -> Result<bool, CardError> {
        let reply = tag.transceive(&auth_first_command(key_number(sector, KeyType::A)))?;
        Ok(reply.len() == 17 && reply[0] == STATUS_OK)
    }

    pub fn with_nonce_source(mut self, nonce_source: NonceSource) -> Self {
        self.nonce_source = nonce_source;
        self
    }

    /// Current secure-channel state, if a sector is authenticated.
    pub fn session(&self) -> Option<&PlusSession> {
        self.session.as_ref()
    }

    pub fn into_inner(self) -> T {
        self.tag
    }

    fn rnd_a(&self) -> [u8; AES_BLOCK_LEN] {
        let mut rnd_a = [0u8; AES_BLOCK_LEN];
        match self.nonce_source {
            NonceSource::Deterministic => {
                for (i, b) in rnd_a.iter_mut().enumerate() {
                    *b = (i * i) as u8;
                }
            }
            NonceSource::Random => rand::thread_rng().fill_bytes(&mut rnd_a),
        }
        rnd_a
    }
}

impl<T: CardTransceiver> ClassicCardTech for PlusProtocol<T> {
    fn authenticate(&mut self, sector: usize, key: &SectorKey) -> Result<bool, CardError> {
        if key.key.len() != AES_KEY_LEN {
            return Ok(false);
        }
        let key_bytes = key.key.as_slice();
        self.session = None;

        let reply = self
            .tag
            .transceive(&auth_first_command(key_number(sector, key.key_type)))?;
        if reply.len() != 17 || reply[0] != STATUS_OK {
            warn!(sector, reply = %reply, "AuthenticateFirst rejected");
            return Ok(false);
        }

        let rnd_a = self.rnd_a();
        let rnd_b = aes_cbc_decrypt(&reply[1..17], key_bytes)?;

        let mut challenge = rnd_a.to_vec();
        challenge.extend_from_slice(&rotate_left(&rnd_b));
        let mut cmd = vec![CMD_AUTH_SECOND];
        cmd.extend_from_slice(&aes_cbc_encrypt(&challenge, key_bytes)?);

        let reply = self.tag.transceive(&cmd)?;
        if reply.len() < 33 {
            warn!(sector, reply = %reply, "AuthenticateSecond reply too short");
            return Ok(false);
        }

        let response = aes_cbc_decrypt(&reply[1..33], key_bytes)?;
        if response[4..20] != rotate_left(&rnd_a)[..] {
            debug!(sector, "RndA' mismatch");
            return Ok(false);
        }

        let kmac = aes_cbc_encrypt(&kmac_input(&rnd_a, &rnd_b), key_bytes)?;
        let mut session = PlusSession {
            kmac: [0; AES_BLOCK_LEN],
            ti: [0; 4],
            rctr: 0,
        };
        session.kmac.copy_from_slice(&kmac);
        session.ti.copy_from_slice(&response[..4]);
        trace!(sector, ti = %hex::encode(session.ti), "secure channel established");
        self.session = Some(session);
        Ok(true)
    }

    fn read_block(&mut self, block: usize) -> Result<Buffer, CardError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| CardError::Transceive("no authenticated sector".to_string()))?;

        let cmd = [CMD_READ_MACED, block as u8, (block >> 8) as u8, 0x01];
        let mac = session.command_mac(&cmd)?;
        // The card advances its counter for every command it sees
        session.rctr = session.rctr.wrapping_add(1);

        let mut frame = cmd.to_vec();
        frame.extend_from_slice(&mac);
        let reply = self.tag.transceive(&frame)?;

        match reply.first() {
            Some(&STATUS_OK) if reply.len() >= 17 => Ok(reply.slice(1, 16)),
            Some(&status) if status != STATUS_OK => {
                debug!(block, status, "read refused");
                Ok(Buffer::from([UNAUTHORIZED_SENTINEL]))
            }
            _ => Err(CardError::Transceive(format!(
                "short read reply for block {block}: {reply}"
            ))),
        }
    }

    fn sector_count(&self) -> usize {
        self.sector_count
    }

    fn tag_id(&self) -> Buffer {
        self.tag.uid()
    }

    fn sub_type(&self) -> SubType {
        SubType::Plus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_key_numbers() {
        assert_eq!(key_number(0, KeyType::A), 0x4000);
        assert_eq!(key_number(0, KeyType::B), 0x4001);
        assert_eq!(key_number(32, KeyType::Unknown), 0x4040);
        assert_eq!(auth_first_command(0x4041), hex!("70 41 40 06 00 00 00 00 00 00"));
    }

    #[test]
    fn test_rotate_and_truncate() {
        assert_eq!(rotate_left(&[1, 2, 3]), vec![2, 3, 1]);
        assert!(rotate_left(&[]).is_empty());
        let tag: [u8; 16] = core::array::from_fn(|i| i as u8);
        assert_eq!(truncate_mac(&tag), [1, 3, 5, 7, 9, 11, 13, 15]);
    }

    #[test]
    fn test_kmac_input_layout() {
        let rnd_a: [u8; 16] = core::array::from_fn(|i| (i * i) as u8);
        let rnd_b = [0xAA; 16];
        let input = kmac_input(&rnd_a, &rnd_b);
        assert_eq!(input.len(), 16);
        assert_eq!(&input[..5], &rnd_a[7..12]);
        assert_eq!(&input[5..10], &[0xAA; 5]);
        assert_eq!(&input[10..15], &[0xAA, 0xAB, 0xAE, 0xA3, 0xBA]);
        assert_eq!(input[15], 0x22);
    }

    #[test]
    fn test_command_mac_changes_with_counter() {
        let mut session = PlusSession {
            kmac: [0x42; 16],
            ti: [1, 2, 3, 4],
            rctr: 0,
        };
        let cmd = [CMD_READ_MACED, 4, 0, 1];
        let first = session.command_mac(&cmd).unwrap();

        let mut expected_input = vec![0x33, 0x00, 0x00, 1, 2, 3, 4, 4, 0, 1];
        assert_eq!(first, truncate_mac(&aes_cmac(&expected_input, &[0x42; 16]).unwrap()));

        session.rctr = 1;
        let second = session.command_mac(&cmd).unwrap();
        expected_input[1] = 0x01;
        assert_eq!(second, truncate_mac(&aes_cmac(&expected_input, &[0x42; 16]).unwrap()));
        assert_ne!(first, second);
    }
}
