//! In-memory cards for driving the reader without hardware

#![allow(dead_code)]

use mfc_card::access_bits::{slot_for_block, AccessBits, TRAILER_SLOT};
use mfc_card::crypto::{aes_cbc_decrypt, aes_cbc_encrypt};
use mfc_card::plus::{rotate_left, PlusSession};
use mfc_card::sector::UNAUTHORIZED_SENTINEL;
use mfc_card::tech::{block_count_in_sector, block_to_sector, sector_to_block};
use mfc_card::{CardError, CardTransceiver, ClassicCardTech, SubType};
use mfc_common::Buffer;
use mfc_keys::{KeyType, SectorKey};

pub const KEY_FF: [u8; 6] = [0xFF; 6];
pub const KEY_MAD: [u8; 6] = [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5];

/// Data block contents used by the virtual cards: every byte is the block number.
pub fn block_pattern(block: usize) -> [u8; 16] {
    [block as u8; 16]
}

pub struct VirtualSector {
    pub key_a: [u8; 6],
    pub key_b: [u8; 6],
    pub access: AccessBits,
}

impl VirtualSector {
    pub fn transport() -> Self {
        Self {
            key_a: KEY_FF,
            key_b: KEY_FF,
            access: AccessBits::default(),
        }
    }
}

/// A MIFARE Classic card that behaves the way the silicon does: access
/// bits gate reads, key A never reads back from the trailer, and a readable
/// key B cannot authenticate.
pub struct VirtualClassic {
    pub uid: Buffer,
    pub sectors: Vec<VirtualSector>,
    /// Every authentication attempt as (sector, key type, key).
    pub auth_log: Vec<(usize, KeyType, Buffer)>,
    /// Authentication of this sector fails as if the card left the field.
    pub lose_at_sector: Option<usize>,
    /// Number of upcoming reads that drop the session and answer the sentinel.
    pub flaky_reads: usize,
    /// Number of upcoming key A authentications rejected even with the right key.
    pub key_a_rejections: usize,
    /// Behave like a clone: a readable key B authenticates, but every read
    /// under key B answers the sentinel.
    pub clone_key_b: bool,
    /// Reading this block fails with a transceive error.
    pub transceive_error_at_block: Option<usize>,
    authed: Option<(usize, KeyType)>,
}

impl VirtualClassic {
    pub fn new(sectors: Vec<VirtualSector>) -> Self {
        Self {
            uid: Buffer::from([0x04, 0x11, 0x22, 0x33]),
            sectors,
            auth_log: Vec::new(),
            lose_at_sector: None,
            flaky_reads: 0,
            key_a_rejections: 0,
            clone_key_b: false,
            transceive_error_at_block: None,
            authed: None,
        }
    }

    pub fn transport(sector_count: usize) -> Self {
        Self::new((0..sector_count).map(|_| VirtualSector::transport()).collect())
    }

    pub fn attempts_for(&self, sector: usize) -> usize {
        self.auth_log.iter().filter(|(s, _, _)| *s == sector).count()
    }

    fn trailer(&self, sector: &VirtualSector) -> Buffer {
        let mut out = vec![0u8; 6];
        out.extend_from_slice(&sector.access.raw());
        if sector.access.is_key_b_readable() {
            out.extend_from_slice(&sector.key_b);
        } else {
            out.extend_from_slice(&[0u8; 6]);
        }
        Buffer::from(out)
    }
}

impl ClassicCardTech for VirtualClassic {
    fn authenticate(&mut self, sector: usize, key: &SectorKey) -> Result<bool, CardError> {
        if self.lose_at_sector == Some(sector) {
            return Err(CardError::CardLost("tag left the field".to_string()));
        }
        self.auth_log.push((sector, key.key_type, key.key.clone()));
        self.authed = None;

        let Some(s) = self.sectors.get(sector) else {
            return Ok(false);
        };
        let ok = match key.key_type {
            KeyType::B => {
                (self.clone_key_b || !s.access.is_key_b_readable()) && key.key.as_slice() == s.key_b
            }
            _ if self.key_a_rejections > 0 => {
                self.key_a_rejections -= 1;
                false
            }
            _ => key.key.as_slice() == s.key_a,
        };
        if ok {
            self.authed = Some((sector, key.key_type.canon()));
        }
        Ok(ok)
    }

    fn read_block(&mut self, block: usize) -> Result<Buffer, CardError> {
        if self.transceive_error_at_block == Some(block) {
            return Err(CardError::Transceive(format!("no answer reading block {block}")));
        }
        let sector = block_to_sector(block);
        let Some((authed_sector, key_type)) = self.authed else {
            return Ok(Buffer::from([UNAUTHORIZED_SENTINEL]));
        };
        if authed_sector != sector || (self.clone_key_b && key_type == KeyType::B) {
            return Ok(Buffer::from([UNAUTHORIZED_SENTINEL]));
        }
        if self.flaky_reads > 0 {
            self.flaky_reads -= 1;
            self.authed = None;
            return Ok(Buffer::from([UNAUTHORIZED_SENTINEL]));
        }

        let s = &self.sectors[sector];
        let slot = slot_for_block(block - sector_to_block(sector), block_count_in_sector(sector));
        if slot == TRAILER_SLOT {
            return Ok(self.trailer(s));
        }
        if s.access.is_data_block_readable(slot, key_type) {
            Ok(Buffer::from(block_pattern(block)))
        } else {
            Ok(Buffer::from([UNAUTHORIZED_SENTINEL]))
        }
    }

    fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    fn tag_id(&self) -> Buffer {
        self.uid.clone()
    }

    fn sub_type(&self) -> SubType {
        SubType::Classic
    }
}

/// Card side of the MIFARE Plus SL3 secure channel.
pub struct VirtualPlus {
    pub uid: Buffer,
    pub sector_count: usize,
    pub key_a: [u8; 16],
    pub rnd_b: [u8; 16],
    pub ti: [u8; 4],
    /// Blocks the card refuses to read.
    pub refused_blocks: Vec<usize>,
    /// Every frame received.
    pub frames: Vec<Vec<u8>>,
    /// RndA as decrypted from the last AuthenticateSecond.
    pub last_rnd_a: Option<[u8; 16]>,
    pub mac_failures: usize,
    pending_sector: Option<usize>,
    session: Option<PlusSession>,
}

const STATUS_OK: u8 = 0x90;
const STATUS_AUTH_ERROR: u8 = 0x06;

impl VirtualPlus {
    pub fn new(sector_count: usize, key_a: [u8; 16]) -> Self {
        Self {
            uid: Buffer::from([0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6]),
            sector_count,
            key_a,
            rnd_b: [0x5A; 16],
            ti: [0xCA, 0xFE, 0x01, 0x02],
            refused_blocks: Vec::new(),
            frames: Vec::new(),
            last_rnd_a: None,
            mac_failures: 0,
            pending_sector: None,
            session: None,
        }
    }

    fn error() -> Buffer {
        Buffer::from([STATUS_AUTH_ERROR])
    }

    fn auth_first(&mut self, data: &[u8]) -> Buffer {
        self.session = None;
        let key_num = u16::from_le_bytes([data[1], data[2]]);
        let sector = usize::from((key_num - 0x4000) / 2);
        // Only key A is provisioned
        if key_num % 2 != 0 || sector >= self.sector_count {
            return Self::error();
        }
        self.pending_sector = Some(sector);
        let enc = aes_cbc_encrypt(&self.rnd_b, &self.key_a).unwrap();
        Buffer::from([STATUS_OK]).concat(&enc)
    }

    fn auth_second(&mut self, data: &[u8]) -> Buffer {
        if self.pending_sector.take().is_none() || data.len() != 33 {
            return Self::error();
        }
        let plain = aes_cbc_decrypt(&data[1..33], &self.key_a).unwrap();
        if plain[16..32] != rotate_left(&self.rnd_b)[..] {
            return Self::error();
        }
        let mut rnd_a = [0u8; 16];
        rnd_a.copy_from_slice(&plain[..16]);
        self.last_rnd_a = Some(rnd_a);

        let mut kmac_input = Vec::with_capacity(16);
        kmac_input.extend_from_slice(&rnd_a[7..12]);
        kmac_input.extend_from_slice(&self.rnd_b[7..12]);
        kmac_input.extend(rnd_a[..5].iter().zip(&self.rnd_b[..5]).map(|(a, b)| a ^ b));
        kmac_input.push(0x22);
        let mut kmac = [0u8; 16];
        kmac.copy_from_slice(&aes_cbc_encrypt(&kmac_input, &self.key_a).unwrap());
        self.session = Some(PlusSession {
            kmac,
            ti: self.ti,
            rctr: 0,
        });

        let mut response = self.ti.to_vec();
        response.extend_from_slice(&rotate_left(&rnd_a));
        response.extend_from_slice(&[0u8; 12]);
        Buffer::from([STATUS_OK]).concat(&aes_cbc_encrypt(&response, &self.key_a).unwrap())
    }

    fn read(&mut self, data: &[u8]) -> Buffer {
        let Some(session) = self.session.as_mut() else {
            return Self::error();
        };
        let expected = session.command_mac(&data[..4]).unwrap();
        session.rctr = session.rctr.wrapping_add(1);
        if data.len() != 12 || data[4..12] != expected {
            self.mac_failures += 1;
            return Self::error();
        }
        let block = usize::from(data[1]) | usize::from(data[2]) << 8;
        if self.refused_blocks.contains(&block) {
            return Self::error();
        }
        let mut reply = vec![STATUS_OK];
        reply.extend_from_slice(&block_pattern(block));
        reply.extend_from_slice(&[0u8; 8]);
        Buffer::from(reply)
    }
}

impl CardTransceiver for VirtualPlus {
    fn transceive(&mut self, data: &[u8]) -> Result<Buffer, CardError> {
        self.frames.push(data.to_vec());
        let reply = match data.first() {
            Some(0x70) => self.auth_first(data),
            Some(0x72) => self.auth_second(data),
            Some(0x33) => self.read(data),
            _ => Self::error(),
        };
        Ok(reply)
    }

    fn uid(&self) -> Buffer {
        self.uid.clone()
    }
}
