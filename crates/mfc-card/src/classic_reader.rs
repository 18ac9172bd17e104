//! Whole-card scan
//!
//! Sectors are read one after another. Each sector is authenticated, its
//! blocks read, and the decoders polled so that a recognised card format can
//! influence key search on later sectors. Failures stay local to their
//! sector except for a lost card, which ends the scan with what was read so
//! far.

use mfc_common::Buffer;
use mfc_keys::{KeyRetriever, KeyType, SectorKey};
use tracing::{debug, info, warn};

use crate::authenticator::ClassicAuthenticator;
use crate::card::ClassicCard;
use crate::config::ScanConfig;
use crate::feedback::{ClassicCardDecoder, DecoderRegistry, TagReaderFeedback};
use crate::plus::PlusProtocol;
use crate::sector::{ClassicBlock, Sector, SectorRaw};
use crate::tech::ClassicCardTech;
use crate::transceiver::CardTransceiver;
use crate::CardError;

/// ATQA values a MIFARE Plus in security level 3 may report (AN10833).
const PLUS_SL3_ATQA: [u16; 4] = [0x0002, 0x0004, 0x0042, 0x0044];
const PLUS_SL3_SAK: u8 = 0x20;

pub struct ClassicReader<'a> {
    retriever: &'a dyn KeyRetriever,
    decoders: &'a DecoderRegistry,
    config: ScanConfig,
}

impl<'a> ClassicReader<'a> {
    pub fn new(retriever: &'a dyn KeyRetriever, decoders: &'a DecoderRegistry) -> Self {
        Self {
            retriever,
            decoders,
            config: ScanConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    fn read_sector_with_key(
        &self,
        tech: &mut dyn ClassicCardTech,
        sector: usize,
        correct_key: &SectorKey,
        extra_key: Option<&SectorKey>,
    ) -> Result<SectorRaw, CardError> {
        let first_block = tech.sector_to_block(sector);
        let block_count = tech.block_count_in_sector(sector);
        let mut blocks = Vec::with_capacity(block_count);

        for offset in 0..block_count {
            let mut data = ClassicBlock::new(tech.read_block(first_block + offset)?);

            // Some cards drop the session and answer with the sentinel;
            // authenticating again usually recovers the read.
            for _ in 0..self.config.block_read_retries {
                if !data.is_unauthorized() {
                    break;
                }
                tech.authenticate(sector, correct_key)?;
                data = ClassicBlock::new(tech.read_block(first_block + offset)?);
            }
            blocks.push(data);
        }

        let extra = extra_key.map(|k| k.key.clone());
        let (key_a, key_b) = if correct_key.key_type == KeyType::B {
            (extra, Some(correct_key.key.clone()))
        } else {
            (Some(correct_key.key.clone()), extra)
        };
        Ok(SectorRaw {
            blocks,
            key_a,
            key_b,
            ..Default::default()
        })
    }

    /// Authenticate and read one sector, cross-checking with the other key
    /// type when the first key does not unlock everything.
    #[allow(clippy::too_many_arguments)]
    fn read_sector(
        &self,
        tech: &mut dyn ClassicCardTech,
        auth: &mut ClassicAuthenticator,
        feedback: &mut dyn TagReaderFeedback,
        sectors: &[Sector],
        card_type: Option<&dyn ClassicCardDecoder>,
        sector: usize,
        max_progress: usize,
    ) -> Result<Sector, CardError> {
        let expect_dynamic = |key_type: KeyType| {
            card_type.is_some_and(|d| d.is_dynamic_keys(sectors, sector, key_type))
        };

        let correct_key = auth.authenticate(
            tech,
            feedback,
            sector,
            expect_dynamic(KeyType::Unknown),
            KeyType::Unknown,
        )?;
        feedback.update_progress_bar(sector * 5 + 3, max_progress);

        let Some(correct_key) = correct_key else {
            debug!(sector, "no key, marking unauthorized");
            return Ok(Sector::Unauthorized);
        };

        feedback.update_status_text(&format!("Reading blocks of sector {sector}..."));
        let raw = self.read_sector_with_key(tech, sector, &correct_key, None)?;
        let mut result = Sector::from_raw(raw);
        let some_locked = result.blocks().iter().any(ClassicBlock::is_unauthorized);
        let all_locked = result.blocks().iter().all(ClassicBlock::is_unauthorized);

        if correct_key.key_type == KeyType::A && some_locked {
            // Key A may only be good for part of the sector
            let dynamic = expect_dynamic(KeyType::B);
            let key_b = auth.authenticate(tech, feedback, sector, dynamic, KeyType::B)?;
            if let Some(key_b) = key_b {
                debug!(sector, "re-reading with key B");
                let raw = self.read_sector_with_key(tech, sector, &key_b, Some(&correct_key))?;
                result = Sector::from_raw(raw);
            }
        } else if correct_key.key_type == KeyType::B && all_locked {
            // Some clones accept a readable key B for auth but then refuse every read
            let dynamic = expect_dynamic(KeyType::A);
            let key_a = auth.authenticate(tech, feedback, sector, dynamic, KeyType::A)?;
            if let Some(key_a) = key_a {
                debug!(sector, "re-reading with key A");
                let raw = self.read_sector_with_key(tech, sector, &key_a, Some(&correct_key))?;
                result = Sector::from_raw(raw);
            }
        }

        Ok(result)
    }

    /// Read every sector of the card.
    ///
    /// Never fails: sectors that could not be read are recorded as
    /// unauthorized or invalid, and a card that leaves the field yields a
    /// partial card.
    pub fn read_card(
        &self,
        tech: &mut dyn ClassicCardTech,
        feedback: &mut dyn TagReaderFeedback,
    ) -> ClassicCard {
        let sector_count = tech.sector_count();
        let sub_type = tech.sub_type();
        let max_progress = sector_count * 5;
        let tag_id: Buffer = tech.tag_id();

        info!(tag_id = %tag_id, sector_count, ?sub_type, "reading card");
        let mut auth = ClassicAuthenticator::make_authenticator(
            &tag_id,
            self.retriever,
            max_progress,
            self.config.auth_retry_limit,
        );

        let mut sectors: Vec<Sector> = Vec::with_capacity(sector_count);
        let mut card_type: Option<&dyn ClassicCardDecoder> = None;

        for sector in 0..sector_count {
            let read = self.read_sector(
                tech,
                &mut auth,
                feedback,
                &sectors,
                card_type,
                sector,
                max_progress,
            );
            match read {
                Ok(Sector::Unauthorized) => sectors.push(Sector::Unauthorized),
                Ok(result) => {
                    sectors.push(result);
                    if card_type.is_none() {
                        card_type = self.decoders.early_check(sub_type, &sectors, feedback);
                    }
                    feedback.update_progress_bar(sector * 5 + 4, max_progress);
                }
                Err(e @ CardError::CardLost(_)) => {
                    warn!(sector, error = %e, "tag lost");
                    sectors.push(Sector::Invalid(e.to_string()));
                    return ClassicCard::from_sectors(sectors, true, sub_type);
                }
                Err(e) => {
                    warn!(sector, error = %e, "sector read failed");
                    sectors.push(Sector::Invalid(e.to_string()));
                }
            }
        }

        ClassicCard::from_sectors(sectors, false, sub_type)
    }

    /// Read a MIFARE Plus card in security level 3.
    ///
    /// Returns `None` when the anticollision data does not describe an SL3
    /// card or the card does not answer the AES probe.
    pub fn read_plus_card<T: CardTransceiver>(
        &self,
        tag: T,
        feedback: &mut dyn TagReaderFeedback,
        atqa: u16,
        sak: u8,
    ) -> Option<ClassicCard> {
        if sak != PLUS_SL3_SAK || !PLUS_SL3_ATQA.contains(&atqa) {
            debug!(atqa, sak, "not a MIFARE Plus SL3 card");
            return None;
        }
        let mut protocol = PlusProtocol::connect(tag)?.with_nonce_source(self.config.nonce_source);
        Some(self.read_card(&mut protocol, feedback))
    }
}
