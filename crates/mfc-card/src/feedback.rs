//! Decoder feedback
//!
//! Transit-format decoders live outside this crate. The reader polls them
//! after every sector so that a decoder that recognises the card early can
//! steer key search for the remaining sectors.

use mfc_keys::KeyType;

use crate::card::SubType;
use crate::sector::Sector;

/// What a decoder says about a card it recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardInfo {
    pub name: String,
    pub location: Option<String>,
}

impl CardInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
        }
    }
}

/// Progress sink for a scan. Purely observational.
pub trait TagReaderFeedback {
    fn update_status_text(&mut self, _text: &str) {}

    fn update_progress_bar(&mut self, _progress: usize, _max: usize) {}

    fn show_card_type(&mut self, _info: &CardInfo) {}
}

/// Feedback sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFeedback;

impl TagReaderFeedback for NullFeedback {}

/// A transit-format decoder, as seen by the reader.
pub trait ClassicCardDecoder {
    /// Number of sectors `early_check` needs. `None` opts out of early
    /// detection.
    fn early_sectors(&self) -> Option<usize> {
        None
    }

    /// Whether the first `early_sectors` sectors belong to this format.
    fn early_check(&self, _sectors: &[Sector]) -> bool {
        false
    }

    fn early_card_info(&self, _sectors: &[Sector]) -> Option<CardInfo> {
        None
    }

    /// Whether `sector_index` uses keys unique to each physical card.
    fn is_dynamic_keys(
        &self,
        _sectors: &[Sector],
        _sector_index: usize,
        _key_type: KeyType,
    ) -> bool {
        false
    }
}

/// Decoders grouped by card sub-type.
#[derive(Default)]
pub struct DecoderRegistry {
    classic: Vec<Box<dyn ClassicCardDecoder>>,
    plus: Vec<Box<dyn ClassicCardDecoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sub_type: SubType, decoder: Box<dyn ClassicCardDecoder>) {
        match sub_type {
            SubType::Classic => self.classic.push(decoder),
            SubType::Plus => self.plus.push(decoder),
        }
    }

    pub fn decoders(&self, sub_type: SubType) -> &[Box<dyn ClassicCardDecoder>] {
        match sub_type {
            SubType::Classic => &self.classic,
            SubType::Plus => &self.plus,
        }
    }

    /// Poll the decoders that want exactly `sectors.len()` sectors. The
    /// first one that claims the card is announced on `feedback` and returned.
    pub fn early_check(
        &self,
        sub_type: SubType,
        sectors: &[Sector],
        feedback: &mut dyn TagReaderFeedback,
    ) -> Option<&dyn ClassicCardDecoder> {
        let count = sectors.len();
        for decoder in self.decoders(sub_type) {
            if decoder.early_sectors() != Some(count) || !decoder.early_check(sectors) {
                continue;
            }
            let Some(info) = decoder.early_card_info(sectors) else {
                continue;
            };
            feedback.show_card_type(&info);
            feedback.update_status_text(&format!("Reading {} card...", info.name));
            return Some(decoder.as_ref());
        }
        None
    }
}
