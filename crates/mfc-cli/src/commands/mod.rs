pub mod key_hash;
pub mod keys;
pub mod read;
pub mod readers;
pub mod watch;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use mfc_card::atr::parse_storage_atr;
use mfc_card::{
    CardInfo, CardTransceiver, ClassicCard, ClassicReader, NonceSource, PcscClassic, PcscTag,
    PlusProtocol, ScanConfig, TagReaderFeedback,
};
use mfc_common::Buffer;
use mfc_keys::file::parse_dictionary;
use mfc_keys::{DirectoryKeyRetriever, KeyRetriever, NoKeys};
use tracing::{debug, info};

use crate::formatters::{format_card, FormatMode};

/// Scan settings shared by `read` and `watch`.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub config: Option<PathBuf>,
    pub retries: Option<usize>,
    pub random_nonce: bool,
    pub keys: Option<PathBuf>,
    pub dictionary: Option<PathBuf>,
}

impl ScanOptions {
    /// Load the config file, then apply command-line overrides.
    pub fn scan_config(&self) -> anyhow::Result<ScanConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => ScanConfig::default(),
        };
        if let Some(retries) = self.retries {
            config.auth_retry_limit = retries;
        }
        if self.random_nonce {
            config.nonce_source = NonceSource::Random;
        }
        Ok(config)
    }

    pub fn dictionary(&self) -> anyhow::Result<Vec<Buffer>> {
        let Some(path) = &self.dictionary else {
            return Ok(Vec::new());
        };
        load_dictionary(path)
    }

    pub fn retriever(&self) -> anyhow::Result<Box<dyn KeyRetriever + Send>> {
        match &self.keys {
            Some(root) => {
                info!(root = %root.display(), "using key directory");
                Ok(Box::new(DirectoryKeyRetriever::new(root).with_dictionary(self.dictionary()?)))
            }
            None => Ok(Box::new(NoKeys)),
        }
    }
}

pub fn load_dictionary(path: &Path) -> anyhow::Result<Vec<Buffer>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading dictionary {}", path.display()))?;
    let keys = parse_dictionary(&text)
        .with_context(|| format!("parsing dictionary {}", path.display()))?;
    debug!(count = keys.len(), "dictionary loaded");
    Ok(keys)
}

/// Progress on stderr so that stdout carries only the card.
#[derive(Default)]
pub struct ConsoleFeedback {
    last_step: Option<usize>,
}

impl TagReaderFeedback for ConsoleFeedback {
    fn update_status_text(&mut self, text: &str) {
        debug!(status = text);
    }

    fn update_progress_bar(&mut self, progress: usize, max: usize) {
        if max == 0 {
            return;
        }
        // One line per 10%
        let percent = progress * 100 / max;
        if self.last_step != Some(percent / 10) {
            eprintln!("  {percent:3}%");
            self.last_step = Some(percent / 10);
        }
    }

    fn show_card_type(&mut self, info: &CardInfo) {
        match &info.location {
            Some(location) => eprintln!("Card type: {} ({location})", info.name),
            None => eprintln!("Card type: {}", info.name),
        }
    }
}

/// Scan whatever card sits on the reader.
///
/// Storage-card ATRs go through the reader's CRYPTO1 commands; anything
/// else is probed as a MIFARE Plus in security level 3.
pub fn scan_tag(
    tag: PcscTag,
    reader: &ClassicReader<'_>,
    feedback: &mut dyn TagReaderFeedback,
) -> Option<ClassicCard> {
    let atr = tag.atr().clone();
    if let Some(storage) = parse_storage_atr(&atr) {
        debug!(card_name = ?storage.card_name, "storage card");
        let mut tech = PcscClassic::from_atr(tag, &atr)?;
        return Some(reader.read_card(&mut tech, feedback));
    }

    let uid = tag.uid();
    let mut plus = PlusProtocol::connect(tag)?.with_nonce_source(reader.config().nonce_source);
    info!(uid = %uid, "MIFARE Plus SL3 card");
    Some(reader.read_card(&mut plus, feedback))
}

/// Write formatted output to a file, or stdout when no file is given.
pub fn emit(card: &ClassicCard, mode: FormatMode, output: Option<&Path>) -> anyhow::Result<()> {
    let text = format_card(card, mode)?;
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
