use std::path::Path;

use anyhow::bail;
use mfc_card::{CardReader, ClassicReader, DecoderRegistry};
use tracing::info;

use crate::formatters::FormatMode;

use super::{emit, scan_tag, ConsoleFeedback, ScanOptions};

pub fn cmd_read(
    options: &ScanOptions,
    reader_name: Option<&str>,
    format_mode: FormatMode,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let config = options.scan_config()?;
    let retriever = options.retriever()?;
    let decoders = DecoderRegistry::new();
    let scanner = ClassicReader::new(&*retriever, &decoders).with_config(config);

    let reader = match CardReader::new() {
        Ok(r) => r,
        Err(err) => bail!("Failed to establish PC/SC context: {err}"),
    };

    let connected = match reader_name {
        Some(name) => reader.connect(name),
        None => reader.connect_first(),
    };
    let tag = match connected {
        Ok(tag) => tag,
        Err(err) => {
            eprintln!("Please ensure a card is present on the reader");
            bail!("Failed to connect to card: {err}");
        }
    };

    eprintln!("Reader: {}", tag.reader_name());
    info!(atr = %tag.atr(), "card connected");

    let mut feedback = ConsoleFeedback::default();
    let Some(card) = scan_tag(tag, &scanner, &mut feedback) else {
        bail!("Card is neither a MIFARE Classic nor a MIFARE Plus in security level 3");
    };
    if card.is_partial_read() {
        eprintln!("Card was removed before the scan finished; output is partial");
    }

    emit(&card, format_mode, output)
}
