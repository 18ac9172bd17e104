use std::path::{Path, PathBuf};

use crate::card_worker::{CardCommand, CardEvent, CardWorker};
use crate::formatters::FormatMode;

use super::{emit, ScanOptions};

/// Scan every card presented to the reader until `count` cards have been
/// read, or forever.
pub fn cmd_watch(
    options: &ScanOptions,
    reader_name: Option<String>,
    format_mode: FormatMode,
    output_dir: Option<&Path>,
    count: Option<usize>,
) -> anyhow::Result<()> {
    let config = options.scan_config()?;
    let retriever = options.retriever()?;
    let (events, commands) = CardWorker::spawn(reader_name, config, retriever);

    eprintln!("Waiting for cards ({} output)...", format_mode.description());
    let mut read = 0;
    let mut last_step = None;

    for event in events {
        match event {
            CardEvent::ReaderAvailable => eprintln!("Reader available"),
            CardEvent::ReaderUnavailable { error } => eprintln!("Reader unavailable: {error}"),
            CardEvent::CardDetected { reader_name, uid } => {
                eprintln!("Card {uid} on {reader_name}");
                last_step = None;
            }
            CardEvent::Status { .. } => {}
            CardEvent::Progress { progress, max } if max > 0 => {
                let percent = progress * 100 / max;
                if last_step != Some(percent / 10) {
                    eprintln!("  {percent:3}%");
                    last_step = Some(percent / 10);
                }
            }
            CardEvent::Progress { .. } => {}
            CardEvent::CardType { info } => eprintln!("Card type: {}", info.name),
            CardEvent::CardRead { card } => {
                read += 1;
                let path = output_dir.map(|dir| card_path(dir, read, format_mode));
                emit(&card, format_mode, path.as_deref())?;
                if count.is_some_and(|n| read >= n) {
                    let _ = commands.send(CardCommand::Stop);
                    break;
                }
                eprintln!("Remove the card to scan the next one");
            }
            CardEvent::CardRemoved => eprintln!("Card removed"),
            CardEvent::Error { message } => eprintln!("Error: {message}"),
        }
    }
    Ok(())
}

fn card_path(dir: &Path, index: usize, mode: FormatMode) -> PathBuf {
    let ext = match mode {
        FormatMode::Json => "json",
        FormatMode::Raw | FormatMode::Human => "txt",
    };
    dir.join(format!("card-{index:04}.{ext}"))
}
