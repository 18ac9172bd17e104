use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use mfc_card::{
    CardInfo, CardReader, CardTransceiver, ClassicCard, ClassicReader, DecoderRegistry, PcscError,
    ScanConfig, TagReaderFeedback,
};
use mfc_keys::KeyRetriever;
use tracing::{debug, info, warn};

use crate::commands::scan_tag;

/// Messages sent from the card worker to the front end
#[derive(Debug, Clone)]
pub enum CardEvent {
    /// Card was detected
    CardDetected { reader_name: String, uid: String },
    /// Card was removed
    CardRemoved,
    /// Scan status line
    Status { text: String },
    /// Scan progress
    Progress { progress: usize, max: usize },
    /// A decoder recognised the card
    CardType { info: CardInfo },
    /// The scan finished
    CardRead { card: ClassicCard },
    /// Card could not be scanned
    Error { message: String },
    /// Reader is unavailable
    ReaderUnavailable { error: String },
    /// Reader became available
    ReaderAvailable,
}

/// Commands sent from the front end to the card worker
#[derive(Debug)]
pub enum CardCommand {
    /// Stop the worker thread
    Stop,
}

/// Forwards scan feedback to the front end.
struct ChannelFeedback<'a> {
    tx: &'a Sender<CardEvent>,
}

impl TagReaderFeedback for ChannelFeedback<'_> {
    fn update_status_text(&mut self, text: &str) {
        let _ = self.tx.send(CardEvent::Status { text: text.to_string() });
    }

    fn update_progress_bar(&mut self, progress: usize, max: usize) {
        let _ = self.tx.send(CardEvent::Progress { progress, max });
    }

    fn show_card_type(&mut self, info: &CardInfo) {
        let _ = self.tx.send(CardEvent::CardType { info: info.clone() });
    }
}

/// Background worker that scans every card presented to a reader
pub struct CardWorker {
    event_tx: Sender<CardEvent>,
    command_rx: Receiver<CardCommand>,
    reader_name: Option<String>,
    config: ScanConfig,
    retriever: Box<dyn KeyRetriever + Send>,
}

impl CardWorker {
    /// Spawn a new card worker thread
    pub fn spawn(
        reader_name: Option<String>,
        config: ScanConfig,
        retriever: Box<dyn KeyRetriever + Send>,
    ) -> (Receiver<CardEvent>, Sender<CardCommand>) {
        let (event_tx, event_rx) = mpsc::channel();
        let (command_tx, command_rx) = mpsc::channel();

        thread::spawn(move || {
            let worker = CardWorker {
                event_tx,
                command_rx,
                reader_name,
                config,
                retriever,
            };
            worker.run();
        });

        (event_rx, command_tx)
    }

    fn run(self) {
        info!("Card worker thread started");

        let decoders = DecoderRegistry::new();
        let scanner =
            ClassicReader::new(&*self.retriever, &decoders).with_config(self.config.clone());
        let mut reader: Option<CardReader> = None;
        let mut card_present = false;
        // Check for a reader straight away
        let mut last_reader_check: Option<Instant> = None;

        loop {
            // Check for stop command (non-blocking)
            if let Ok(CardCommand::Stop) = self.command_rx.try_recv() {
                info!("Card worker stopping");
                break;
            }

            // Try to get reader if we don't have one (check every 2 seconds)
            let due = last_reader_check.map_or(true, |t| t.elapsed() > Duration::from_secs(2));
            if reader.is_none() && due {
                match CardReader::new() {
                    Ok(r) => {
                        info!("Card reader initialized");
                        reader = Some(r);
                        let _ = self.event_tx.send(CardEvent::ReaderAvailable);
                    }
                    Err(e) => {
                        debug!("Card reader unavailable: {}", e);
                        let _ = self.event_tx.send(CardEvent::ReaderUnavailable {
                            error: format!("{}", e),
                        });
                    }
                }
                last_reader_check = Some(Instant::now());
            }

            // Check for card if we have a reader
            if let Some(ref r) = reader {
                let connected = match &self.reader_name {
                    Some(name) => r.connect(name),
                    None => r.connect_first(),
                };
                match connected {
                    Ok(tag) => {
                        if !card_present {
                            card_present = true;
                            let reader_name = tag.reader_name().to_string();
                            let uid = tag.uid().to_string();
                            info!(reader = %reader_name, uid = %uid, "Card detected");
                            let _ = self
                                .event_tx
                                .send(CardEvent::CardDetected { reader_name, uid });

                            let mut feedback = ChannelFeedback { tx: &self.event_tx };
                            match scan_tag(tag, &scanner, &mut feedback) {
                                Some(card) => {
                                    let _ = self.event_tx.send(CardEvent::CardRead { card });
                                }
                                None => {
                                    warn!("Card is not a supported MIFARE card");
                                    let _ = self.event_tx.send(CardEvent::Error {
                                        message: "Unsupported card".to_string(),
                                    });
                                }
                            }
                        }
                        // Card stays on the reader: don't re-read
                    }
                    Err(PcscError::NoReadersAvailable) | Err(PcscError::ReaderUnavailable) => {
                        warn!("Card reader went away");
                        reader = None;
                        card_present = false;
                        let _ = self.event_tx.send(CardEvent::ReaderUnavailable {
                            error: "reader disconnected".to_string(),
                        });
                    }
                    Err(_) => {
                        if card_present {
                            info!("Card removed");
                            card_present = false;
                            let _ = self.event_tx.send(CardEvent::CardRemoved);
                        }
                    }
                }
            }

            // Sleep briefly to avoid busy loop
            thread::sleep(Duration::from_millis(250));
        }

        info!("Card worker thread stopped");
    }
}
