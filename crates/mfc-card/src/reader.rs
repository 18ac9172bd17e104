//! PC/SC card reader management

use std::ffi::{CStr, CString};

use mfc_common::Buffer;
use pcsc::{Attribute, Card, Context, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};
use tracing::{debug, trace};

use crate::apdu::commands;
use crate::transceiver::CardTransceiver;
use crate::CardError;

/// Card reader wrapper for managing PC/SC connections
pub struct CardReader {
    context: Context,
}

impl CardReader {
    /// Create a new CardReader by establishing a PC/SC context
    pub fn new() -> Result<Self, pcsc::Error> {
        let context = Context::establish(Scope::User)?;
        Ok(Self { context })
    }

    /// List all available card readers
    pub fn list_readers(&self) -> Result<Vec<String>, pcsc::Error> {
        let mut readers_buf = [0; 2048];
        let readers = self.context.list_readers(&mut readers_buf)?;

        Ok(readers
            .map(|r| r.to_str().unwrap_or("Unknown").to_string())
            .collect())
    }

    /// Connect to the card on the first available reader
    pub fn connect_first(&self) -> Result<PcscTag, pcsc::Error> {
        let mut readers_buf = [0; 2048];
        let mut readers = self.context.list_readers(&mut readers_buf)?;

        match readers.next() {
            Some(reader) => self.connect_cstr(reader),
            None => Err(pcsc::Error::NoReadersAvailable),
        }
    }

    /// Connect to the card on a reader given by name
    pub fn connect(&self, reader_name: &str) -> Result<PcscTag, pcsc::Error> {
        let name = CString::new(reader_name).map_err(|_| pcsc::Error::UnknownReader)?;
        self.connect_cstr(&name)
    }

    fn connect_cstr(&self, reader: &CStr) -> Result<PcscTag, pcsc::Error> {
        let reader_name = reader.to_str().unwrap_or("Unknown").to_string();
        let card = self.context.connect(reader, ShareMode::Shared, Protocols::ANY)?;
        PcscTag::open(card, reader_name)
    }
}

/// A contactless card connected through a PC/SC reader.
pub struct PcscTag {
    card: Card,
    reader_name: String,
    uid: Buffer,
    atr: Buffer,
}

impl PcscTag {
    /// Read the UID and ATR of a freshly connected card.
    pub fn open(card: Card, reader_name: String) -> Result<Self, pcsc::Error> {
        let atr = card
            .get_attribute_owned(Attribute::AtrString)
            .map(Buffer::from)
            .unwrap_or_default();

        let mut tag = Self {
            card,
            reader_name,
            uid: Buffer::empty(),
            atr,
        };

        match commands::get_uid().send(&mut tag) {
            Ok(resp) if resp.is_success() => tag.uid = Buffer::from(resp.data),
            Ok(resp) => debug!(sw = %resp.status_string(), "reader did not return a UID"),
            Err(e) => debug!(error = %e, "GET UID failed"),
        }
        debug!(reader = %tag.reader_name, uid = %tag.uid, atr = %tag.atr, "card connected");
        Ok(tag)
    }

    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    pub fn atr(&self) -> &Buffer {
        &self.atr
    }
}

impl CardTransceiver for PcscTag {
    fn transceive(&mut self, data: &[u8]) -> Result<Buffer, CardError> {
        trace!(tx = %hex::encode(data), "transceive");
        let mut rx_buf = [0; MAX_BUFFER_SIZE];
        let rx = self.card.transmit(data, &mut rx_buf)?;
        trace!(rx = %hex::encode(rx), "transceive");
        Ok(Buffer::from(rx))
    }

    fn uid(&self) -> Buffer {
        self.uid.clone()
    }
}
