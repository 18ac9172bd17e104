//! MFC Card - MIFARE Classic / MIFARE Plus acquisition engine
//!
//! This crate reads every sector of a MIFARE Classic card, or a MIFARE Plus
//! card in security level 3, given a source of candidate keys. It searches
//! for a working key per sector, reads the blocks, cross-checks with the
//! other key type when access bits call for it, and returns a
//! [`ClassicCard`] that records which sectors could be read.
//!
//! Classic cards are driven through a PC/SC reader ([`PcscClassic`]); Plus
//! cards speak the AES secure-channel protocol over raw frames
//! ([`PlusProtocol`]). Both implement [`ClassicCardTech`], which is all
//! [`ClassicReader`] needs.

pub mod access_bits;
pub mod apdu;
pub mod atr;
pub mod authenticator;
pub mod card;
pub mod classic_reader;
pub mod config;
pub mod crypto;
pub mod error;
pub mod feedback;
pub mod pcsc_classic;
pub mod plus;
pub mod reader;
pub mod sector;
pub mod tech;
pub mod transceiver;

pub use access_bits::{AccessBits, BlockAccess};
pub use authenticator::ClassicAuthenticator;
pub use card::{ClassicCard, ClassicCardRaw, SubType};
pub use classic_reader::ClassicReader;
pub use config::{NonceSource, ScanConfig};
pub use error::CardError;
pub use feedback::{CardInfo, ClassicCardDecoder, DecoderRegistry, NullFeedback, TagReaderFeedback};
pub use pcsc_classic::PcscClassic;
pub use plus::{PlusProtocol, PlusSession};
pub use reader::{CardReader, PcscTag};
pub use sector::{ClassicBlock, Sector, SectorRaw};
pub use tech::ClassicCardTech;
pub use transceiver::CardTransceiver;

/// Re-export commonly used types
pub use pcsc::{Card, Context, Error as PcscError};
