use thiserror::Error;

/// Transport-level failures.
///
/// The reader treats `CardLost` as fatal for the whole scan and every other
/// error as local to the sector being read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CardError {
    #[error("card lost: {0}")]
    CardLost(String),

    #[error("transceive error: {0}")]
    Transceive(String),
}

impl CardError {
    pub fn is_card_lost(&self) -> bool {
        matches!(self, CardError::CardLost(_))
    }
}

impl From<pcsc::Error> for CardError {
    fn from(err: pcsc::Error) -> Self {
        match err {
            pcsc::Error::RemovedCard
            | pcsc::Error::ResetCard
            | pcsc::Error::NoSmartcard
            | pcsc::Error::UnpoweredCard
            | pcsc::Error::UnresponsiveCard => CardError::CardLost(err.to_string()),
            _ => CardError::Transceive(err.to_string()),
        }
    }
}

impl From<crate::crypto::CryptoError> for CardError {
    fn from(err: crate::crypto::CryptoError) -> Self {
        CardError::Transceive(err.to_string())
    }
}
