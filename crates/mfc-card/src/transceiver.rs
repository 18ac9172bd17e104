//! Raw frame exchange with a contactless card

use mfc_common::Buffer;

use crate::CardError;

/// One request/response exchange with the card in the field.
///
/// The reader only ever has one exchange in flight, so implementations take
/// `&mut self` and block until the reply arrives.
pub trait CardTransceiver {
    /// Send a raw frame and return the raw reply.
    fn transceive(&mut self, data: &[u8]) -> Result<Buffer, CardError>;

    /// UID reported by the card during anticollision.
    fn uid(&self) -> Buffer;
}

impl<T: CardTransceiver + ?Sized> CardTransceiver for &mut T {
    fn transceive(&mut self, data: &[u8]) -> Result<Buffer, CardError> {
        (**self).transceive(data)
    }

    fn uid(&self) -> Buffer {
        (**self).uid()
    }
}

impl<T: CardTransceiver + ?Sized> CardTransceiver for Box<T> {
    fn transceive(&mut self, data: &[u8]) -> Result<Buffer, CardError> {
        (**self).transceive(data)
    }

    fn uid(&self) -> Buffer {
        (**self).uid()
    }
}
