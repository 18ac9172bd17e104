//! MFC Common - Shared byte handling for MIFARE Classic / Plus processing
//!
//! Card data is passed around as [`Buffer`], an immutable, value-comparable
//! byte sequence with the bit and integer accessors that sector decoders need.

mod buffer;

pub use buffer::Buffer;

/// Decode a single packed BCD byte (e.g. `0x42` -> `42`).
///
/// Nibbles above 9 are not rejected; use [`is_valid_bcd`] first when the
/// source is untrusted.
pub fn bcd_to_int(data: u8) -> u32 {
    u32::from(data >> 4) * 10 + u32::from(data & 0x0F)
}

/// Decode a 32-bit packed BCD value, most significant nibble first.
pub fn bcd_to_int_u32(data: u32) -> u32 {
    let mut res = 0;
    for i in 0..8 {
        res = res * 10 + ((data >> (4 * (7 - i))) & 0xF);
    }
    res
}

/// Check that every nibble of `data` is a decimal digit.
pub fn is_valid_bcd(data: u32) -> bool {
    (0..8).all(|i| (data >> (4 * i)) & 0xF <= 9)
}
