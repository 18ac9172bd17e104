//! AES primitives used by the MIFARE Plus secure channel
//!
//! Plain CBC with a caller-supplied (usually zero) IV and AES-CMAC as
//! defined in RFC 4493. Only AES-128 is used by the card.

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes128;
use cmac::{Cmac, Mac};
use thiserror::Error;

pub const AES_BLOCK_LEN: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("AES-128 key must be 16 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("data length {0} is not a multiple of the AES block size")]
    UnalignedData(usize),
}

fn check_aligned(data: &[u8]) -> Result<(), CryptoError> {
    if data.len() % AES_BLOCK_LEN != 0 {
        return Err(CryptoError::UnalignedData(data.len()));
    }
    Ok(())
}

/// AES-128-CBC encryption of block-aligned data, no padding.
pub fn aes_cbc_encrypt_iv(
    data: &[u8],
    key: &[u8],
    iv: &[u8; AES_BLOCK_LEN],
) -> Result<Vec<u8>, CryptoError> {
    check_aligned(data)?;
    let encryptor = Aes128CbcEnc::new_from_slices(key, iv)
        .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
    Ok(encryptor.encrypt_padded_vec_mut::<NoPadding>(data))
}

/// AES-128-CBC decryption of block-aligned data, no padding.
pub fn aes_cbc_decrypt_iv(
    data: &[u8],
    key: &[u8],
    iv: &[u8; AES_BLOCK_LEN],
) -> Result<Vec<u8>, CryptoError> {
    check_aligned(data)?;
    let decryptor = Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
    decryptor
        .decrypt_padded_vec_mut::<NoPadding>(data)
        .map_err(|_| CryptoError::UnalignedData(data.len()))
}

/// AES-128-CBC encryption with a zero IV.
pub fn aes_cbc_encrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    aes_cbc_encrypt_iv(data, key, &[0; AES_BLOCK_LEN])
}

/// AES-128-CBC decryption with a zero IV.
pub fn aes_cbc_decrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    aes_cbc_decrypt_iv(data, key, &[0; AES_BLOCK_LEN])
}

/// AES-CMAC (RFC 4493). Returns the full 16-byte tag.
pub fn aes_cmac(message: &[u8], key: &[u8]) -> Result<[u8; AES_BLOCK_LEN], CryptoError> {
    let mut mac = <Cmac<Aes128> as Mac>::new_from_slice(key)
        .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}
