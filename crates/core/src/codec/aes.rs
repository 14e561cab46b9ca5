//! AES-128-CBC helpers for the standard security handler.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
use cbc::{Decryptor, Encryptor};

use crate::error::{PdfError, Result};

type Aes128CbcDec = Decryptor<aes::Aes128>;
type Aes128CbcEnc = Encryptor<aes::Aes128>;

/// Length of the initialisation vector prefixed to every AESV2 payload.
pub const AES_IV_LEN: usize = 16;

/// Check that AES-128-CBC accepts `key` without touching any data.
///
/// Used when a decrypter is built so that an unusable key length shows up
/// as a [`PdfError::PlatformLimitation`] before any object is read.
pub fn check_key(key: &[u8]) -> Result<()> {
    Aes128CbcDec::new_from_slices(key, &[0u8; AES_IV_LEN])
        .map(|_| ())
        .map_err(|_| {
            PdfError::PlatformLimitation(format!(
                "AES-128-CBC does not accept a {}-byte key",
                key.len()
            ))
        })
}

/// Decrypt `data` with AES-128-CBC and no padding removal.
///
/// `data` must be a whole number of blocks.
pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|_| PdfError::PlatformLimitation(format!("bad AES key length {}", key.len())))?;
    let mut buf = data.to_vec();
    let len = cipher
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| PdfError::DecodeError("AES payload is not block aligned".into()))?
        .len();
    buf.truncate(len);
    Ok(buf)
}

/// Decrypt a PDF AESV2 payload: a 16-byte IV followed by PKCS#5 padded
/// ciphertext.
pub fn decrypt_with_iv(key: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() < AES_IV_LEN {
        return Err(PdfError::format(
            0,
            format!("AES payload of {} bytes has no IV", payload.len()),
        ));
    }
    let (iv, body) = payload.split_at(AES_IV_LEN);
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let plain = aes_cbc_decrypt(key, iv, body)?;
    let unpadded = unpad_aes(&plain).len();
    let mut plain = plain;
    plain.truncate(unpadded);
    Ok(plain)
}

/// Encrypt `data` with AES-128-CBC, PKCS#5 padding, prefixing `iv`.
///
/// This is the inverse of [`decrypt_with_iv`] and is handy for building
/// encrypted fixtures.
pub fn encrypt_with_iv(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes128CbcEnc::new_from_slices(key, iv)
        .map_err(|_| PdfError::PlatformLimitation(format!("bad AES key length {}", key.len())))?;
    let pad = AES_IV_LEN - data.len() % AES_IV_LEN;
    let mut buf = data.to_vec();
    buf.extend(std::iter::repeat_n(pad as u8, pad));
    let len = buf.len();
    cipher
        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .map_err(|_| PdfError::DecodeError("AES encrypt failed".into()))?;
    let mut out = iv.to_vec();
    out.extend_from_slice(&buf);
    Ok(out)
}

/// Remove PKCS#7 padding from AES-decrypted data.
///
/// Returns data unchanged if padding is invalid.
pub fn unpad_aes(data: &[u8]) -> &[u8] {
    let Some(&last) = data.last() else {
        return data;
    };
    let pad_len = last as usize;
    if pad_len == 0 || pad_len > 16 || pad_len > data.len() {
        return data;
    }
    let start = data.len() - pad_len;
    if data[start..].iter().any(|&b| b as usize != pad_len) {
        return data;
    }
    &data[..start]
}
