//! LZW stream decoder backed by weezl.

use crate::error::Result;
use weezl::{BitOrder, decode::Decoder};

/// Decode LZW-encoded data (MSB first, 8-bit) with the PDF default
/// EarlyChange of 1.
pub fn lzwdecode(data: &[u8]) -> Result<Vec<u8>> {
    lzwdecode_with_earlychange(data, 1)
}

/// Decode LZW-encoded data honouring `/EarlyChange`.
///
/// EarlyChange 0 switches code width one code later, which weezl models
/// as the TIFF size switch. Corrupt input yields the output produced so
/// far.
pub fn lzwdecode_with_earlychange(data: &[u8], early_change: i64) -> Result<Vec<u8>> {
    let mut decoder = if early_change == 0 {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        Decoder::new(BitOrder::Msb, 8)
    };
    let mut output = Vec::new();
    let result = decoder.into_vec(&mut output).decode(data);
    if let Err(err) = result.status {
        tracing::debug!(%err, produced = output.len(), "LZW data truncated");
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lzw_reference_sample() {
        // Example from the PDF reference, section 3.3.3.
        let data = [0x80, 0x0b, 0x60, 0x50, 0x22, 0x0c, 0x0c, 0x85, 0x01];
        assert_eq!(lzwdecode(&data).unwrap(), b"-----A---B");
    }
}
