//! RunLength stream decoder.

use crate::error::Result;

/// Decode RunLength-encoded data.
///
/// Length byte 0-127 copies the next `n + 1` bytes, 129-255 repeats the
/// next byte `257 - n` times and 128 ends the data. Truncated runs stop
/// decoding without an error.
pub fn rldecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let length = data[i];
        i += 1;

        match length {
            128 => break,
            0..=127 => {
                let count = length as usize + 1;
                let end = (i + count).min(data.len());
                result.extend_from_slice(&data[i..end]);
                i = end;
            }
            129..=255 => {
                let Some(&byte) = data.get(i) else {
                    break;
                };
                i += 1;
                result.extend(std::iter::repeat_n(byte, 257 - length as usize));
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_and_repeat_runs() {
        let data = [2, b'a', b'b', b'c', 254, b'z', 128, b'x'];
        assert_eq!(rldecode(&data).unwrap(), b"abczzz");
    }

    #[test]
    fn test_truncated_literal_keeps_prefix() {
        assert_eq!(rldecode(&[4, b'a', b'b']).unwrap(), b"ab");
    }
}
