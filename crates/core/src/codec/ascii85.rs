//! ASCII85 and ASCIIHex stream decoders.

use crate::error::Result;

/// Decode ASCII85-encoded data (PDF variant).
///
/// Handles `z` groups, the optional `<~` prefix, the `~>` terminator,
/// interleaved whitespace and a missing EOD marker.
pub fn ascii85decode(data: &[u8]) -> Result<Vec<u8>> {
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    let data = match data.iter().position(|&b| b == b'~') {
        Some(pos) => &data[..pos],
        None => data,
    };

    let mut result = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut n = 0usize;

    for &byte in data {
        match byte {
            b'z' if n == 0 => result.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[n] = byte - b'!';
                n += 1;
                if n == 5 {
                    result.extend_from_slice(&group_value(&group).to_be_bytes());
                    n = 0;
                }
            }
            _ => {}
        }
    }

    if n > 1 {
        for slot in group.iter_mut().skip(n) {
            *slot = 84;
        }
        let bytes = group_value(&group).to_be_bytes();
        result.extend_from_slice(&bytes[..n - 1]);
    }

    Ok(result)
}

fn group_value(group: &[u8; 5]) -> u32 {
    group
        .iter()
        .fold(0u32, |acc, &d| acc.wrapping_mul(85).wrapping_add(d as u32))
}

/// Decode ASCIIHex-encoded data up to the `>` terminator.
///
/// Non-hex bytes are skipped; an odd trailing nibble is padded with zero.
pub fn asciihexdecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;

    for &byte in data {
        if byte == b'>' {
            break;
        }
        let Some(nibble) = hex_nibble(byte) else {
            continue;
        };
        match pending.take() {
            Some(high) => result.push((high << 4) | nibble),
            None => pending = Some(nibble),
        }
    }
    if let Some(high) = pending {
        result.push(high << 4);
    }

    Ok(result)
}

pub(crate) const fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii85_basic() {
        assert_eq!(ascii85decode(b"87cURD]i,\"Ebo7~>").unwrap(), b"Hello World");
        assert_eq!(ascii85decode(b"9jqo^ BlbD-\nB`").unwrap(), b"Man is di");
    }

    #[test]
    fn test_ascii85_z_and_partial_group() {
        assert_eq!(ascii85decode(b"z~>").unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(ascii85decode(b"<~87cURDZ~>").unwrap(), b"Hello");
    }

    #[test]
    fn test_asciihex_odd_and_whitespace() {
        assert_eq!(asciihexdecode(b"48 65 6C6c 6F>").unwrap(), b"Hello");
        assert_eq!(asciihexdecode(b"7>").unwrap(), vec![0x70]);
    }
}
