//! Password input and the byte encodings tried against a security handler.

use crate::utils::pdfdoc_encode_char;

/// A user-supplied password.
///
/// Byte passwords are used exactly as given. Text passwords that are not
/// plain 7-bit alphanumerics are expanded into several candidate byte
/// encodings, because nothing in the file says which one its author used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Password {
    Bytes(Vec<u8>),
    Text(String),
}

impl Password {
    pub fn empty() -> Self {
        Self::Bytes(Vec::new())
    }

    /// Candidate byte strings, in the order they should be tried, without
    /// duplicates.
    pub fn candidates(&self) -> Vec<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => vec![bytes.clone()],
            Self::Text(text) if is_alphanum_7bit(text) => vec![text.as_bytes().to_vec()],
            Self::Text(text) => {
                let mut out: Vec<Vec<u8>> = Vec::new();
                let mut push = |bytes: Vec<u8>| {
                    if !out.contains(&bytes) {
                        out.push(bytes);
                    }
                };
                for fill in Unmappable::ALL {
                    push(encode_with(text, fill, pdfdoc_encode_char));
                }
                push(text.encode_utf16().map(|unit| unit as u8).collect());
                for fill in Unmappable::ALL {
                    push(encode_with(text, fill, |c| u8::try_from(c as u32).ok()));
                }
                out
            }
        }
    }
}

impl Default for Password {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Password {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&[u8]> for Password {
    fn from(b: &[u8]) -> Self {
        Self::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for Password {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

#[derive(Clone, Copy)]
enum Unmappable {
    Drop,
    Zero,
    Question,
}

impl Unmappable {
    const ALL: [Self; 3] = [Self::Drop, Self::Zero, Self::Question];
}

fn encode_with(text: &str, fill: Unmappable, map: impl Fn(char) -> Option<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match (map(c), fill) {
            (Some(b), _) => out.push(b),
            (None, Unmappable::Drop) => {}
            (None, Unmappable::Zero) => out.push(0),
            (None, Unmappable::Question) => out.push(b'?'),
        }
    }
    out
}

fn is_alphanum_7bit(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphanumeric_text_is_used_verbatim() {
        assert_eq!(Password::from("abc123").candidates(), vec![b"abc123".to_vec()]);
        assert_eq!(Password::from("").candidates(), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_raw_bytes_are_used_verbatim() {
        let pw = Password::from(&[0xff, 0x00][..]);
        assert_eq!(pw.candidates(), vec![vec![0xff, 0x00]]);
    }

    #[test]
    fn test_latin_text_dedups_identical_encodings() {
        // Every encoding of "pass word" is the same ASCII bytes.
        assert_eq!(Password::from("pass word").candidates(), vec![b"pass word".to_vec()]);
    }

    #[test]
    fn test_unmappable_char_variants_in_order() {
        let cands = Password::from("a\u{263a}").candidates();
        assert_eq!(
            cands,
            vec![
                b"a".to_vec(),
                vec![b'a', 0],
                b"a?".to_vec(),
                vec![b'a', 0x3a],
            ]
        );
    }

    #[test]
    fn test_bullet_uses_pdfdoc_then_identity() {
        let cands = Password::from("\u{2022}\u{e9}").candidates();
        assert_eq!(cands[0], vec![0x80, 0xe9]);
        assert!(cands.contains(&vec![0xe9]));
    }
}
