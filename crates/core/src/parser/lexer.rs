//! Byte-level scanning shared by the file object tokenizer and the content
//! stream tokenizer.
//!
//! [`Cursor`] is an explicit position over a borrowed buffer; parsers own
//! their cursor, so nothing about a parse lives on the document.

use crate::codec::ascii85::hex_nibble;
use crate::error::{PdfError, Result};
use crate::model::objects::Name;

/// PDF whitespace: NUL, TAB, LF, FF, CR, SPACE.
pub const fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

pub const fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

pub const fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// A parsed numeric token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Real(f64),
}

impl Number {
    pub const fn as_f64(self) -> f64 {
        match self {
            Self::Int(n) => n as f64,
            Self::Real(n) => n,
        }
    }
}

/// Position over a byte buffer.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub const fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub const fn tell(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    pub fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    pub fn skip(&mut self, n: usize) {
        self.set_pos(self.pos + n);
    }

    pub fn starts_with(&self, needle: &[u8]) -> bool {
        self.remaining().starts_with(needle)
    }

    /// Skip whitespace and comments. `0x1C` also starts a comment when
    /// `file_separator_comments` is set (content streams only).
    pub fn skip_whitespace(&mut self, file_separator_comments: bool) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' || (file_separator_comments && b == 0x1C) {
                self.skip_line();
            } else {
                break;
            }
        }
    }

    /// Skip to just past the next end of line.
    pub fn skip_line(&mut self) {
        while let Some(b) = self.advance() {
            if b == b'\n' {
                break;
            }
            if b == b'\r' {
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
                break;
            }
        }
    }

    /// Consume a run of regular characters.
    pub fn read_regular(&mut self) -> &'a [u8] {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if is_regular(b)) {
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    /// Read a literal string; the cursor must be on the opening `(`.
    pub fn read_literal_string(&mut self) -> Result<Vec<u8>> {
        let start = self.pos;
        self.pos += 1;
        let mut out = Vec::with_capacity(32);
        let mut depth = 1usize;

        loop {
            let Some(c) = self.advance() else {
                return Err(PdfError::format(start, "unterminated literal string"));
            };
            match c {
                b'(' => {
                    depth += 1;
                    out.push(c);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(c);
                }
                b'\\' => self.read_escape(&mut out, start)?,
                _ => out.push(c),
            }
        }
    }

    fn read_escape(&mut self, out: &mut Vec<u8>, start: usize) -> Result<()> {
        let Some(c) = self.advance() else {
            return Err(PdfError::format(start, "unterminated literal string"));
        };
        match c {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'\r' => {
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            b'0'..=b'7' => {
                let mut value = (c - b'0') as u32;
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            self.pos += 1;
                            value = value * 8 + (d - b'0') as u32;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            // `\(`, `\)`, `\\` and anything unrecognised: drop the backslash.
            other => out.push(other),
        }
        Ok(())
    }

    /// Read a hex string; the cursor must be on the opening `<`.
    ///
    /// With `strict`, any character other than hex digits and whitespace
    /// is a format error; otherwise such characters are skipped.
    pub fn read_hex_string(&mut self, strict: bool) -> Result<Vec<u8>> {
        let start = self.pos;
        self.pos += 1;
        let mut out = Vec::new();
        let mut pending: Option<u8> = None;

        loop {
            let Some(c) = self.advance() else {
                return Err(PdfError::format(start, "unterminated hex string"));
            };
            if c == b'>' {
                break;
            }
            match hex_nibble(c) {
                Some(nibble) => match pending.take() {
                    Some(high) => out.push((high << 4) | nibble),
                    None => pending = Some(nibble),
                },
                None if is_whitespace(c) || !strict => {}
                None => {
                    return Err(PdfError::format(
                        self.pos - 1,
                        format!("junk byte {c:#04x} in hex string"),
                    ));
                }
            }
        }
        if let Some(high) = pending {
            out.push(high << 4);
        }
        Ok(out)
    }

    /// Read a name; the cursor must be on the `/`.
    ///
    /// `#hh` escapes are decoded only when `hex_escapes` is set (files
    /// newer than PDF 1.1); otherwise `#` is an ordinary character.
    pub fn read_name(&mut self, hex_escapes: bool) -> Result<Name> {
        self.pos += 1;
        let mut bytes = Vec::with_capacity(16);
        while let Some(b) = self.peek() {
            if !is_regular(b) {
                break;
            }
            self.pos += 1;
            if b == b'#' && hex_escapes {
                let hi = self.peek().and_then(hex_nibble);
                let lo = self.peek_at(1).and_then(hex_nibble);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        self.pos += 2;
                        bytes.push((hi << 4) | lo);
                    }
                    _ => return Err(PdfError::format(self.pos - 1, "bad #hh escape in name")),
                }
            } else {
                bytes.push(b);
            }
        }
        Ok(Name::from_bytes(&bytes))
    }

    /// Read a number: optional sign, digits, at most one `.`, no exponent.
    pub fn read_number(&mut self) -> Result<Number> {
        let start = self.pos;
        let negative = match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                true
            }
            Some(b'+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };

        let mut int_part: i64 = 0;
        let mut frac_part: f64 = 0.0;
        let mut frac_scale: f64 = 1.0;
        let mut seen_dot = false;
        let mut digits = 0usize;

        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {
                    digits += 1;
                    let d = (b - b'0') as i64;
                    if seen_dot {
                        frac_scale /= 10.0;
                        frac_part += d as f64 * frac_scale;
                    } else {
                        int_part = int_part.saturating_mul(10).saturating_add(d);
                    }
                }
                b'.' if seen_dot => {
                    return Err(PdfError::format(self.pos, "second '.' in number"));
                }
                b'.' => seen_dot = true,
                _ => break,
            }
            self.pos += 1;
        }

        if digits == 0 {
            return Err(PdfError::format(start, "number without digits"));
        }

        if seen_dot {
            let value = int_part as f64 + frac_part;
            Ok(Number::Real(if negative { -value } else { value }))
        } else {
            Ok(Number::Int(if negative { -int_part } else { int_part }))
        }
    }

    /// Scan forward for `needle`, returning its offset from the current
    /// position without moving.
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        self.remaining()
            .windows(needle.len())
            .position(|w| w == needle)
    }
}

/// Whether a byte can start a number token.
pub fn starts_number(b: u8, next: Option<u8>) -> bool {
    match b {
        b'0'..=b'9' => true,
        b'+' | b'-' => matches!(next, Some(b'0'..=b'9' | b'.')),
        b'.' => matches!(next, Some(b'0'..=b'9')),
        _ => false,
    }
}

/// Render bytes as a literal string, escaping what the tokenizer would
/// otherwise interpret.
pub fn render_literal_string(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 2);
    out.push(b'(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0c => out.extend_from_slice(b"\\f"),
            0x20..=0x7e => out.push(b),
            _ => out.extend_from_slice(format!("\\{b:03o}").as_bytes()),
        }
    }
    out.push(b')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(src: &[u8]) -> Vec<u8> {
        Cursor::new(src).read_literal_string().unwrap()
    }

    #[test]
    fn test_literal_string_escapes() {
        assert_eq!(literal(b"(a\\nb\\tc)"), b"a\nb\tc");
        assert_eq!(literal(b"(\\101\\60\\0)"), b"A0\0");
        assert_eq!(literal(b"(one\\\r\ntwo\\\nthree)"), b"onetwothree");
        assert_eq!(literal(b"(\\q\\(x\\))"), b"q(x)");
        assert_eq!(literal(b"(nested (parens) ok)"), b"nested (parens) ok");
    }

    #[test]
    fn test_octal_stops_after_three_digits() {
        assert_eq!(literal(b"(\\1234)"), b"S4");
    }

    #[test]
    fn test_unterminated_literal_is_format_error() {
        let err = Cursor::new(b"(abc").read_literal_string().unwrap_err();
        assert!(matches!(err, PdfError::Format { pos: 0, .. }));
    }

    #[test]
    fn test_hex_string_odd_digit_and_junk() {
        assert_eq!(Cursor::new(b"<48 65 6>").read_hex_string(true).unwrap(), b"He`");
        assert!(Cursor::new(b"<4x>").read_hex_string(true).is_err());
        assert_eq!(Cursor::new(b"<4x1>").read_hex_string(false).unwrap(), vec![0x41]);
    }

    #[test]
    fn test_name_hex_escapes_depend_on_version() {
        assert_eq!(Cursor::new(b"/A#42C").read_name(true).unwrap(), Name::new("ABC"));
        assert_eq!(Cursor::new(b"/A#42C").read_name(false).unwrap(), Name::new("A#42C"));
        assert!(Cursor::new(b"/A#4").read_name(true).is_err());
    }

    #[test]
    fn test_names_with_high_bytes_are_distinct() {
        let a = Cursor::new(b"/#80").read_name(true).unwrap();
        let b = Cursor::new(b"/#FF").read_name(true).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.as_bytes(), &[0x80]);
        assert_eq!(b.as_bytes(), &[0xFF]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(Cursor::new(b"-12 ").read_number().unwrap(), Number::Int(-12));
        assert_eq!(Cursor::new(b"+.5]").read_number().unwrap(), Number::Real(0.5));
        assert_eq!(Cursor::new(b"4.").read_number().unwrap(), Number::Real(4.0));
        assert!(Cursor::new(b"1.2.3").read_number().is_err());
        assert!(Cursor::new(b"-").read_number().is_err());
    }

    #[test]
    fn test_render_then_tokenize_restores_bytes() {
        let vectors: [&[u8]; 5] = [
            b"plain",
            b"(paren) \\ back",
            b"line\nfeed\r\ttab",
            &[0, 1, 0x7f, 0xff, 0x08, 0x0c],
            b"",
        ];
        for v in vectors {
            let rendered = render_literal_string(v);
            assert_eq!(Cursor::new(&rendered).read_literal_string().unwrap(), v);
        }
    }

    #[test]
    fn test_skip_whitespace_and_comments() {
        let mut cur = Cursor::new(b"  % note\r\n\x1c sep\n x");
        cur.skip_whitespace(true);
        assert_eq!(cur.peek(), Some(b'x'));
    }
}
