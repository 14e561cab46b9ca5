//! Tokenizer for page content streams.
//!
//! Content syntax differs from file syntax in a few places: `0x1C` also
//! starts a comment, `{` and `}` are tokens, hex strings skip anything that
//! is not a hex digit, and inline image data is raw bytes between `ID` and
//! `EI`.

use super::lexer::{Cursor, Number, is_delimiter, is_whitespace, starts_number};
use crate::error::{PdfError, Result};
use crate::model::objects::Name;

#[derive(Debug, Clone, PartialEq)]
pub enum ContentToken<'a> {
    Number(Number),
    String(Vec<u8>),
    Name(Name),
    Bool(bool),
    Null,
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    ProcStart,
    ProcEnd,
    Operator(&'a [u8]),
}

pub struct ContentLexer<'a> {
    cur: Cursor<'a>,
}

impl<'a> ContentLexer<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            cur: Cursor::new(data),
        }
    }

    /// Resume lexing `data` at `pos`.
    pub const fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            cur: Cursor::at(data, pos),
        }
    }

    pub const fn tell(&self) -> usize {
        self.cur.tell()
    }

    pub fn at_end(&mut self) -> bool {
        self.cur.skip_whitespace(true);
        self.cur.at_end()
    }

    /// Next token, or `None` at the end of the stream.
    pub fn next_token(&mut self) -> Result<Option<ContentToken<'a>>> {
        self.cur.skip_whitespace(true);
        let start = self.cur.tell();
        let Some(b) = self.cur.peek() else {
            return Ok(None);
        };

        let token = match b {
            b'(' => ContentToken::String(self.cur.read_literal_string()?),
            b'<' if self.cur.peek_at(1) == Some(b'<') => {
                self.cur.skip(2);
                ContentToken::DictStart
            }
            b'<' => ContentToken::String(self.cur.read_hex_string(false)?),
            b'>' if self.cur.peek_at(1) == Some(b'>') => {
                self.cur.skip(2);
                ContentToken::DictEnd
            }
            b'[' => {
                self.cur.skip(1);
                ContentToken::ArrayStart
            }
            b']' => {
                self.cur.skip(1);
                ContentToken::ArrayEnd
            }
            b'{' => {
                self.cur.skip(1);
                ContentToken::ProcStart
            }
            b'}' => {
                self.cur.skip(1);
                ContentToken::ProcEnd
            }
            b'/' => ContentToken::Name(self.cur.read_name(true)?),
            b')' | b'>' => {
                return Err(PdfError::format(start, format!("unexpected '{}'", b as char)));
            }
            _ if starts_number(b, self.cur.peek_at(1)) => {
                ContentToken::Number(self.cur.read_number()?)
            }
            _ => match self.cur.read_regular() {
                b"true" => ContentToken::Bool(true),
                b"false" => ContentToken::Bool(false),
                b"null" => ContentToken::Null,
                word => ContentToken::Operator(word),
            },
        };
        Ok(Some(token))
    }

    /// Raw inline image bytes following an `ID` operator.
    ///
    /// One whitespace byte after `ID` is skipped; the data runs up to the
    /// whitespace that precedes a standalone `EI`. The cursor is left just
    /// after `EI`.
    pub fn read_inline_data(&mut self) -> Result<&'a [u8]> {
        if matches!(self.cur.peek(), Some(b) if is_whitespace(b)) {
            self.cur.skip(1);
        }
        let data = self.cur.data();
        let start = self.cur.tell();

        let mut i = start;
        while i + 3 <= data.len() {
            if is_whitespace(data[i])
                && &data[i + 1..i + 3] == b"EI"
                && data.get(i + 3).is_none_or(|&b| is_whitespace(b) || is_delimiter(b))
            {
                self.cur.set_pos(i + 3);
                return Ok(&data[start..i]);
            }
            i += 1;
        }
        Err(PdfError::format(start, "inline image without EI"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &[u8]) -> Vec<ContentToken<'_>> {
        let mut lexer = ContentLexer::new(src);
        let mut out = Vec::new();
        while let Some(tok) = lexer.next_token().unwrap() {
            out.push(tok);
        }
        out
    }

    #[test]
    fn test_operators_and_operands() {
        assert_eq!(
            tokens(b"1 0 0 RG 0.5 w T* (a) ' /F1 12 Tf"),
            vec![
                ContentToken::Number(Number::Int(1)),
                ContentToken::Number(Number::Int(0)),
                ContentToken::Number(Number::Int(0)),
                ContentToken::Operator(b"RG"),
                ContentToken::Number(Number::Real(0.5)),
                ContentToken::Operator(b"w"),
                ContentToken::Operator(b"T*"),
                ContentToken::String(b"a".to_vec()),
                ContentToken::Operator(b"'"),
                ContentToken::Name(Name::new("F1")),
                ContentToken::Number(Number::Int(12)),
                ContentToken::Operator(b"Tf"),
            ]
        );
    }

    #[test]
    fn test_comments_and_file_separator() {
        assert_eq!(
            tokens(b"q % push\n\x1cjunk Q\nQ"),
            vec![ContentToken::Operator(b"q"), ContentToken::Operator(b"Q")]
        );
    }

    #[test]
    fn test_brackets_and_dict_tokens() {
        assert_eq!(
            tokens(b"[<4a4>] << >> {}"),
            vec![
                ContentToken::ArrayStart,
                ContentToken::String(vec![0x4a, 0x40]),
                ContentToken::ArrayEnd,
                ContentToken::DictStart,
                ContentToken::DictEnd,
                ContentToken::ProcStart,
                ContentToken::ProcEnd,
            ]
        );
    }

    #[test]
    fn test_lenient_hex_string() {
        assert_eq!(tokens(b"<4g1>"), vec![ContentToken::String(vec![0x41])]);
    }

    #[test]
    fn test_inline_data_stops_at_standalone_ei() {
        let src = b"ID \x00EIx\xff EI Q";
        let mut lexer = ContentLexer::new(src);
        assert_eq!(lexer.next_token().unwrap(), Some(ContentToken::Operator(b"ID")));
        assert_eq!(lexer.read_inline_data().unwrap(), b"\x00EIx\xff");
        assert_eq!(lexer.next_token().unwrap(), Some(ContentToken::Operator(b"Q")));
    }

    #[test]
    fn test_inline_data_without_ei_is_error() {
        let mut lexer = ContentLexer::new(b"ID abc");
        lexer.next_token().unwrap();
        assert!(lexer.read_inline_data().is_err());
    }
}
