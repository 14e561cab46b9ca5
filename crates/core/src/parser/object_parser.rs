//! Object tokenizer for file-level PDF syntax.
//!
//! [`ObjectParser`] reads objects at an explicit position in the document
//! buffer. Stream payloads are sliced from the shared [`Bytes`] without
//! copying; strings inside indirect objects are decrypted as they are read.

use std::sync::Arc;

use bytes::Bytes;

use super::lexer::{Cursor, Number, starts_number};
use crate::crypt::{Decrypt, Decrypter, IDENTITY};
use crate::error::{PdfError, Result};
use crate::model::objects::{Dictionary, ObjectId, ObjectOrigin, PdfObject, PdfStream, dict_get};

/// Resolves indirect references met while parsing (stream `/Length`).
pub trait Resolve {
    /// Return `obj` with one level of indirection removed. Non-references
    /// are returned unchanged.
    fn resolve(&self, obj: &PdfObject) -> Result<PdfObject>;
}

enum Item<'a> {
    Object(PdfObject),
    ArrayEnd,
    DictEnd,
    Keyword(&'a [u8]),
}

pub struct ObjectParser<'a> {
    buf: &'a Bytes,
    cur: Cursor<'a>,
    hex_names: bool,
    decrypter: &'a Decrypter,
    resolver: Option<&'a dyn Resolve>,
}

impl<'a> ObjectParser<'a> {
    pub fn new(buf: &'a Bytes, pos: usize) -> Self {
        Self {
            buf,
            cur: Cursor::at(buf, pos),
            hex_names: true,
            decrypter: &IDENTITY,
            resolver: None,
        }
    }

    pub fn with_decrypter(mut self, decrypter: &'a Decrypter) -> Self {
        self.decrypter = decrypter;
        self
    }

    pub fn with_resolver(mut self, resolver: &'a dyn Resolve) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Whether `#hh` escapes in names are decoded (files newer than 1.1).
    pub fn hex_names(mut self, on: bool) -> Self {
        self.hex_names = on;
        self
    }

    pub const fn tell(&self) -> usize {
        self.cur.tell()
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.cur.set_pos(pos);
    }

    pub fn cursor(&mut self) -> &mut Cursor<'a> {
        &mut self.cur
    }

    /// Consume `keyword` (after whitespace) if it is next, as a whole token.
    pub fn eat_keyword(&mut self, keyword: &[u8]) -> bool {
        self.cur.skip_whitespace(false);
        let save = self.cur.tell();
        if self.cur.read_regular() == keyword {
            true
        } else {
            self.cur.set_pos(save);
            false
        }
    }

    /// Read one complete object.
    pub fn read_object(&mut self, origin: ObjectOrigin) -> Result<PdfObject> {
        let start = self.cur.tell();
        match self.read_item(origin)? {
            Item::Object(obj) => Ok(obj),
            Item::ArrayEnd => Err(PdfError::format(start, "unexpected ']'")),
            Item::DictEnd => Err(PdfError::format(start, "unexpected '>>'")),
            Item::Keyword(kw) => Err(PdfError::format(
                start,
                format!("unexpected keyword '{}'", String::from_utf8_lossy(kw)),
            )),
        }
    }

    /// Read `n g obj ... endobj` at the current position.
    pub fn read_indirect_object(&mut self) -> Result<(ObjectId, PdfObject)> {
        let start = self.cur.tell();
        let id = self
            .read_object_header()
            .ok_or_else(|| PdfError::format(start, "expected 'n g obj'"))?;
        let obj = self.read_object_body(id)?;
        Ok((id, obj))
    }

    /// Parse `n g obj`, leaving the cursor after `obj`.
    fn read_object_header(&mut self) -> Option<ObjectId> {
        self.cur.skip_whitespace(false);
        let num = self.read_nonneg_int()?;
        self.cur.skip_whitespace(false);
        let generation = self.read_nonneg_int()?;
        self.cur.skip_whitespace(false);
        if self.cur.read_regular() != b"obj" {
            return None;
        }
        Some(ObjectId::new(u32::try_from(num).ok()?, u16::try_from(generation).ok()?))
    }

    fn read_nonneg_int(&mut self) -> Option<i64> {
        match self.cur.peek() {
            Some(b'0'..=b'9') => match self.cur.read_number().ok()? {
                Number::Int(n) => Some(n),
                Number::Real(_) => None,
            },
            _ => None,
        }
    }

    fn read_object_body(&mut self, id: ObjectId) -> Result<PdfObject> {
        let origin = ObjectOrigin::Indirect(id);
        let obj = match self.read_object(origin)? {
            PdfObject::Dict(dict) if self.eat_keyword(b"stream") => {
                PdfObject::Stream(Arc::new(self.read_stream_payload(dict, origin)?))
            }
            other => other,
        };

        if !self.eat_keyword(b"endobj") {
            tracing::warn!(object = %id, pos = self.cur.tell(), "missing endobj");
        }
        Ok(obj)
    }

    fn stream_length(&self, dict: &Dictionary) -> Option<usize> {
        let length = dict_get(dict, "Length")?;
        let length = match (length, self.resolver) {
            (PdfObject::Ref(_), Some(resolver)) => match resolver.resolve(length) {
                Ok(obj) => obj,
                Err(err) => {
                    tracing::warn!(%err, "could not resolve stream /Length");
                    return None;
                }
            },
            _ => length.clone(),
        };
        length.as_int().ok().and_then(|n| usize::try_from(n).ok())
    }

    fn read_stream_payload(&mut self, dict: Dictionary, origin: ObjectOrigin) -> Result<PdfStream> {
        // `stream` is followed by CRLF or LF; a bare CR is tolerated.
        match (self.cur.peek(), self.cur.peek_at(1)) {
            (Some(b'\r'), Some(b'\n')) => self.cur.skip(2),
            (Some(b'\n' | b'\r'), _) => self.cur.skip(1),
            _ => {}
        }
        let start = self.cur.tell();

        let end = match self.stream_length(&dict) {
            Some(len) if start + len <= self.buf.len() => start + len,
            declared => {
                let found = self
                    .cur
                    .find(b"endstream")
                    .ok_or_else(|| PdfError::format(start, "unterminated stream"))?;
                tracing::warn!(
                    pos = start,
                    ?declared,
                    "stream /Length unusable, scanning for endstream"
                );
                let mut end = start + found;
                let data = self.cur.data();
                if end > start && data[end - 1] == b'\n' {
                    end -= 1;
                }
                if end > start && data[end - 1] == b'\r' {
                    end -= 1;
                }
                end
            }
        };

        self.cur.set_pos(end);
        if !self.eat_keyword(b"endstream") {
            return Err(PdfError::format(self.cur.tell(), "expected 'endstream'"));
        }
        Ok(PdfStream::new(dict, self.buf.slice(start..end), origin))
    }

    fn decrypt_string(&self, origin: ObjectOrigin, bytes: Vec<u8>) -> Result<Vec<u8>> {
        match origin {
            ObjectOrigin::Indirect(id) => self.decrypter.decrypt_string(id, bytes),
            ObjectOrigin::Trailer | ObjectOrigin::Embedded => Ok(bytes),
        }
    }

    fn read_item(&mut self, origin: ObjectOrigin) -> Result<Item<'a>> {
        self.cur.skip_whitespace(false);
        let start = self.cur.tell();
        let Some(b) = self.cur.peek() else {
            return Err(PdfError::UnexpectedEof);
        };

        let obj = match b {
            b'(' => {
                let s = self.cur.read_literal_string()?;
                PdfObject::String(self.decrypt_string(origin, s)?)
            }
            b'<' if self.cur.peek_at(1) == Some(b'<') => {
                self.cur.skip(2);
                PdfObject::Dict(self.read_dict(origin, start)?)
            }
            b'<' => {
                let s = self.cur.read_hex_string(true)?;
                PdfObject::String(self.decrypt_string(origin, s)?)
            }
            b'>' if self.cur.peek_at(1) == Some(b'>') => {
                self.cur.skip(2);
                return Ok(Item::DictEnd);
            }
            b'[' => {
                self.cur.skip(1);
                PdfObject::Array(self.read_array(origin, start)?)
            }
            b']' => {
                self.cur.skip(1);
                return Ok(Item::ArrayEnd);
            }
            b'/' => PdfObject::Name(self.cur.read_name(self.hex_names)?),
            b')' | b'>' | b'{' | b'}' => {
                return Err(PdfError::format(start, format!("unexpected '{}'", b as char)));
            }
            _ if starts_number(b, self.cur.peek_at(1)) => self.read_number_or_ref()?,
            _ => {
                let word = self.cur.read_regular();
                match word {
                    b"true" => PdfObject::Bool(true),
                    b"false" => PdfObject::Bool(false),
                    b"null" => PdfObject::Null,
                    _ => return Ok(Item::Keyword(word)),
                }
            }
        };
        Ok(Item::Object(obj))
    }

    /// A number, or `n g R` / `n g obj ...` when the next tokens say so.
    fn read_number_or_ref(&mut self) -> Result<PdfObject> {
        let first = self.cur.read_number()?;
        let Number::Int(num) = first else {
            return Ok(PdfObject::Real(first.as_f64()));
        };
        if num < 0 {
            return Ok(PdfObject::Int(num));
        }

        let after_first = self.cur.tell();
        self.cur.skip_whitespace(false);
        if let Some(generation) = self.read_nonneg_int() {
            self.cur.skip_whitespace(false);
            let keyword = self.cur.read_regular();
            let id = u32::try_from(num)
                .ok()
                .zip(u16::try_from(generation).ok())
                .map(|(n, g)| ObjectId::new(n, g));
            match (keyword, id) {
                (b"R", Some(id)) => return Ok(PdfObject::Ref(id)),
                (b"obj", Some(id)) => return self.read_object_body(id),
                _ => {}
            }
        }
        self.cur.set_pos(after_first);
        Ok(PdfObject::Int(num))
    }

    fn read_array(&mut self, origin: ObjectOrigin, start: usize) -> Result<Vec<PdfObject>> {
        let mut items = Vec::new();
        loop {
            match self.read_item(origin) {
                Ok(Item::ArrayEnd) => return Ok(items),
                Ok(Item::Object(obj)) => items.push(obj),
                Ok(Item::DictEnd) => {
                    return Err(PdfError::format(self.cur.tell(), "'>>' inside array"));
                }
                Ok(Item::Keyword(kw)) => {
                    return Err(PdfError::format(
                        self.cur.tell(),
                        format!("keyword '{}' inside array", String::from_utf8_lossy(kw)),
                    ));
                }
                Err(PdfError::UnexpectedEof) => {
                    return Err(PdfError::format(start, "missing ']'"));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn read_dict(&mut self, origin: ObjectOrigin, start: usize) -> Result<Dictionary> {
        let mut dict = Dictionary::default();
        loop {
            self.cur.skip_whitespace(false);
            let key_pos = self.cur.tell();
            let key = match self.read_item(origin) {
                Ok(Item::DictEnd) => return Ok(dict),
                Ok(Item::Object(PdfObject::Name(name))) => name,
                Ok(_) => {
                    return Err(PdfError::format(key_pos, "dictionary key is not a name"));
                }
                Err(PdfError::UnexpectedEof) => {
                    return Err(PdfError::format(start, "missing '>>'"));
                }
                Err(err) => return Err(err),
            };
            let value_pos = self.cur.tell();
            match self.read_item(origin) {
                Ok(Item::Object(value)) => {
                    dict.insert(key, value);
                }
                Ok(_) => {
                    return Err(PdfError::format(
                        value_pos,
                        format!("dictionary key {key:?} has no value"),
                    ));
                }
                Err(PdfError::UnexpectedEof) => {
                    return Err(PdfError::format(start, "missing '>>'"));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Parse a single object from `data`, with no decryption and no resolver.
pub fn parse_object(data: &[u8]) -> Result<PdfObject> {
    let buf = Bytes::copy_from_slice(data);
    ObjectParser::new(&buf, 0).read_object(ObjectOrigin::Embedded)
}
