//! PDF object values.
//!
//! [`PdfObject`] is the closed set of values the tokenizer produces.

use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::codec::FilterLimits;
use crate::error::{PdfError, Result};
use crate::parser::lexer::Number;

/// PDF name (the part after `/`), as the bytes left after `#hh` escapes
/// are decoded.
///
/// Names are byte strings: two names are equal exactly when their bytes
/// are. Short names, which is nearly all of them, are stored inline.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(SmallVec<[u8; 24]>);

impl Name {
    pub fn new(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(SmallVec::from_slice(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The name as text, or U+FFFD when its bytes are not UTF-8.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("\u{FFFD}")
    }
}

impl fmt::Debug for Name {
    /// Written the way a PDF file would, with `#hh` for bytes that are not
    /// printable ASCII.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        for &b in self.0.iter() {
            if b.is_ascii_graphic() && b != b'#' {
                write!(f, "{}", char::from(b))?;
            } else {
                write!(f, "#{b:02X}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Name {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Dictionary of name to object. Key order is not significant.
pub type Dictionary = FxHashMap<Name, PdfObject>;

/// Look up `key` in a dictionary by string.
pub fn dict_get<'a>(dict: &'a Dictionary, key: &str) -> Option<&'a PdfObject> {
    dict.get(&Name::new(key))
}

/// Identifier of a top-level indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ObjectId {
    pub num: u32,
    pub generation: u16,
}

impl ObjectId {
    pub const fn new(num: u32, generation: u16) -> Self {
        Self { num, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.num, self.generation)
    }
}

/// Where a parsed value came from.
///
/// Only values that belong to an indirect object are subject to string
/// and stream decryption; the trailer and objects embedded in a content
/// stream or an object stream container are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectOrigin {
    Indirect(ObjectId),
    Trailer,
    Embedded,
}

impl ObjectOrigin {
    pub const fn id(&self) -> Option<ObjectId> {
        match self {
            Self::Indirect(id) => Some(*id),
            Self::Trailer | Self::Embedded => None,
        }
    }
}

/// PDF object value.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Name(Name),
    /// Byte-preserving string; see [`crate::utils::decode_text`] for the
    /// text interpretation.
    String(Vec<u8>),
    Array(Vec<Self>),
    Dict(Dictionary),
    Stream(Arc<PdfStream>),
    Ref(ObjectId),
}

impl PdfObject {
    pub fn name(s: &str) -> Self {
        Self::Name(Name::new(s))
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(self.type_error("bool")),
        }
    }

    /// Integer value. Reals are truncated toward zero.
    pub const fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            Self::Real(n) => Ok(*n as i64),
            _ => Err(self.type_error("int")),
        }
    }

    /// Numeric value (int or real coerced to f64).
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(self.type_error("number")),
        }
    }

    pub fn as_name(&self) -> Result<Name> {
        match self {
            Self::Name(n) => Ok(n.clone()),
            _ => Err(self.type_error("name")),
        }
    }

    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(self.type_error("string")),
        }
    }

    pub fn as_array(&self) -> Result<&[Self]> {
        match self {
            Self::Array(a) => Ok(a),
            _ => Err(self.type_error("array")),
        }
    }

    /// Dictionary view; a stream exposes its stream dictionary.
    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Self::Dict(d) => Ok(d),
            Self::Stream(s) => Ok(&s.dict),
            _ => Err(self.type_error("dict")),
        }
    }

    pub fn as_stream(&self) -> Result<&Arc<PdfStream>> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(self.type_error("stream")),
        }
    }

    pub const fn as_ref_id(&self) -> Option<ObjectId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Ref(_) => "ref",
        }
    }

    const fn type_error(&self, expected: &'static str) -> PdfError {
        PdfError::TypeError {
            expected,
            got: self.type_name(),
        }
    }
}

impl From<Number> for PdfObject {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => Self::Int(i),
            Number::Real(r) => Self::Real(r),
        }
    }
}

/// Stream object: dictionary plus a zero-copy slice of the raw payload.
///
/// Decoded payloads are cached on the stream, one entry per distinct
/// [`FilterLimits`] set.
pub struct PdfStream {
    pub dict: Dictionary,
    raw: Bytes,
    origin: ObjectOrigin,
    decoded: Mutex<Vec<(FilterLimits, Bytes)>>,
}

impl PdfStream {
    pub fn new(dict: Dictionary, raw: impl Into<Bytes>, origin: ObjectOrigin) -> Self {
        Self {
            dict,
            raw: raw.into(),
            origin,
            decoded: Mutex::new(Vec::new()),
        }
    }

    /// Raw payload as stored in the file (still encrypted and encoded).
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub const fn origin(&self) -> ObjectOrigin {
        self.origin
    }

    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        dict_get(&self.dict, key)
    }

    pub(crate) fn cached_decode(&self, limits: &FilterLimits) -> Option<Bytes> {
        let cache = self.decoded.lock().ok()?;
        cache
            .iter()
            .find(|(key, _)| key == limits)
            .map(|(_, data)| data.clone())
    }

    pub(crate) fn store_decode(&self, limits: FilterLimits, data: Bytes) {
        if let Ok(mut cache) = self.decoded.lock()
            && !cache.iter().any(|(key, _)| *key == limits)
        {
            cache.push((limits, data));
        }
    }
}

impl Clone for PdfStream {
    fn clone(&self) -> Self {
        Self::new(self.dict.clone(), self.raw.clone(), self.origin)
    }
}

impl PartialEq for PdfStream {
    fn eq(&self, other: &Self) -> bool {
        self.dict == other.dict && self.raw == other.raw
    }
}

impl fmt::Debug for PdfStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfStream")
            .field("dict", &self.dict)
            .field("raw_len", &self.raw.len())
            .field("origin", &self.origin)
            .finish()
    }
}

/// Build a [`Dictionary`] from `(key, value)` pairs.
pub fn dictionary<I, K>(entries: I) -> Dictionary
where
    I: IntoIterator<Item = (K, PdfObject)>,
    K: AsRef<str>,
{
    entries
        .into_iter()
        .map(|(k, v)| (Name::new(k.as_ref()), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_compare_by_bytes() {
        let a = Name::new("Type");
        let b = Name::from_bytes(b"Type");
        assert_eq!(a, b);
        assert_eq!(a, "Type");
        assert_eq!(format!("{a:?}"), "/Type");
    }

    #[test]
    fn test_non_utf8_names_stay_distinct() {
        let a = Name::from_bytes(&[b'A', 0x80]);
        let b = Name::from_bytes(&[b'A', 0xFF]);
        assert_ne!(a, b);
        assert_eq!(format!("{a:?}"), "/A#80");
        assert_eq!(a.as_bytes(), &[b'A', 0x80]);
    }

    #[test]
    fn test_refs_equal_by_number_and_generation() {
        assert_eq!(PdfObject::Ref(ObjectId::new(4, 0)), PdfObject::Ref(ObjectId::new(4, 0)));
        assert_ne!(PdfObject::Ref(ObjectId::new(4, 0)), PdfObject::Ref(ObjectId::new(4, 1)));
    }

    #[test]
    fn test_accessor_type_errors() {
        let obj = PdfObject::name("Page");
        assert!(matches!(
            obj.as_int(),
            Err(PdfError::TypeError { expected: "int", got: "name" })
        ));
        assert_eq!(PdfObject::Real(2.9).as_int().unwrap(), 2);
    }

    #[test]
    fn test_stream_equality_ignores_cache_and_origin() {
        let dict = dictionary([("Length", PdfObject::Int(3))]);
        let a = PdfStream::new(dict.clone(), Bytes::from_static(b"abc"), ObjectOrigin::Trailer);
        let b = PdfStream::new(dict, b"abc".to_vec(), ObjectOrigin::Indirect(ObjectId::new(1, 0)));
        a.store_decode(FilterLimits::none(), Bytes::from_static(b"xyz"));
        assert_eq!(a, b);
        assert_eq!(
            a.cached_decode(&FilterLimits::none()).as_deref(),
            Some(&b"xyz"[..])
        );
        assert!(b.cached_decode(&FilterLimits::none()).is_none());
    }
}
