//! Cross-reference tables.
//!
//! Sections are merged newest first, so an entry already present in the
//! table always belongs to a more recent revision and is never replaced.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{PdfError, Result};
use crate::model::objects::{Dictionary, ObjectOrigin, PdfObject, dict_get};
use crate::parser::lexer::Number;
use crate::parser::object_parser::ObjectParser;

/// Highest object number accepted from a table.
const MAX_OBJECT_NUMBER: u32 = 8_388_607;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum XrefEntry {
    Free,
    InUse { offset: usize, generation: u16 },
    Compressed { container: u32, index: u32 },
}

/// Dense table indexed by object number.
#[derive(Debug, Clone, Default)]
pub struct XrefTable {
    entries: Vec<Option<XrefEntry>>,
}

impl XrefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `entry` for `num` unless a newer revision already did.
    /// Returns whether the entry was stored.
    pub fn insert_if_absent(&mut self, num: u32, entry: XrefEntry) -> bool {
        if num > MAX_OBJECT_NUMBER {
            tracing::warn!(num, "xref entry beyond object number limit ignored");
            return false;
        }
        let idx = num as usize;
        if idx >= self.entries.len() {
            self.entries.resize(idx + 1, None);
        }
        if self.entries[idx].is_some() {
            return false;
        }
        self.entries[idx] = Some(entry);
        true
    }

    pub fn get(&self, num: u32) -> Option<XrefEntry> {
        self.entries.get(num as usize).copied().flatten()
    }

    /// One past the highest object number with an entry slot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(Option::is_none)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, XrefEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(num, entry)| entry.map(|e| (num as u32, e)))
    }
}

fn read_header_int(parser: &mut ObjectParser<'_>) -> Result<i64> {
    let cur = parser.cursor();
    cur.skip_whitespace(false);
    let pos = cur.tell();
    match cur.peek() {
        Some(b'0'..=b'9') => match cur.read_number()? {
            Number::Int(n) => Ok(n),
            Number::Real(_) => Err(PdfError::format(pos, "malformed xref subsection header")),
        },
        _ => Err(PdfError::format(pos, "malformed xref subsection header")),
    }
}

/// Read the subsections of a classic table and the trailer that ends it.
///
/// The parser must be positioned just after the `xref` keyword.
pub fn read_classic_section(parser: &mut ObjectParser<'_>, table: &mut XrefTable) -> Result<Dictionary> {
    loop {
        if parser.eat_keyword(b"trailer") {
            let pos = parser.tell();
            return match parser.read_object(ObjectOrigin::Trailer)? {
                PdfObject::Dict(dict) => Ok(dict),
                _ => Err(PdfError::format(pos, "trailer is not a dictionary")),
            };
        }

        let mut start = read_header_int(parser)?;
        let count = read_header_int(parser)?;
        if start < 0 || count < 0 {
            return Err(PdfError::format(parser.tell(), "negative xref subsection header"));
        }

        for i in 0..count {
            let offset = read_header_int(parser)?;
            let generation = read_header_int(parser)?;
            let cur = parser.cursor();
            cur.skip_whitespace(false);
            let flag_pos = cur.tell();
            let flag = cur.read_regular();

            if i == 0 && start == 1 && flag == b"f" && offset == 0 && generation == 65535 {
                tracing::debug!("xref subsection starts at 1 but holds object 0");
                start = 0;
            }
            let Ok(num) = u32::try_from(start + i) else {
                continue;
            };
            let entry = match flag {
                b"n" => XrefEntry::InUse {
                    offset: usize::try_from(offset).unwrap_or(usize::MAX),
                    generation: u16::try_from(generation).unwrap_or(u16::MAX),
                },
                b"f" => XrefEntry::Free,
                _ => return Err(PdfError::format(flag_pos, "xref record flag is not 'n' or 'f'")),
            };
            table.insert_if_absent(num, entry);
        }
    }
}

fn int_array(dict: &Dictionary, key: &str) -> Result<Option<Vec<i64>>> {
    let Some(obj) = dict_get(dict, key) else {
        return Ok(None);
    };
    obj.as_array()?
        .iter()
        .map(PdfObject::as_int)
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn read_field(record: &[u8]) -> u64 {
    if record.is_empty() {
        0
    } else {
        BigEndian::read_uint(record, record.len())
    }
}

/// Merge the records of a decoded cross-reference stream.
pub fn read_stream_records(data: &[u8], dict: &Dictionary, table: &mut XrefTable) -> Result<()> {
    let widths = int_array(dict, "W")?
        .ok_or_else(|| PdfError::format(0, "xref stream has no /W"))?;
    let [w0, w1, w2] = widths[..] else {
        return Err(PdfError::format(0, "xref stream /W must have three entries"));
    };
    let width = |w: i64| match usize::try_from(w) {
        Ok(w) if w <= 8 => Ok(w),
        _ => Err(PdfError::format(0, format!("unsupported xref field width {w}"))),
    };
    let (w0, w1, w2) = (width(w0)?, width(w1)?, width(w2)?);
    let record_len = w0 + w1 + w2;
    if record_len == 0 {
        return Err(PdfError::format(0, "xref stream records are empty"));
    }

    let size = dict_get(dict, "Size").map(PdfObject::as_int).transpose()?.unwrap_or(0);
    let index = int_array(dict, "Index")?.unwrap_or_else(|| vec![0, size]);

    let mut records = data.chunks_exact(record_len);
    for pair in index.chunks_exact(2) {
        let (start, count) = (pair[0], pair[1]);
        for i in 0..count.max(0) {
            let Some(record) = records.next() else {
                tracing::warn!("xref stream shorter than its /Index");
                return Ok(());
            };
            let kind = if w0 == 0 { 1 } else { read_field(&record[..w0]) };
            let field2 = read_field(&record[w0..w0 + w1]);
            let field3 = read_field(&record[w0 + w1..]);
            let Ok(num) = u32::try_from(start + i) else {
                continue;
            };
            let entry = match kind {
                0 => XrefEntry::Free,
                1 => XrefEntry::InUse {
                    offset: field2 as usize,
                    generation: field3 as u16,
                },
                2 => XrefEntry::Compressed {
                    container: field2 as u32,
                    index: field3 as u32,
                },
                // Unknown types are references to the null object.
                _ => continue,
            };
            table.insert_if_absent(num, entry);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::objects::dictionary;
    use bytes::Bytes;

    #[test]
    fn test_newer_entries_are_not_overwritten() {
        let mut table = XrefTable::new();
        assert!(table.insert_if_absent(3, XrefEntry::InUse { offset: 100, generation: 0 }));
        assert!(!table.insert_if_absent(3, XrefEntry::InUse { offset: 5, generation: 0 }));
        assert_eq!(table.get(3), Some(XrefEntry::InUse { offset: 100, generation: 0 }));
        assert_eq!(table.get(2), None);
        assert_eq!(table.get(99), None);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_classic_section_and_trailer() {
        let buf = Bytes::from_static(
            b"0 3\n0000000000 65535 f\r\n0000000017 00000 n\r\n0000000081 00001 n\r\n\
              trailer\n<< /Size 3 /Root 1 0 R >>",
        );
        let mut parser = ObjectParser::new(&buf, 0);
        let mut table = XrefTable::new();
        let trailer = read_classic_section(&mut parser, &mut table).unwrap();
        assert_eq!(table.get(0), Some(XrefEntry::Free));
        assert_eq!(table.get(1), Some(XrefEntry::InUse { offset: 17, generation: 0 }));
        assert_eq!(table.get(2), Some(XrefEntry::InUse { offset: 81, generation: 1 }));
        assert!(dict_get(&trailer, "Root").is_some());
    }

    #[test]
    fn test_off_by_one_subsection_is_corrected() {
        let buf = Bytes::from_static(
            b"1 2\n0000000000 65535 f \n0000000042 00000 n \ntrailer << >>",
        );
        let mut parser = ObjectParser::new(&buf, 0);
        let mut table = XrefTable::new();
        read_classic_section(&mut parser, &mut table).unwrap();
        assert_eq!(table.get(0), Some(XrefEntry::Free));
        assert_eq!(table.get(1), Some(XrefEntry::InUse { offset: 42, generation: 0 }));
    }

    #[test]
    fn test_non_number_subsection_header_is_format_error() {
        let buf = Bytes::from_static(b"zero 3\n");
        let mut parser = ObjectParser::new(&buf, 0);
        let err = read_classic_section(&mut parser, &mut XrefTable::new()).unwrap_err();
        assert!(matches!(err, PdfError::Format { .. }));
    }

    #[test]
    fn test_stream_records_with_index_and_default_type() {
        let dict = dictionary([
            ("W", PdfObject::Array(vec![PdfObject::Int(0), PdfObject::Int(2), PdfObject::Int(1)])),
            ("Index", PdfObject::Array(vec![PdfObject::Int(5), PdfObject::Int(2)])),
        ]);
        let data = [0x01, 0x00, 0x00, 0x00, 0x20, 0x02];
        let mut table = XrefTable::new();
        read_stream_records(&data, &dict, &mut table).unwrap();
        assert_eq!(table.get(5), Some(XrefEntry::InUse { offset: 256, generation: 0 }));
        assert_eq!(table.get(6), Some(XrefEntry::InUse { offset: 32, generation: 2 }));
    }

    #[test]
    fn test_stream_record_types() {
        let dict = dictionary([
            ("W", PdfObject::Array(vec![PdfObject::Int(1), PdfObject::Int(2), PdfObject::Int(1)])),
            ("Size", PdfObject::Int(3)),
        ]);
        let data = [0, 0, 0, 255, 1, 0, 15, 0, 2, 0, 9, 4];
        let mut table = XrefTable::new();
        read_stream_records(&data, &dict, &mut table).unwrap();
        assert_eq!(table.get(0), Some(XrefEntry::Free));
        assert_eq!(table.get(1), Some(XrefEntry::InUse { offset: 15, generation: 0 }));
        assert_eq!(table.get(2), Some(XrefEntry::Compressed { container: 9, index: 4 }));
    }
}
