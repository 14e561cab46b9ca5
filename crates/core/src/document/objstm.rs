//! Objects stored inside compressed object streams.

use bytes::Bytes;

use super::catalog::Document;
use crate::error::Result;
use crate::model::objects::{ObjectId, ObjectOrigin, PdfObject};
use crate::parser::object_parser::ObjectParser;

/// Read entry `index` of object stream `container`, which the xref table
/// says holds object `id`.
///
/// The container is the unit of encryption, so the embedded object is
/// parsed without further decryption. Any inconsistency yields `Null`.
pub(crate) fn read_compressed(
    doc: &Document,
    container: u32,
    index: u32,
    id: ObjectId,
) -> Result<PdfObject> {
    let container_obj = doc.dereference(ObjectId::new(container, 0))?;
    let Ok(stream) = container_obj.as_stream() else {
        tracing::warn!(container, object = %id, "object stream container is not a stream");
        return Ok(PdfObject::Null);
    };

    let n = doc.dict_get_as_int(&stream.dict, "N")?.unwrap_or(0);
    let first = doc.dict_get_as_int(&stream.dict, "First")?.unwrap_or(0);
    if i64::from(index) >= n || first < 0 {
        tracing::debug!(container, index, n, "object stream index out of range");
        return Ok(PdfObject::Null);
    }

    let data: Bytes = doc.decode_stream(stream)?;
    let mut header = ObjectParser::new(&data, 0).hex_names(doc.version().hex_names());
    let mut offset = None;
    for i in 0..=index {
        let num = header.read_object(ObjectOrigin::Embedded)?.as_int()?;
        let off = header.read_object(ObjectOrigin::Embedded)?.as_int()?;
        if i == index {
            if num != i64::from(id.num) {
                tracing::warn!(
                    container,
                    index,
                    found = num,
                    expected = id.num,
                    "object stream entry holds a different object"
                );
                return Ok(PdfObject::Null);
            }
            offset = Some(off);
        }
    }

    let Some(pos) = offset
        .and_then(|off| first.checked_add(off))
        .and_then(|pos| usize::try_from(pos).ok())
        .filter(|&pos| pos < data.len())
    else {
        return Ok(PdfObject::Null);
    };
    ObjectParser::new(&data, pos)
        .hex_names(doc.version().hex_names())
        .with_resolver(doc)
        .read_object(ObjectOrigin::Indirect(id))
}
