//! Page tree lookup and page attributes.
//!
//! Pages are found by descending `/Kids` using each node's `/Count`, so
//! only the nodes on the path to the requested page are parsed. Inherited
//! attributes are collected along that path.

use bytes::{Bytes, BytesMut};
use rustc_hash::FxHashSet;

use super::catalog::Document;
use crate::error::{PdfError, Result};
use crate::interp::commands::DrawingSink;
use crate::interp::interpreter::ContentInterpreter;
use crate::model::objects::{Dictionary, ObjectId, PdfObject, dict_get};
use crate::utils::{Rect, normalize_rect};

/// `[x0 y0 x1 y1]` with the corners put in lower-left, upper-right order.
pub fn parse_normalised_rectangle(obj: &PdfObject) -> Result<Rect> {
    let PdfObject::Array(items) = obj else {
        return Err(PdfError::format(0, format!("rectangle is a {}, not an array", obj.type_name())));
    };
    match items.as_slice() {
        [x0, y0, x1, y1] => Ok(normalize_rect((x0.as_num()?, y0.as_num()?, x1.as_num()?, y1.as_num()?))),
        _ => Err(PdfError::format(0, format!("rectangle has {} elements, not 4", items.len()))),
    }
}

/// A page with its inherited attributes resolved.
#[derive(Debug, Clone)]
pub struct Page<'a> {
    doc: &'a Document,
    number: usize,
    id: Option<ObjectId>,
    dict: Dictionary,
    resources: Dictionary,
    media_box: Option<Rect>,
    crop_box: Option<Rect>,
    trim_box: Option<Rect>,
    rotate: i64,
}

impl<'a> Page<'a> {
    /// 1-based page number.
    pub const fn number(&self) -> usize {
        self.number
    }

    pub const fn id(&self) -> Option<ObjectId> {
        self.id
    }

    pub const fn dict(&self) -> &Dictionary {
        &self.dict
    }

    /// Resources of the page merged over those of its ancestors.
    pub const fn resources(&self) -> &Dictionary {
        &self.resources
    }

    pub const fn media_box(&self) -> Option<Rect> {
        self.media_box
    }

    pub const fn crop_box(&self) -> Option<Rect> {
        self.crop_box
    }

    pub const fn trim_box(&self) -> Option<Rect> {
        self.trim_box
    }

    /// The visible area: TrimBox, else CropBox, else MediaBox.
    pub fn bbox(&self) -> Option<Rect> {
        self.trim_box.or(self.crop_box).or(self.media_box)
    }

    /// Rotation in degrees, normalised to 0, 90, 180 or 270.
    pub const fn rotate(&self) -> i64 {
        self.rotate
    }

    /// All content streams of the page, decoded and joined.
    ///
    /// Streams are separated by a newline so that tokens cannot run
    /// together across a stream boundary.
    pub fn contents(&self) -> Result<Bytes> {
        let Some(contents) = dict_get(&self.dict, "Contents") else {
            return Ok(Bytes::new());
        };
        match self.doc.resolve(contents)? {
            PdfObject::Null => Ok(Bytes::new()),
            PdfObject::Stream(stream) => self.doc.decode_stream(&stream),
            PdfObject::Array(parts) => {
                let mut out = BytesMut::new();
                for (i, part) in parts.iter().enumerate() {
                    let PdfObject::Stream(stream) = self.doc.resolve(part)? else {
                        return Err(PdfError::format(
                            0,
                            format!("page {} content element {i} is not a stream", self.number),
                        ));
                    };
                    if i > 0 {
                        out.extend_from_slice(b"\n");
                    }
                    out.extend_from_slice(&self.doc.decode_stream(&stream)?);
                }
                Ok(out.freeze())
            }
            other => Err(PdfError::format(
                0,
                format!("page {} /Contents is a {}", self.number, other.type_name()),
            )),
        }
    }

    /// Interpreter over this page's contents and resources.
    pub fn interpreter<S: DrawingSink>(&self, sink: S) -> Result<ContentInterpreter<'a, S>> {
        Ok(ContentInterpreter::new(self.contents()?, self.resources.clone(), sink).with_document(self.doc))
    }
}

impl Document {
    fn page_root(&self) -> Result<PdfObject> {
        dict_get(self.root(), "Pages")
            .cloned()
            .ok_or_else(|| PdfError::runtime("catalog has no /Pages"))
    }

    /// `/Count` of the page tree root; 0 when it cannot be read.
    pub fn page_count(&self) -> usize {
        let count = self
            .page_root()
            .and_then(|pages| self.get_dict(&pages))
            .and_then(|pages| self.dict_get_as_int(&pages, "Count"));
        match count {
            Ok(Some(n)) => usize::try_from(n).unwrap_or(0),
            Ok(None) => 0,
            Err(err) => {
                tracing::debug!(error = %err, "unreadable page count");
                0
            }
        }
    }

    /// Page `number`, counting from 1.
    pub fn page(&self, number: usize) -> Result<Page<'_>> {
        if number == 0 {
            return Err(PdfError::runtime("page numbers start at 1"));
        }
        let (id, chain) = self.page_path(number)?;

        let mut resources = Dictionary::default();
        for node in &chain {
            if let Some(res) = self.dict_get_as_dict(node, "Resources")? {
                resources.extend(res);
            }
        }
        let inherited = |key: &str| chain.iter().rev().find_map(|node| dict_get(node, key));
        let rect = |key: &str| -> Result<Option<Rect>> {
            match inherited(key) {
                Some(value) => {
                    let value = match self.resolve(value)? {
                        PdfObject::Array(items) => PdfObject::Array(
                            items.iter().map(|v| self.resolve(v)).collect::<Result<Vec<_>>>()?,
                        ),
                        other => other,
                    };
                    parse_normalised_rectangle(&value).map(Some)
                }
                None => Ok(None),
            }
        };
        let media_box = rect("MediaBox")?;
        let crop_box = rect("CropBox")?;
        let trim_box = rect("TrimBox")?;
        let rotate = match inherited("Rotate") {
            Some(r) => self.get_int(r)?.rem_euclid(360) / 90 * 90,
            None => 0,
        };

        let dict = chain.last().cloned().unwrap_or_default();
        tracing::debug!(page = number, object = ?id, "located page");
        Ok(Page {
            doc: self,
            number,
            id,
            dict,
            resources,
            media_box,
            crop_box,
            trim_box,
            rotate,
        })
    }

    /// Nodes from the tree root down to page `number`.
    fn page_path(&self, number: usize) -> Result<(Option<ObjectId>, Vec<Dictionary>)> {
        let mut node_ref = self.page_root()?;
        let mut start = 0usize;
        let mut chain = Vec::new();
        let mut visited = FxHashSet::default();

        loop {
            if let Some(id) = node_ref.as_ref_id()
                && !visited.insert(id)
            {
                return Err(PdfError::runtime(format!("page tree cycle through {id}")));
            }
            let node = self.get_dict(&node_ref)?;
            let kids = match dict_get(&node, "Kids") {
                Some(kids) if !self.is_dict_type(&node, "Page") => self.get_array(kids)?,
                _ if start + 1 != number => {
                    return Err(PdfError::runtime(format!("page {number} not found")));
                }
                _ => {
                    chain.push(node);
                    return Ok((node_ref.as_ref_id(), chain));
                }
            };
            chain.push(node);

            let mut next = None;
            for kid in kids {
                let kid_dict = self.get_dict(&kid)?;
                let count = if self.is_dict_type(&kid_dict, "Page") {
                    1
                } else {
                    self.dict_get_as_int(&kid_dict, "Count")?
                        .and_then(|n| usize::try_from(n).ok())
                        .unwrap_or(1)
                };
                if start + count >= number {
                    next = Some(kid);
                    break;
                }
                start += count;
            }
            node_ref = next.ok_or_else(|| PdfError::runtime(format!("page {number} not found")))?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_is_normalised() {
        let rect = PdfObject::Array(vec![
            PdfObject::Int(612),
            PdfObject::Real(792.0),
            PdfObject::Int(0),
            PdfObject::Int(0),
        ]);
        assert_eq!(parse_normalised_rectangle(&rect).unwrap(), (0.0, 0.0, 612.0, 792.0));
    }

    #[test]
    fn test_malformed_rectangles() {
        let short = PdfObject::Array(vec![PdfObject::Int(0), PdfObject::Int(0)]);
        assert!(matches!(parse_normalised_rectangle(&short), Err(PdfError::Format { .. })));
        assert!(matches!(
            parse_normalised_rectangle(&PdfObject::Int(3)),
            Err(PdfError::Format { .. })
        ));
    }
}
