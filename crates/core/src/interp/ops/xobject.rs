//! XObject and inline image operators.
//!
//! Handles: Do, BI, ID, EI
//!
//! Form XObjects are interpreted once into a [`CommandList`] and memoized
//! in the shared [`FormCache`](crate::interp::FormCache); every later `Do`
//! of the same form replays the list inside a `Push`/`Pop` pair. The list
//! starts with the form matrix and, when the form has a `/BBox`, a clip to
//! it.

use std::sync::Arc;

use bytes::Bytes;

use crate::codec::filters::canonical_filter_name;
use crate::error::{PdfError, Result};
use crate::interp::commands::{CommandList, DrawCommand, DrawingSink, ImageCommand, PathCommand};
use crate::interp::form_cache::FormKey;
use crate::interp::interpreter::{ContentInterpreter, read_operand};
use crate::interp::task::{InterpreterState, StepBudget};
use crate::model::objects::{Dictionary, Name, ObjectId, ObjectOrigin, PdfObject, PdfStream, dict_get};
use crate::parser::content_lexer::{ContentLexer, ContentToken};
use crate::utils::{MATRIX_IDENTITY, Matrix, normalize_rect};

use super::path::rect_segments;

/// Full key for an abbreviated inline image key.
fn inline_key(key: Name) -> Name {
    let full = match key.as_str() {
        "BPC" => "BitsPerComponent",
        "CS" => "ColorSpace",
        "D" => "Decode",
        "DP" => "DecodeParms",
        "F" => "Filter",
        "H" => "Height",
        "IM" => "ImageMask",
        "I" => "Interpolate",
        "L" => "Length",
        "W" => "Width",
        _ => return key,
    };
    Name::new(full)
}

fn inline_color_space(name: Name) -> Name {
    match name.as_str() {
        "G" => Name::new("DeviceGray"),
        "RGB" => Name::new("DeviceRGB"),
        "CMYK" => Name::new("DeviceCMYK"),
        "I" => Name::new("Indexed"),
        _ => name,
    }
}

/// Expand abbreviated names inside an inline image value.
fn inline_value(key: &Name, value: PdfObject) -> PdfObject {
    match (key.as_str(), value) {
        ("ColorSpace", PdfObject::Name(n)) => PdfObject::Name(inline_color_space(n)),
        ("ColorSpace", PdfObject::Array(mut items)) => {
            if let Some(PdfObject::Name(first)) = items.first_mut() {
                *first = inline_color_space(first.clone());
            }
            PdfObject::Array(items)
        }
        ("Filter", PdfObject::Name(n)) => PdfObject::Name(canonical_filter_name(n)),
        ("Filter", PdfObject::Array(items)) => PdfObject::Array(
            items
                .into_iter()
                .map(|item| match item {
                    PdfObject::Name(n) => PdfObject::Name(canonical_filter_name(n)),
                    other => other,
                })
                .collect(),
        ),
        (_, value) => value,
    }
}

fn matrix_from(items: &[PdfObject]) -> Result<Matrix> {
    match items {
        [a, b, c, d, e, f] => Ok((
            a.as_num()?,
            b.as_num()?,
            c.as_num()?,
            d.as_num()?,
            e.as_num()?,
            f.as_num()?,
        )),
        _ => Err(PdfError::runtime("form /Matrix must have 6 numbers")),
    }
}

#[allow(non_snake_case)]
impl<S: DrawingSink> ContentInterpreter<'_, S> {
    /// Paints a named XObject.
    ///
    /// PDF operator: `Do`
    pub fn do_Do(&mut self, name: Name) -> Result<()> {
        let entry = self.resource_entry("XObject", &name)?;
        let xobj = self.resolve(&entry)?;
        let stream = Arc::clone(xobj.as_stream()?);
        let subtype = match stream.get("Subtype").or_else(|| stream.get("S")) {
            Some(v) => Some(self.resolve(v)?.as_name()?),
            None => None,
        };
        match subtype.as_ref().map(Name::as_str) {
            Some("Image") => {
                self.emit(DrawCommand::Image(ImageCommand {
                    name: Some(name),
                    image: stream,
                    overprint: self.gstate.overprint,
                }));
                Ok(())
            }
            Some("Form") => self.do_form(entry.as_ref_id(), stream),
            Some("PS") => {
                tracing::debug!(%name, "skipping PostScript XObject");
                Ok(())
            }
            other => Err(PdfError::runtime(format!(
                "XObject /{name} has unsupported subtype {}",
                other.unwrap_or("(none)")
            ))),
        }
    }

    fn do_form(&mut self, id: Option<ObjectId>, stream: Arc<PdfStream>) -> Result<()> {
        let key = id.map_or_else(|| FormKey::for_stream(&stream), FormKey::Object);
        if self.active_forms.contains(&key) {
            tracing::warn!(?key, "skipping recursive form XObject");
            return Ok(());
        }

        let commands = match self.forms.get(key) {
            Some(commands) => commands,
            None => {
                let Some(commands) = self.interpret_form(key, &stream)? else {
                    return Ok(());
                };
                self.forms.insert(key, &stream, commands)
            }
        };
        self.emit(DrawCommand::Push);
        self.emit_all(commands.commands());
        self.emit(DrawCommand::Pop);
        Ok(())
    }

    /// Interpret a form body into a fresh command list. `None` when the
    /// run was cancelled part way.
    fn interpret_form(&mut self, key: FormKey, stream: &PdfStream) -> Result<Option<CommandList>> {
        let data = self.decode(stream)?;

        let mut resources = self.resources.clone();
        if let Some(own) = stream.get("Resources") {
            let own = self.resolve(own)?;
            resources.extend(own.as_dict()?.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let matrix = match stream.get("Matrix") {
            Some(m) => matrix_from(self.resolve(m)?.as_array()?)?,
            None => MATRIX_IDENTITY,
        };
        let mut list = CommandList::new();
        list.emit(DrawCommand::Transform(matrix));
        if let Some(bbox) = stream.get("BBox") {
            let bbox = self.resolve(bbox)?;
            if let [x0, y0, x1, y1] = bbox.as_array()? {
                let (x0, y0, x1, y1) = normalize_rect((x0.as_num()?, y0.as_num()?, x1.as_num()?, y1.as_num()?));
                list.emit(DrawCommand::Path(PathCommand {
                    segments: rect_segments(x0, y0, x1 - x0, y1 - y0).to_vec(),
                    clip: true,
                    ..PathCommand::default()
                }));
            }
        }

        let mut child = self.nested(data, resources, list, key);
        let state = child.run(StepBudget::Unbounded)?;
        if state == InterpreterState::Stopped {
            tracing::debug!(?key, "form interpretation cancelled");
            return Ok(None);
        }
        Ok(Some(child.into_sink()))
    }

    /// Read an inline image after `BI`: the abbreviated dictionary up to
    /// `ID`, then the raw samples up to `EI`.
    pub(crate) fn read_inline_image(&mut self, lexer: &mut ContentLexer<'_>, data: &Bytes) -> Result<()> {
        let mut dict = Dictionary::default();
        loop {
            let pos = lexer.tell();
            let key = match lexer.next_token()? {
                Some(ContentToken::Operator(b"ID")) => break,
                Some(ContentToken::Name(key)) => inline_key(key),
                Some(_) => return Err(PdfError::format(pos, "inline image key is not a name")),
                None => return Err(PdfError::format(pos, "inline image without ID")),
            };
            let pos = lexer.tell();
            let value = match lexer.next_token()? {
                Some(ContentToken::Operator(_)) | None => {
                    return Err(PdfError::format(pos, "inline image key without value"));
                }
                Some(token) => read_operand(lexer, token)?,
            };
            let value = inline_value(&key, value);
            dict.insert(key, value);
        }

        if matches!(dict_get(&dict, "ImageMask"), Some(PdfObject::Bool(true))) {
            dict.entry(Name::new("Decode"))
                .or_insert_with(|| PdfObject::Array(vec![PdfObject::Int(0), PdfObject::Int(1)]));
        }

        let samples = data.slice_ref(lexer.read_inline_data()?);
        let image = Arc::new(PdfStream::new(dict, samples, ObjectOrigin::Embedded));
        self.emit(DrawCommand::Image(ImageCommand {
            name: None,
            image,
            overprint: self.gstate.overprint,
        }));
        Ok(())
    }
}
