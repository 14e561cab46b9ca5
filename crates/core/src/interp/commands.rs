//! Drawing commands produced by the content interpreter.
//!
//! The interpreter does not rasterize anything. It hands an ordered list of
//! [`DrawCommand`]s to a [`DrawingSink`]; a backend replays them against its
//! own graphics stack (`Push`/`Pop` bracket state changes exactly like
//! `q`/`Q`).

use std::sync::Arc;

use crate::model::color::Paint;
use crate::model::objects::{Name, PdfStream};
use crate::model::state::Overprint;
use crate::utils::{Matrix, Point};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PathSegment {
    MoveTo(Point),
    LineTo(Point),
    CurveTo(Point, Point, Point),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum WindingRule {
    #[default]
    NonZero,
    EvenOdd,
}

/// A painted and/or clipping path.
///
/// An empty segment list with `fill` set paints the whole current clip
/// region (`sh` on a shading without a bounding box).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PathCommand {
    pub segments: Vec<PathSegment>,
    pub stroke: bool,
    pub fill: bool,
    /// Intersect the clip with this path after painting.
    pub clip: bool,
    pub winding: WindingRule,
    pub stroke_adjust: bool,
    pub overprint: Overprint,
}

/// Image placement in the unit square of the current transform.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCommand {
    /// XObject resource name; `None` for inline images.
    pub name: Option<Name>,
    /// Image dictionary and still-encoded samples. Inline image
    /// dictionaries have their abbreviated keys expanded.
    pub image: Arc<PdfStream>,
    pub overprint: Overprint,
}

impl ImageCommand {
    pub fn is_inline(&self) -> bool {
        self.name.is_none()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ImageCommand {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let int = |key: &str| self.image.get(key).and_then(|v| v.as_int().ok());
        let mut s = serializer.serialize_struct("ImageCommand", 5)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("width", &int("Width"))?;
        s.serialize_field("height", &int("Height"))?;
        s.serialize_field("length", &self.image.raw().len())?;
        s.serialize_field("overprint", &self.overprint)?;
        s.end()
    }
}

/// One element of a shown string: bytes in the font's encoding, or a
/// `TJ` position adjustment in thousandths of text space.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TextItem {
    Bytes(Vec<u8>),
    Adjust(f64),
}

/// A run of text shown under one unchanged text state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TextCommand {
    pub font: Option<Name>,
    pub font_size: f64,
    pub char_spacing: f64,
    pub word_spacing: f64,
    pub scaling: f64,
    pub leading: f64,
    pub render_mode: i64,
    pub rise: f64,
    /// Text matrix at the start of the run.
    pub matrix: Matrix,
    pub overprint: Overprint,
    pub items: Vec<TextItem>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DrawCommand {
    Push,
    Pop,
    /// Concatenate with the current transform.
    Transform(Matrix),
    StrokeWidth(f64),
    EndCap(i64),
    LineJoin(i64),
    MiterLimit(f64),
    Dash { array: Vec<f64>, phase: f64 },
    StrokeAlpha(f64),
    FillAlpha(f64),
    StrokePaint(Paint),
    FillPaint(Paint),
    Path(PathCommand),
    Image(ImageCommand),
    Text(TextCommand),
}

/// Receiver of interpreted drawing commands.
pub trait DrawingSink {
    fn emit(&mut self, cmd: DrawCommand);

    /// Append a prerecorded list, used when replaying Form XObjects.
    fn emit_all(&mut self, cmds: &[DrawCommand]) {
        for cmd in cmds {
            self.emit(cmd.clone());
        }
    }
}

impl DrawingSink for Vec<DrawCommand> {
    fn emit(&mut self, cmd: DrawCommand) {
        self.push(cmd);
    }

    fn emit_all(&mut self, cmds: &[DrawCommand]) {
        self.extend_from_slice(cmds);
    }
}

impl<S: DrawingSink + ?Sized> DrawingSink for &mut S {
    fn emit(&mut self, cmd: DrawCommand) {
        (**self).emit(cmd);
    }

    fn emit_all(&mut self, cmds: &[DrawCommand]) {
        (**self).emit_all(cmds);
    }
}

/// Recorded command sequence. Cheap to share once complete.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CommandList {
    commands: Vec<DrawCommand>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DrawCommand> {
        self.commands.iter()
    }

    pub fn into_vec(self) -> Vec<DrawCommand> {
        self.commands
    }
}

impl DrawingSink for CommandList {
    fn emit(&mut self, cmd: DrawCommand) {
        self.commands.push(cmd);
    }

    fn emit_all(&mut self, cmds: &[DrawCommand]) {
        self.commands.extend_from_slice(cmds);
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a DrawCommand;
    type IntoIter = std::slice::Iter<'a, DrawCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sinks_record_in_order() {
        let mut list = CommandList::new();
        list.emit(DrawCommand::Push);
        list.emit_all(&[DrawCommand::StrokeWidth(2.0), DrawCommand::Pop]);
        assert_eq!(
            list.commands(),
            &[DrawCommand::Push, DrawCommand::StrokeWidth(2.0), DrawCommand::Pop]
        );

        let mut vec: Vec<DrawCommand> = Vec::new();
        fn emit_through<S: DrawingSink>(mut sink: S) {
            sink.emit(DrawCommand::Push);
        }
        emit_through(&mut vec);
        assert_eq!(vec, vec![DrawCommand::Push]);
    }
}
