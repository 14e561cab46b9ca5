//! Graphics and text state tracked by the content interpreter.

use std::sync::Arc;

use super::color::{ColorSpace, Paint, device_gray};
use super::objects::{Name, PdfObject};
use crate::utils::{MATRIX_IDENTITY, Matrix};

/// Text state. Deep-copied on every `q`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextState {
    /// Font resource name from the last `Tf`.
    pub font_name: Option<Name>,
    /// The resolved font dictionary, when the resource exists.
    pub font: Option<PdfObject>,
    pub font_size: f64,
    pub char_spacing: f64,
    pub word_spacing: f64,
    /// Horizontal scaling in percent (100 = normal).
    pub scaling: f64,
    pub leading: f64,
    pub render_mode: i64,
    pub rise: f64,
    pub matrix: Matrix,
    pub line_matrix: Matrix,
}

impl TextState {
    pub fn new() -> Self {
        Self {
            font_name: None,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            scaling: 100.0,
            leading: 0.0,
            render_mode: 0,
            rise: 0.0,
            matrix: MATRIX_IDENTITY,
            line_matrix: MATRIX_IDENTITY,
        }
    }

    /// Reset the text and line matrices (`BT`).
    pub fn reset(&mut self) {
        self.matrix = MATRIX_IDENTITY;
        self.line_matrix = MATRIX_IDENTITY;
    }
}

impl Default for TextState {
    fn default() -> Self {
        Self::new()
    }
}

/// Overprint parameters set through `gs` (`OP`, `op`, `OPM`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Overprint {
    pub stroke: bool,
    pub fill: bool,
    pub mode: i64,
}

/// Graphics state saved and restored by `q`/`Q`.
///
/// Color spaces are immutable and shared between copies; everything else
/// is owned.
#[derive(Debug, Clone)]
pub struct GraphicsState {
    pub ctm: Matrix,
    pub line_width: f64,
    pub stroke_space: Arc<ColorSpace>,
    pub fill_space: Arc<ColorSpace>,
    pub stroke_paint: Paint,
    pub fill_paint: Paint,
    /// Automatic stroke adjustment (`SA`).
    pub stroke_adjust: bool,
    pub overprint: Overprint,
    pub text: TextState,
}

impl GraphicsState {
    pub fn new() -> Self {
        Self {
            ctm: MATRIX_IDENTITY,
            line_width: 1.0,
            stroke_space: device_gray(),
            fill_space: device_gray(),
            stroke_paint: Paint::Gray(0.0),
            fill_paint: Paint::Gray(0.0),
            stroke_adjust: false,
            overprint: Overprint::default(),
            text: TextState::new(),
        }
    }
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_color_space_and_copies_text() {
        let mut state = GraphicsState::new();
        state.text.font_size = 12.0;
        let mut copy = state.clone();
        copy.text.font_size = 8.0;
        assert!(Arc::ptr_eq(&state.fill_space, &copy.fill_space));
        assert_eq!(state.text.font_size, 12.0);
    }
}
