//! Text operators.
//!
//! Handles: BT, ET, Tc, Tw, Tz, TL, Tf, Tr, Ts, Td, TD, Tm, T*, Tj, TJ, ', "
//!
//! Text object:
//! - BT/ET: Begin/end text object
//!
//! Text state:
//! - Tc, Tw: Character and word spacing
//! - Tz: Horizontal scaling
//! - TL: Leading
//! - Tf: Font and size
//! - Tr: Rendering mode
//! - Ts: Rise
//!
//! Text positioning:
//! - Td/TD: Move to the next line (TD also sets leading)
//! - Tm: Set the text matrix
//! - T*: Move to the next line by the current leading
//!
//! Text showing:
//! - Tj, TJ, ', "
//!
//! Shown strings are collected into a [`TextCommand`] run. Consecutive
//! shows under the same text state extend the pending run; any other
//! command, `ET` or the end of the stream flushes it. Glyph advances are
//! not tracked, so the text matrix only moves through the positioning
//! operators.

use crate::error::{PdfError, Result};
use crate::interp::commands::{DrawingSink, TextCommand, TextItem};
use crate::interp::interpreter::ContentInterpreter;
use crate::model::objects::{Name, PdfObject};
use crate::model::state::GraphicsState;
use crate::utils::{Matrix, translate_matrix};

fn run_for(gstate: &GraphicsState) -> TextCommand {
    let text = &gstate.text;
    TextCommand {
        font: text.font_name.clone(),
        font_size: text.font_size,
        char_spacing: text.char_spacing,
        word_spacing: text.word_spacing,
        scaling: text.scaling,
        leading: text.leading,
        render_mode: text.render_mode,
        rise: text.rise,
        matrix: text.matrix,
        overprint: gstate.overprint,
        items: Vec::new(),
    }
}

/// Whether `run` was started under the state `gstate` describes.
fn continues(run: &TextCommand, gstate: &GraphicsState) -> bool {
    let text = &gstate.text;
    run.overprint == gstate.overprint
        && run.font == text.font_name
        && run.font_size == text.font_size
        && run.char_spacing == text.char_spacing
        && run.word_spacing == text.word_spacing
        && run.scaling == text.scaling
        && run.leading == text.leading
        && run.render_mode == text.render_mode
        && run.rise == text.rise
        && run.matrix == text.matrix
}

#[allow(non_snake_case)]
impl<S: DrawingSink> ContentInterpreter<'_, S> {
    fn show(&mut self, items: impl IntoIterator<Item = TextItem>) {
        match &mut self.pending_text {
            Some(run) if continues(run, &self.gstate) => run.items.extend(items),
            _ => {
                self.flush_text();
                let mut run = run_for(&self.gstate);
                run.items.extend(items);
                self.pending_text = Some(run);
            }
        }
    }

    // ========================================================================
    // Text Object Operators
    // ========================================================================

    /// Resets the text and line matrices.
    ///
    /// PDF operator: `BT`
    pub fn do_BT(&mut self) {
        self.gstate.text.reset();
    }

    /// PDF operator: `ET`
    pub fn do_ET(&mut self) {
        self.flush_text();
    }

    // ========================================================================
    // Text State Operators
    // ========================================================================

    /// PDF operator: `Tc`
    pub fn do_Tc(&mut self, spacing: f64) {
        self.gstate.text.char_spacing = spacing;
    }

    /// PDF operator: `Tw`
    pub fn do_Tw(&mut self, spacing: f64) {
        self.gstate.text.word_spacing = spacing;
    }

    /// Horizontal scaling in percent.
    ///
    /// PDF operator: `Tz`
    pub fn do_Tz(&mut self, scale: f64) {
        self.gstate.text.scaling = scale;
    }

    /// PDF operator: `TL`
    pub fn do_TL(&mut self, leading: f64) {
        self.gstate.text.leading = leading;
    }

    /// Selects a font from the `/Font` resources. An unknown font name is
    /// an error.
    ///
    /// PDF operator: `Tf`
    pub fn do_Tf(&mut self, name: Name, size: f64) -> Result<()> {
        let font = self.resource("Font", &name)?;
        let text = &mut self.gstate.text;
        text.font_name = Some(name);
        text.font = Some(font);
        text.font_size = size;
        Ok(())
    }

    /// PDF operator: `Tr`
    pub fn do_Tr(&mut self, mode: i64) {
        self.gstate.text.render_mode = mode;
    }

    /// PDF operator: `Ts`
    pub fn do_Ts(&mut self, rise: f64) {
        self.gstate.text.rise = rise;
    }

    // ========================================================================
    // Text Positioning Operators
    // ========================================================================

    /// Moves to the start of the next line, offset by `(tx, ty)`.
    ///
    /// PDF operator: `Td`
    pub fn do_Td(&mut self, tx: f64, ty: f64) {
        let text = &mut self.gstate.text;
        text.line_matrix = translate_matrix(text.line_matrix, (tx, ty));
        text.matrix = text.line_matrix;
    }

    /// Like `Td`, and sets the leading to `-ty`.
    ///
    /// PDF operator: `TD`
    pub fn do_TD(&mut self, tx: f64, ty: f64) {
        self.gstate.text.leading = -ty;
        self.do_Td(tx, ty);
    }

    /// PDF operator: `Tm`
    pub fn do_Tm(&mut self, m: Matrix) {
        let text = &mut self.gstate.text;
        text.matrix = m;
        text.line_matrix = m;
    }

    /// PDF operator: `T*`
    pub fn do_T_star(&mut self) {
        let leading = self.gstate.text.leading;
        self.do_Td(0.0, -leading);
    }

    // ========================================================================
    // Text Showing Operators
    // ========================================================================

    /// PDF operator: `Tj`
    pub fn do_Tj(&mut self, s: Vec<u8>) {
        self.show([TextItem::Bytes(s)]);
    }

    /// Moves to the next line and shows `s`.
    ///
    /// PDF operator: `'`
    pub fn do_quote(&mut self, s: Vec<u8>) {
        self.do_T_star();
        self.do_Tj(s);
    }

    /// Sets word and character spacing, then behaves like `'`.
    ///
    /// PDF operator: `"`
    pub fn do_double_quote(&mut self, aw: f64, ac: f64, s: Vec<u8>) {
        self.do_Tw(aw);
        self.do_Tc(ac);
        self.do_quote(s);
    }

    /// Shows strings with individual position adjustments.
    ///
    /// PDF operator: `TJ`
    pub fn do_TJ(&mut self, items: Vec<PdfObject>) -> Result<()> {
        let items = items
            .into_iter()
            .map(|item| match item {
                PdfObject::String(s) => Ok(TextItem::Bytes(s)),
                PdfObject::Int(n) => Ok(TextItem::Adjust(n as f64)),
                PdfObject::Real(n) => Ok(TextItem::Adjust(n)),
                other => Err(PdfError::TypeError {
                    expected: "string or number",
                    got: other.type_name(),
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        self.show(items);
        Ok(())
    }
}
