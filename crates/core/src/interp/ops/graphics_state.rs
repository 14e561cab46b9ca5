//! Graphics state operators.
//!
//! Handles: q, Q, cm, w, J, j, M, d, gs
//!
//! `ri` and `i` are accepted by the dispatcher and only consume operands.

use crate::error::Result;
use crate::interp::commands::{DrawCommand, DrawingSink};
use crate::interp::interpreter::ContentInterpreter;
use crate::model::objects::{Dictionary, Name, PdfObject, dict_get};
use crate::utils::{Matrix, mult_matrix};

#[allow(non_snake_case)]
impl<S: DrawingSink> ContentInterpreter<'_, S> {
    /// Saves the graphics state.
    ///
    /// PDF operator: `q`
    pub fn do_q(&mut self) {
        self.gstack.push(self.gstate.clone());
        self.emit(DrawCommand::Push);
    }

    /// Restores the most recently saved graphics state. Unbalanced `Q`
    /// operators are ignored.
    ///
    /// PDF operator: `Q`
    pub fn do_Q(&mut self) {
        match self.gstack.pop() {
            Some(saved) => {
                self.gstate = saved;
                self.emit(DrawCommand::Pop);
            }
            None => tracing::debug!(pos = self.op_pos, "Q without matching q"),
        }
    }

    /// Concatenates `m` to the current transformation matrix.
    ///
    /// PDF operator: `cm`
    pub fn do_cm(&mut self, m: Matrix) {
        self.gstate.ctm = mult_matrix(m, self.gstate.ctm);
        self.emit(DrawCommand::Transform(m));
    }

    /// PDF operator: `w`
    pub fn do_w(&mut self, width: f64) {
        self.gstate.line_width = width;
        self.emit(DrawCommand::StrokeWidth(width));
    }

    /// PDF operator: `J`
    pub fn do_J(&mut self, cap: i64) {
        self.emit(DrawCommand::EndCap(cap));
    }

    /// PDF operator: `j`
    pub fn do_j(&mut self, join: i64) {
        self.emit(DrawCommand::LineJoin(join));
    }

    /// PDF operator: `M`
    pub fn do_M(&mut self, limit: f64) {
        self.emit(DrawCommand::MiterLimit(limit));
    }

    /// Sets the dash pattern.
    ///
    /// PDF operator: `d`
    pub fn do_d(&mut self, array: Vec<f64>, phase: f64) {
        self.emit(DrawCommand::Dash { array, phase });
    }

    /// Applies the parameters of a named ExtGState dictionary.
    ///
    /// Recognised keys: LW, LC, LJ, ML, D, Font, CA, ca, SA, OP, op, OPM.
    ///
    /// PDF operator: `gs`
    pub fn do_gs(&mut self, name: Name) -> Result<()> {
        let params = self.resource("ExtGState", &name)?;
        let params = params.as_dict()?;
        let mut handled = false;
        if let Some(lw) = self.param(params, "LW")? {
            let width = lw.as_num()?;
            self.gstate.line_width = width;
            self.emit(DrawCommand::StrokeWidth(width));
            handled = true;
        }
        if let Some(lc) = self.param(params, "LC")? {
            self.emit(DrawCommand::EndCap(lc.as_int()?));
            handled = true;
        }
        if let Some(lj) = self.param(params, "LJ")? {
            self.emit(DrawCommand::LineJoin(lj.as_int()?));
            handled = true;
        }
        if let Some(ml) = self.param(params, "ML")? {
            self.emit(DrawCommand::MiterLimit(ml.as_num()?));
            handled = true;
        }
        if let Some(dash) = self.param(params, "D")? {
            if let [array, phase] = dash.as_array()? {
                let array = self
                    .resolve(array)?
                    .as_array()?
                    .iter()
                    .map(PdfObject::as_num)
                    .collect::<Result<Vec<_>>>()?;
                let phase = self.resolve(phase)?.as_num()?;
                self.emit(DrawCommand::Dash { array, phase });
            }
            handled = true;
        }
        if let Some(font) = self.param(params, "Font")? {
            if let [font_ref, size] = font.as_array()? {
                let size = self.resolve(size)?.as_num()?;
                self.flush_text();
                self.gstate.text.font_name = None;
                self.gstate.text.font = Some(self.resolve(font_ref)?);
                self.gstate.text.font_size = size;
            }
            handled = true;
        }
        if let Some(ca) = self.param(params, "CA")? {
            self.emit(DrawCommand::StrokeAlpha(ca.as_num()?));
            handled = true;
        }
        if let Some(ca) = self.param(params, "ca")? {
            self.emit(DrawCommand::FillAlpha(ca.as_num()?));
            handled = true;
        }
        if let Some(sa) = self.param(params, "SA")? {
            self.gstate.stroke_adjust = sa.as_bool()?;
            handled = true;
        }
        let opm = self.param(params, "OPM")?.map(|v| v.as_int()).transpose()?;
        if let Some(op) = self.param(params, "OP")? {
            self.gstate.overprint.stroke = op.as_bool()?;
            handled = true;
        }
        if let Some(op) = self.param(params, "op")? {
            self.gstate.overprint.fill = op.as_bool()?;
            handled = true;
        }
        if let Some(mode) = opm {
            self.gstate.overprint.mode = mode;
            handled = true;
        }
        if !handled {
            tracing::debug!(%name, "ExtGState without supported parameters");
        }
        Ok(())
    }

    fn param(&self, params: &Dictionary, key: &str) -> Result<Option<PdfObject>> {
        dict_get(params, key).map(|v| self.resolve(v)).transpose()
    }
}
