//! Path construction and painting operators.
//!
//! Handles: m, l, c, v, y, h, re, S, s, f, F, f*, B, B*, b, b*, n, W, W*, sh
//!
//! Painting operators combine with a clip requested by a preceding `W` or
//! `W*`; the request is cleared by every painting operator. Painting an
//! empty path emits nothing.

use crate::error::Result;
use crate::interp::commands::{DrawCommand, DrawingSink, PathCommand, PathSegment, WindingRule};
use crate::interp::interpreter::ContentInterpreter;
use crate::model::color::Paint;
use crate::model::objects::{Name, PdfObject, dict_get};
use crate::utils::normalize_rect;

/// Segments of an axis-aligned rectangle, as `re` appends them.
pub(crate) fn rect_segments(x: f64, y: f64, w: f64, h: f64) -> [PathSegment; 5] {
    [
        PathSegment::MoveTo((x, y)),
        PathSegment::LineTo((x + w, y)),
        PathSegment::LineTo((x + w, y + h)),
        PathSegment::LineTo((x, y + h)),
        PathSegment::Close,
    ]
}

#[allow(non_snake_case)]
impl<S: DrawingSink> ContentInterpreter<'_, S> {
    // ========================================================================
    // Path Construction Operators
    // ========================================================================

    /// Begins a new subpath.
    ///
    /// PDF operator: `m`
    pub fn do_m(&mut self, x: f64, y: f64) {
        self.path.push(PathSegment::MoveTo((x, y)));
        self.current_point = Some((x, y));
        self.subpath_start = Some((x, y));
    }

    /// PDF operator: `l`
    pub fn do_l(&mut self, x: f64, y: f64) {
        self.path.push(PathSegment::LineTo((x, y)));
        self.current_point = Some((x, y));
    }

    /// Appends a cubic Bezier curve.
    ///
    /// PDF operator: `c`
    pub fn do_c(&mut self, p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)) {
        self.path.push(PathSegment::CurveTo(p1, p2, p3));
        self.current_point = Some(p3);
    }

    /// Curve whose first control point is the current point.
    ///
    /// PDF operator: `v`
    pub fn do_v(&mut self, p2: (f64, f64), p3: (f64, f64)) {
        let p1 = self.current_point.unwrap_or((0.0, 0.0));
        self.do_c(p1, p2, p3);
    }

    /// Curve whose second control point is the end point.
    ///
    /// PDF operator: `y`
    pub fn do_y(&mut self, p1: (f64, f64), p3: (f64, f64)) {
        self.do_c(p1, p3, p3);
    }

    /// Closes the current subpath. Closing an empty or already closed path
    /// is ignored.
    ///
    /// PDF operator: `h`
    pub fn do_h(&mut self) {
        if matches!(self.path.last(), None | Some(PathSegment::Close)) {
            return;
        }
        self.path.push(PathSegment::Close);
        self.current_point = self.subpath_start;
    }

    /// Appends a closed rectangle subpath.
    ///
    /// PDF operator: `re`
    pub fn do_re(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.path.extend(rect_segments(x, y, w, h));
        self.current_point = Some((x, y));
        self.subpath_start = Some((x, y));
    }

    // ========================================================================
    // Path Painting Operators
    // ========================================================================

    /// Emit the current path and start a new one.
    fn paint_path(&mut self, stroke: bool, fill: bool, even_odd: bool) {
        let segments = std::mem::take(&mut self.path);
        let clip = self.pending_clip.take();
        self.current_point = None;
        self.subpath_start = None;
        if segments.is_empty() || (!stroke && !fill && clip.is_none()) {
            return;
        }
        let winding = if even_odd || clip == Some(true) {
            WindingRule::EvenOdd
        } else {
            WindingRule::NonZero
        };
        self.emit(DrawCommand::Path(PathCommand {
            segments,
            stroke,
            fill,
            clip: clip.is_some(),
            winding,
            stroke_adjust: self.gstate.stroke_adjust,
            overprint: self.gstate.overprint,
        }));
    }

    /// PDF operator: `S`
    pub fn do_S(&mut self) {
        self.paint_path(true, false, false);
    }

    /// Closes and strokes the path.
    ///
    /// PDF operator: `s`
    pub fn do_s(&mut self) {
        self.do_h();
        self.paint_path(true, false, false);
    }

    /// Fills with the nonzero winding rule. `F` is an alias.
    ///
    /// PDF operator: `f`
    pub fn do_f(&mut self) {
        self.do_h();
        self.paint_path(false, true, false);
    }

    /// PDF operator: `f*`
    pub fn do_f_star(&mut self) {
        self.paint_path(false, true, true);
    }

    /// PDF operator: `B`
    pub fn do_B(&mut self) {
        self.paint_path(true, true, false);
    }

    /// PDF operator: `B*`
    pub fn do_B_star(&mut self) {
        self.paint_path(true, true, true);
    }

    /// PDF operator: `b`
    pub fn do_b(&mut self) {
        self.do_h();
        self.paint_path(true, true, false);
    }

    /// PDF operator: `b*`
    pub fn do_b_star(&mut self) {
        self.do_h();
        self.paint_path(true, true, true);
    }

    /// Ends the path without painting; only a pending clip is emitted.
    ///
    /// PDF operator: `n`
    pub fn do_n(&mut self) {
        if self.pending_clip.is_some() {
            self.do_h();
        }
        self.paint_path(false, false, false);
    }

    /// PDF operator: `W`
    pub fn do_W(&mut self) {
        self.pending_clip = Some(false);
    }

    /// PDF operator: `W*`
    pub fn do_W_star(&mut self) {
        self.pending_clip = Some(true);
    }

    /// Paints a shading over its `/BBox`, or over the whole clip region
    /// when it has none.
    ///
    /// PDF operator: `sh`
    pub fn do_sh(&mut self, name: Name) -> Result<()> {
        let shading = self.resource("Shading", &name)?;
        let dict = shading.as_dict()?;
        let shading_type = match dict_get(dict, "ShadingType") {
            Some(v) => self.resolve(v)?.as_int()?,
            None => 0,
        };
        let segments = match dict_get(dict, "BBox").map(|b| self.resolve(b)).transpose()? {
            Some(PdfObject::Array(bbox)) if bbox.len() == 4 => {
                let nums = bbox.iter().map(PdfObject::as_num).collect::<Result<Vec<_>>>()?;
                let (x0, y0, x1, y1) = normalize_rect((nums[0], nums[1], nums[2], nums[3]));
                rect_segments(x0, y0, x1 - x0, y1 - y0).to_vec()
            }
            _ => Vec::new(),
        };

        self.emit(DrawCommand::Push);
        self.emit(DrawCommand::FillPaint(Paint::Shading { name, shading_type }));
        self.emit(DrawCommand::Path(PathCommand {
            segments,
            fill: true,
            stroke_adjust: self.gstate.stroke_adjust,
            overprint: self.gstate.overprint,
            ..PathCommand::default()
        }));
        self.emit(DrawCommand::Pop);
        Ok(())
    }
}
