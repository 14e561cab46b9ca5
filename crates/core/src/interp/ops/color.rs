//! Color operators.
//!
//! Handles: CS, cs, SC, SCN, sc, scn, G, g, RG, rg, K, k
//!
//! In a Pattern space `SCN`/`scn` take the pattern name last, preceded by
//! the components of the underlying space for uncolored patterns.

use std::sync::Arc;

use crate::error::{PdfError, Result};
use crate::interp::commands::{DrawCommand, DrawingSink};
use crate::interp::interpreter::ContentInterpreter;
use crate::model::color::{ColorSpace, Paint};
use crate::model::objects::{PdfObject, dict_get};

/// Parse a color space given by family name or array. `resolve` follows
/// indirect references inside the array.
pub fn parse_color_space(
    obj: &PdfObject,
    resolve: &dyn Fn(&PdfObject) -> Result<PdfObject>,
) -> Result<ColorSpace> {
    let items = match obj {
        PdfObject::Name(name) => {
            return ColorSpace::from_family(name.as_str())
                .ok_or_else(|| PdfError::unsupported(format!("color space /{name}")));
        }
        PdfObject::Array(items) => items,
        other => {
            return Err(PdfError::TypeError {
                expected: "color space",
                got: other.type_name(),
            });
        }
    };
    let arg = |i: usize| -> Result<PdfObject> {
        match items.get(i) {
            Some(item) => resolve(item),
            None => Err(PdfError::runtime("color space array is too short")),
        }
    };
    let family = arg(0)?.as_name()?;

    Ok(match family.as_str() {
        "ICCBased" => {
            let profile = arg(1)?;
            let dict = profile.as_dict()?;
            let n = match dict_get(dict, "N") {
                Some(n) => Some(resolve(n)?.as_int()?),
                None => None,
            };
            let components = match n {
                Some(n) => usize::try_from(n).unwrap_or(3),
                None => match dict_get(dict, "Alternate") {
                    Some(alt) => parse_color_space(&resolve(alt)?, resolve)?.ncomponents(),
                    None => 3,
                },
            };
            ColorSpace::IccBased { components }
        }
        "Indexed" | "I" => ColorSpace::Indexed {
            base: Box::new(parse_color_space(&arg(1)?, resolve)?),
            hival: arg(2)?.as_int()?.clamp(0, 255) as u8,
        },
        "Separation" => ColorSpace::Separation {
            colorant: arg(1)?.as_name()?,
            alternate: Box::new(parse_color_space(&arg(2)?, resolve)?),
        },
        "DeviceN" => ColorSpace::DeviceN {
            components: arg(1)?.as_array()?.len(),
            alternate: Box::new(parse_color_space(&arg(2)?, resolve)?),
        },
        "Pattern" => ColorSpace::Pattern {
            underlying: match items.get(1) {
                Some(item) => Some(Box::new(parse_color_space(&resolve(item)?, resolve)?)),
                None => None,
            },
        },
        other => ColorSpace::from_family(other)
            .ok_or_else(|| PdfError::unsupported(format!("color space /{other}")))?,
    })
}

#[allow(non_snake_case)]
impl<S: DrawingSink> ContentInterpreter<'_, S> {
    /// Color space operand of `CS`/`cs`: a family name, a `/ColorSpace`
    /// resource name or an inline array.
    fn color_space_operand(&self, obj: &PdfObject) -> Result<ColorSpace> {
        let resolve = |o: &PdfObject| self.resolve(o);
        if let PdfObject::Name(name) = obj
            && ColorSpace::from_family(name.as_str()).is_none()
        {
            let space = self.resource("ColorSpace", name)?;
            return parse_color_space(&space, &resolve);
        }
        parse_color_space(obj, &resolve)
    }

    fn pattern_paint(&mut self) -> Result<Paint> {
        let name = self.pop_name()?;
        let pattern = self.resource("Pattern", &name)?;
        let pattern_type = match dict_get(pattern.as_dict()?, "PatternType") {
            Some(t) => self.resolve(t)?.as_int()?,
            None => 1,
        };
        let components = self.pop_num_vec(self.operands.len())?.to_vec();
        Ok(Paint::Pattern {
            name,
            pattern_type,
            components,
        })
    }

    fn set_stroke(&mut self, space: ColorSpace, paint: Paint) {
        self.gstate.stroke_space = Arc::new(space);
        self.set_stroke_paint(paint);
    }

    fn set_stroke_paint(&mut self, paint: Paint) {
        self.gstate.stroke_paint = paint.clone();
        self.emit(DrawCommand::StrokePaint(paint));
    }

    fn set_fill(&mut self, space: ColorSpace, paint: Paint) {
        self.gstate.fill_space = Arc::new(space);
        self.set_fill_paint(paint);
    }

    fn set_fill_paint(&mut self, paint: Paint) {
        self.gstate.fill_paint = paint.clone();
        self.emit(DrawCommand::FillPaint(paint));
    }

    /// Selects the stroking color space.
    ///
    /// PDF operator: `CS`
    pub fn do_CS(&mut self, space: &PdfObject) -> Result<()> {
        let space = self.color_space_operand(space)?;
        if matches!(space, ColorSpace::Pattern { .. }) {
            self.gstate.stroke_space = Arc::new(space);
        } else {
            let paint = space.initial_paint();
            self.set_stroke(space, paint);
        }
        Ok(())
    }

    /// Selects the non-stroking color space.
    ///
    /// PDF operator: `cs`
    pub fn do_cs(&mut self, space: &PdfObject) -> Result<()> {
        let space = self.color_space_operand(space)?;
        if matches!(space, ColorSpace::Pattern { .. }) {
            self.gstate.fill_space = Arc::new(space);
        } else {
            let paint = space.initial_paint();
            self.set_fill(space, paint);
        }
        Ok(())
    }

    /// PDF operator: `SC`
    pub fn do_SC(&mut self) -> Result<()> {
        let space = Arc::clone(&self.gstate.stroke_space);
        let components = self.pop_num_vec(space.ncomponents())?;
        self.set_stroke_paint(space.paint(&components));
        Ok(())
    }

    /// Like `SC`, and also accepts patterns.
    ///
    /// PDF operator: `SCN`
    pub fn do_SCN(&mut self) -> Result<()> {
        if matches!(*self.gstate.stroke_space, ColorSpace::Pattern { .. }) {
            let paint = self.pattern_paint()?;
            self.set_stroke_paint(paint);
            Ok(())
        } else {
            self.do_SC()
        }
    }

    /// PDF operator: `sc`
    pub fn do_sc(&mut self) -> Result<()> {
        let space = Arc::clone(&self.gstate.fill_space);
        let components = self.pop_num_vec(space.ncomponents())?;
        self.set_fill_paint(space.paint(&components));
        Ok(())
    }

    /// PDF operator: `scn`
    pub fn do_scn(&mut self) -> Result<()> {
        if matches!(*self.gstate.fill_space, ColorSpace::Pattern { .. }) {
            let paint = self.pattern_paint()?;
            self.set_fill_paint(paint);
            Ok(())
        } else {
            self.do_sc()
        }
    }

    /// PDF operator: `G`
    pub fn do_G(&mut self, gray: f64) {
        self.set_stroke(ColorSpace::DeviceGray, Paint::Gray(gray));
    }

    /// PDF operator: `g`
    pub fn do_g(&mut self, gray: f64) {
        self.set_fill(ColorSpace::DeviceGray, Paint::Gray(gray));
    }

    /// PDF operator: `RG`
    pub fn do_RG(&mut self, r: f64, g: f64, b: f64) {
        self.set_stroke(ColorSpace::DeviceRgb, Paint::Rgb(r, g, b));
    }

    /// PDF operator: `rg`
    pub fn do_rg(&mut self, r: f64, g: f64, b: f64) {
        self.set_fill(ColorSpace::DeviceRgb, Paint::Rgb(r, g, b));
    }

    /// PDF operator: `K`
    pub fn do_K(&mut self, c: f64, m: f64, y: f64, k: f64) {
        self.set_stroke(ColorSpace::DeviceCmyk, Paint::Cmyk(c, m, y, k));
    }

    /// PDF operator: `k`
    pub fn do_k(&mut self, c: f64, m: f64, y: f64, k: f64) {
        self.set_fill(ColorSpace::DeviceCmyk, Paint::Cmyk(c, m, y, k));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::commands::CommandList;
    use crate::interp::task::StepBudget;
    use crate::model::objects::{Name, dictionary};

    fn run(src: &'static [u8], resources: crate::model::objects::Dictionary) -> Vec<DrawCommand> {
        let mut interp = ContentInterpreter::new(src, resources, CommandList::new());
        interp.run(StepBudget::Unbounded).unwrap();
        interp.into_sink().into_vec()
    }

    fn no_refs(obj: &PdfObject) -> Result<PdfObject> {
        Ok(obj.clone())
    }

    #[test]
    fn test_parse_indexed_and_separation() {
        let indexed = PdfObject::Array(vec![
            PdfObject::name("Indexed"),
            PdfObject::name("DeviceRGB"),
            PdfObject::Int(255),
            PdfObject::String(vec![0; 768]),
        ]);
        assert_eq!(
            parse_color_space(&indexed, &no_refs).unwrap(),
            ColorSpace::Indexed {
                base: Box::new(ColorSpace::DeviceRgb),
                hival: 255
            }
        );

        let sep = PdfObject::Array(vec![
            PdfObject::name("Separation"),
            PdfObject::name("Spot"),
            PdfObject::name("DeviceCMYK"),
            PdfObject::Null,
        ]);
        let space = parse_color_space(&sep, &no_refs).unwrap();
        assert_eq!(space.ncomponents(), 1);
        assert_eq!(space.initial_paint(), space.paint(&[1.0]));
    }

    #[test]
    fn test_unknown_family_is_unsupported() {
        let err = parse_color_space(&PdfObject::name("Fancy"), &no_refs).unwrap_err();
        assert!(matches!(err, PdfError::UnsupportedFeature(_)));
    }

    #[test]
    fn test_sc_uses_selected_space() {
        let cmds = run(b"/DeviceCMYK cs 0 1 0 0 sc", Default::default());
        assert_eq!(
            &cmds[1..3],
            &[
                DrawCommand::FillPaint(Paint::Cmyk(0.0, 0.0, 0.0, 1.0)),
                DrawCommand::FillPaint(Paint::Cmyk(0.0, 1.0, 0.0, 0.0)),
            ]
        );
    }

    #[test]
    fn test_resource_color_space() {
        let resources = dictionary([(
            "ColorSpace",
            PdfObject::Dict(dictionary([(
                "CS0",
                PdfObject::Array(vec![PdfObject::name("CalRGB"), PdfObject::Dict(Default::default())]),
            )])),
        )]);
        let cmds = run(b"/CS0 CS 0.5 0.5 0.5 SC", resources);
        assert_eq!(
            cmds[2],
            DrawCommand::StrokePaint(Paint::Components {
                family: Name::new("CalRGB"),
                components: vec![0.5, 0.5, 0.5]
            })
        );
    }

    #[test]
    fn test_uncolored_pattern_collects_components() {
        let resources = dictionary([(
            "Pattern",
            PdfObject::Dict(dictionary([(
                "P1",
                PdfObject::Dict(dictionary([("PatternType", PdfObject::Int(1))])),
            )])),
        )]);
        let cmds = run(b"[/Pattern /DeviceRGB] cs 1 0 0 /P1 scn", resources);
        assert_eq!(
            cmds[1],
            DrawCommand::FillPaint(Paint::Pattern {
                name: Name::new("P1"),
                pattern_type: 1,
                components: vec![1.0, 0.0, 0.0]
            })
        );
    }

    #[test]
    fn test_missing_pattern_is_an_error() {
        let mut interp = ContentInterpreter::new(&b"/Pattern cs /P9 scn"[..], Default::default(), CommandList::new());
        assert!(interp.run(StepBudget::Unbounded).is_err());
    }
}
