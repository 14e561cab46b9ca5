//! Color spaces and resolved paint values.

use std::sync::{Arc, LazyLock};

use crate::model::objects::Name;

/// A color space selection. Shared by `Arc` between graphics states.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    CalGray,
    CalRgb,
    Lab,
    IccBased { components: usize },
    Indexed { base: Box<ColorSpace>, hival: u8 },
    Separation { colorant: Name, alternate: Box<ColorSpace> },
    DeviceN { components: usize, alternate: Box<ColorSpace> },
    /// Pattern space; uncolored patterns carry their underlying space.
    Pattern { underlying: Option<Box<ColorSpace>> },
}

impl ColorSpace {
    /// Number of numeric operands `sc`/`scn` take in this space.
    pub fn ncomponents(&self) -> usize {
        match self {
            Self::DeviceGray | Self::CalGray | Self::Indexed { .. } | Self::Separation { .. } => 1,
            Self::DeviceRgb | Self::CalRgb | Self::Lab => 3,
            Self::DeviceCmyk => 4,
            Self::IccBased { components } | Self::DeviceN { components, .. } => *components,
            Self::Pattern { underlying } => underlying.as_ref().map_or(0, |u| u.ncomponents()),
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            Self::DeviceGray => "DeviceGray",
            Self::DeviceRgb => "DeviceRGB",
            Self::DeviceCmyk => "DeviceCMYK",
            Self::CalGray => "CalGray",
            Self::CalRgb => "CalRGB",
            Self::Lab => "Lab",
            Self::IccBased { .. } => "ICCBased",
            Self::Indexed { .. } => "Indexed",
            Self::Separation { .. } => "Separation",
            Self::DeviceN { .. } => "DeviceN",
            Self::Pattern { .. } => "Pattern",
        }
    }

    /// Device and parameterless families by name, including the inline
    /// image abbreviations `G`, `RGB`, `CMYK` and `I`.
    pub fn from_family(name: &str) -> Option<Self> {
        Some(match name {
            "DeviceGray" | "G" => Self::DeviceGray,
            "DeviceRGB" | "RGB" => Self::DeviceRgb,
            "DeviceCMYK" | "CMYK" => Self::DeviceCmyk,
            "CalGray" => Self::CalGray,
            "CalRGB" => Self::CalRgb,
            "Lab" => Self::Lab,
            "Pattern" => Self::Pattern { underlying: None },
            _ => return None,
        })
    }

    /// Paint for a component list in this space; missing components are 0.
    pub fn paint(&self, components: &[f64]) -> Paint {
        let c = |i: usize| components.get(i).copied().unwrap_or(0.0);
        match self {
            Self::DeviceGray => Paint::Gray(c(0)),
            Self::DeviceRgb => Paint::Rgb(c(0), c(1), c(2)),
            Self::DeviceCmyk => Paint::Cmyk(c(0), c(1), c(2), c(3)),
            other => Paint::Components {
                family: Name::new(other.family()),
                components: components.to_vec(),
            },
        }
    }

    /// Initial paint after the space is selected with `CS`/`cs`.
    pub fn initial_paint(&self) -> Paint {
        match self {
            Self::DeviceCmyk => Paint::Cmyk(0.0, 0.0, 0.0, 1.0),
            Self::Separation { .. } | Self::DeviceN { .. } => {
                self.paint(&vec![1.0; self.ncomponents()])
            }
            _ => self.paint(&vec![0.0; self.ncomponents()]),
        }
    }
}

/// Shared handle to the process-wide DeviceGray space.
pub fn device_gray() -> Arc<ColorSpace> {
    Arc::clone(&DEVICE_GRAY)
}

static DEVICE_GRAY: LazyLock<Arc<ColorSpace>> = LazyLock::new(|| Arc::new(ColorSpace::DeviceGray));

/// Paint value handed to the drawing sink.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Paint {
    Gray(f64),
    Rgb(f64, f64, f64),
    Cmyk(f64, f64, f64, f64),
    /// Components in a space the backend converts itself.
    Components { family: Name, components: Vec<f64> },
    /// A pattern resource; `components` is empty for colored patterns.
    Pattern {
        name: Name,
        pattern_type: i64,
        components: Vec<f64>,
    },
    /// A shading resource painted by `sh`.
    Shading { name: Name, shading_type: i64 },
}

impl Default for Paint {
    fn default() -> Self {
        Self::Gray(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_counts() {
        assert_eq!(ColorSpace::DeviceCmyk.ncomponents(), 4);
        let uncolored = ColorSpace::Pattern {
            underlying: Some(Box::new(ColorSpace::DeviceRgb)),
        };
        assert_eq!(uncolored.ncomponents(), 3);
        assert_eq!(ColorSpace::Pattern { underlying: None }.ncomponents(), 0);
    }

    #[test]
    fn test_paint_in_device_spaces() {
        assert_eq!(ColorSpace::DeviceRgb.paint(&[1.0, 0.0, 0.0]), Paint::Rgb(1.0, 0.0, 0.0));
        assert_eq!(ColorSpace::DeviceCmyk.initial_paint(), Paint::Cmyk(0.0, 0.0, 0.0, 1.0));
        assert_eq!(ColorSpace::from_family("G"), Some(ColorSpace::DeviceGray));
    }
}
