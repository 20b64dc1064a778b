use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Page size in PDF points (1/72 inch).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageFormat {
    pub width: f64,
    pub height: f64,
    pub orientation: Orientation,
}

impl PageFormat {
    /// A4 portrait, 210 x 297 mm.
    pub const A4_PORTRAIT: Self = Self {
        width: 595.28,
        height: 841.89,
        orientation: Orientation::Portrait,
    };
}

impl Default for PageFormat {
    fn default() -> Self {
        Self::A4_PORTRAIT
    }
}

/// Where an image lands on a page, top-left origin, in points.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct Placement {
    pub ratio: f64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}
