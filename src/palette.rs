//! Named colour and size lookups
//!
//! Both tables are small and fixed. Lookups are case-insensitive and never
//! fail: unknown names resolve to a fixed fallback.

use serde::{Deserialize, Serialize};

/// Linear RGB reflectance in `[0, 1]`
pub type Rgb = [f32; 3];

/// Colour returned for names that are not in [`NAMED_COLORS`] (medium blue)
pub const DEFAULT_COLOR: Rgb = [0.2, 0.2, 0.8];

/// Every colour name the builders understand
pub const NAMED_COLORS: &[(&str, Rgb)] = &[
    ("red", [0.8, 0.2, 0.2]),
    ("blue", [0.2, 0.2, 0.8]),
    ("green", [0.2, 0.8, 0.2]),
    ("yellow", [0.8, 0.8, 0.2]),
    ("purple", [0.6, 0.2, 0.8]),
    ("orange", [0.8, 0.5, 0.2]),
    ("black", [0.1, 0.1, 0.1]),
    ("white", [0.9, 0.9, 0.9]),
    ("gold", [0.8, 0.6, 0.2]),
    ("silver", [0.7, 0.7, 0.7]),
];

/// Look up a colour by name, falling back to [`DEFAULT_COLOR`]
pub fn color_name_to_rgb(name: &str) -> Rgb {
    let name = name.to_lowercase();
    NAMED_COLORS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, rgb)| *rgb)
        .unwrap_or(DEFAULT_COLOR)
}

/// Multiply every channel by `factor`
pub fn scale_rgb(rgb: Rgb, factor: f32) -> Rgb {
    [rgb[0] * factor, rgb[1] * factor, rgb[2] * factor]
}

/// Size tier of a generated prop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SizeTier {
    Small,
    #[default]
    Medium,
    Large,
    Giant,
}

impl SizeTier {
    /// Parse a size name. Anything unrecognised is `Medium`.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "small" => SizeTier::Small,
            "large" => SizeTier::Large,
            "giant" => SizeTier::Giant,
            _ => SizeTier::Medium,
        }
    }

    /// Uniform multiplier applied to every dimension and offset of a prop
    pub fn scale(&self) -> f32 {
        match self {
            SizeTier::Small => 0.7,
            SizeTier::Medium => 1.0,
            SizeTier::Large => 1.5,
            SizeTier::Giant => 2.0,
        }
    }

    /// Lowercase name, as accepted by [`SizeTier::from_name`]
    pub fn name(&self) -> &'static str {
        match self {
            SizeTier::Small => "small",
            SizeTier::Medium => "medium",
            SizeTier::Large => "large",
            SizeTier::Giant => "giant",
        }
    }

    pub fn all() -> &'static [SizeTier] {
        &[
            SizeTier::Small,
            SizeTier::Medium,
            SizeTier::Large,
            SizeTier::Giant,
        ]
    }
}

/// Look up a size multiplier by name, falling back to `1.0`
pub fn size_name_to_scale(name: &str) -> f32 {
    SizeTier::from_name(name).scale()
}
