//! Build options
//!
//! Every field of [`BuildOptions`] is optional. Each prop supplies its own
//! [`PropDefaults`] and [`BuildOptions::resolve`] fills the gaps.

use crate::palette::SizeTier;
use serde::{Deserialize, Serialize};

/// Theme tag used when none is given
pub const DEFAULT_THEME: &str = "basic";

/// Size tag used when none is given
pub const DEFAULT_SIZE: &str = "medium";

/// Caller-facing configuration of a prop build
///
/// Deserializes from the same JSON shape the creator scripts accepted,
/// e.g. `{"theme": "dragon", "colorScheme": ["red", "black"], "size": "large"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildOptions {
    /// Theme tag (`"basic"`, `"dragon"`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Colour names; entry 0 is the primary colour, entry 1 the accent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<Vec<String>>,
    /// Material tag, accepted and carried through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    /// Style tag, accepted and carried through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Size name (`"small"`, `"medium"`, `"large"`, `"giant"`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Feature flags (`"glowing"`, `"magical"`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_features: Option<Vec<String>>,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn colors<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.color_scheme = Some(colors.into_iter().map(Into::into).collect());
        self
    }

    pub fn material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }

    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Add one special feature flag
    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.special_features
            .get_or_insert_with(Vec::new)
            .push(feature.into());
        self
    }

    /// Apply per-prop defaults
    pub fn resolve(&self, defaults: &PropDefaults) -> ResolvedOptions {
        let color_scheme = match &self.color_scheme {
            Some(colors) if !colors.is_empty() => colors.clone(),
            _ => defaults.color_scheme.iter().map(|c| c.to_string()).collect(),
        };
        let size = SizeTier::from_name(self.size.as_deref().unwrap_or(DEFAULT_SIZE));
        let features = self
            .special_features
            .as_deref()
            .map(FeatureFlags::from_names)
            .unwrap_or_default();

        ResolvedOptions {
            theme: self.theme.clone().unwrap_or_else(|| DEFAULT_THEME.to_string()),
            color_scheme,
            material: self
                .material
                .clone()
                .unwrap_or_else(|| defaults.material.to_string()),
            style: self
                .style
                .clone()
                .unwrap_or_else(|| defaults.style.to_string()),
            size,
            scale: size.scale(),
            features,
        }
    }
}

/// Per-prop fallbacks for [`BuildOptions`]
#[derive(Debug, Clone, Copy)]
pub struct PropDefaults {
    pub color_scheme: &'static [&'static str],
    pub material: &'static str,
    pub style: &'static str,
}

/// Recognised special features
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    pub glowing: bool,
    pub magical: bool,
}

impl FeatureFlags {
    /// Collect flags from feature names; names match exactly and unrecognised
    /// ones are ignored
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let has = |flag: &str| names.iter().any(|n| n.as_ref() == flag);
        Self {
            glowing: has("glowing"),
            magical: has("magical"),
        }
    }
}

/// [`BuildOptions`] with every default applied
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub theme: String,
    /// Never empty
    pub color_scheme: Vec<String>,
    pub material: String,
    pub style: String,
    pub size: SizeTier,
    /// Strictly positive
    pub scale: f32,
    pub features: FeatureFlags,
}

impl ResolvedOptions {
    /// Colour name for the main surfaces
    pub fn primary_color(&self) -> &str {
        self.color_scheme.first().map(String::as_str).unwrap_or_default()
    }

    /// Colour name for accent surfaces; repeats the primary colour when the
    /// scheme has a single entry
    pub fn accent_color(&self) -> &str {
        self.color_scheme
            .get(1)
            .map(String::as_str)
            .unwrap_or_else(|| self.primary_color())
    }

    pub fn is_theme(&self, theme: &str) -> bool {
        self.theme == theme
    }
}
