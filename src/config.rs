//! Viewer configuration
//!
//! Loaded once from `<config_dir>/crafta-props/viewer.json`. Every field has
//! a default, so the file may be partial or missing entirely.

use glam::Vec3;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;

/// Global viewer configuration
pub static CONFIG: LazyLock<Config> = LazyLock::new(Config::load);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub colors: ColorConfig,
    pub lighting: LightingConfig,
    pub glow: GlowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Crafta Props".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Orbit camera around `target`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub target: Vec3,
    pub distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Degrees
    pub yaw: f32,
    /// Degrees above the horizon
    pub pitch: f32,
    /// Degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Radians per pixel of drag
    pub sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            target: Vec3::new(0.0, 0.3, 0.0),
            distance: 7.0,
            min_distance: 2.0,
            max_distance: 30.0,
            yaw: 30.0,
            pitch: 20.0,
            fov: 45.0,
            near: 0.1,
            far: 200.0,
            sensitivity: 0.008,
        }
    }
}

/// Colours as 0xRRGGBB
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub background: u32,
    pub ground: u32,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            background: 0x1a1a2e,
            ground: 0x2d2d44,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Direction the light travels
    pub direction: Vec3,
    pub ambient: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.4, -1.0, -0.6),
            ambient: 0.35,
        }
    }
}

/// Emissive boost applied to glow-layer parts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlowConfig {
    pub boost: f32,
}

impl Default for GlowConfig {
    fn default() -> Self {
        Self { boost: 2.5 }
    }
}

impl Config {
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("crafta-props").join("viewer.json"))
    }

    fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring malformed config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

/// Convert 0xRRGGBB to linear-ish floats in `[0, 1]`
pub fn hex_to_rgb(hex: u32) -> (f32, f32, f32) {
    let r = ((hex >> 16) & 0xFF) as f32 / 255.0;
    let g = ((hex >> 8) & 0xFF) as f32 / 255.0;
    let b = (hex & 0xFF) as f32 / 255.0;
    (r, g, b)
}

pub fn hex_to_rgba(hex: u32) -> [f32; 4] {
    let (r, g, b) = hex_to_rgb(hex);
    [r, g, b, 1.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb(0xFF0000), (1.0, 0.0, 0.0));
        assert_eq!(hex_to_rgba(0x0000FF), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"camera": {"distance": 12.0}}"#).unwrap();
        assert_eq!(config.camera.distance, 12.0);
        assert_eq!(config.camera.fov, 45.0);
        assert_eq!(config.window.width, 1280);
    }
}
