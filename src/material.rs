//! Surface materials
//!
//! A material describes how a part looks; it holds no GPU state. Materials
//! live in the [`Scene`](crate::scene::Scene) and are shared by id.

use crate::palette::Rgb;
use crate::scene::TextureId;

/// Appearance descriptor assigned to scene meshes
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMaterial {
    pub name: String,
    pub diffuse: Rgb,
    pub specular: Rgb,
    /// Self-illumination
    pub emissive: Rgb,
    pub roughness: Option<f32>,
    pub metallic: Option<f32>,
    pub diffuse_texture: Option<TextureId>,
}

impl SurfaceMaterial {
    /// White diffuse, white specular, no emission
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            diffuse: [1.0; 3],
            specular: [1.0; 3],
            emissive: [0.0; 3],
            roughness: None,
            metallic: None,
            diffuse_texture: None,
        }
    }

    pub fn with_diffuse(mut self, diffuse: Rgb) -> Self {
        self.diffuse = diffuse;
        self
    }

    pub fn with_specular(mut self, specular: Rgb) -> Self {
        self.specular = specular;
        self
    }

    pub fn with_emissive(mut self, emissive: Rgb) -> Self {
        self.emissive = emissive;
        self
    }

    pub fn with_texture(mut self, texture: TextureId) -> Self {
        self.diffuse_texture = Some(texture);
        self
    }

    pub fn is_emissive(&self) -> bool {
        self.emissive.iter().any(|c| *c > 0.0)
    }
}
