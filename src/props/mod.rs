//! Procedural props
//!
//! Each prop is a list of named primitive parts with fixed relative
//! dimensions and offsets. Builders scale the parts, assign materials,
//! merge them into one composite mesh and leave it spinning.

mod couch;
mod sword;

pub use couch::{
    apply_dragon_theme, build_couch, couch_material, COUCH_DEFAULTS, COUCH_PARTS,
    COUCH_SPIN_PER_FRAME,
};
pub use sword::{
    apply_magical_effects, blade_material, build_sword, handle_material, magic_particles,
    SWORD_DEFAULTS, SWORD_PARTS, SWORD_SPIN_PER_FRAME, SWORD_TILT,
};

use crate::options::BuildOptions;
use crate::scene::{
    BoxOptions, CylinderOptions, MeshId, Scene, SceneError, SphereOptions,
};
use glam::Vec3;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Handle to a built prop: the merged mesh in the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeObject {
    pub mesh: MeshId,
}

/// Primitive a part is made from, in unscaled units
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PartShape {
    Box { width: f32, height: f32, depth: f32 },
    Cylinder { diameter: f32, height: f32 },
    Sphere { diameter: f32 },
}

/// One named part of a prop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartSpec {
    pub name: &'static str,
    pub shape: PartShape,
    pub offset: [f32; 3],
    /// Rotation about Z in radians
    pub tilt: f32,
}

/// Create a part in the scene with every dimension and offset multiplied by `scale`
pub fn spawn_part(scene: &mut Scene, part: &PartSpec, scale: f32) -> Result<MeshId, SceneError> {
    let id = match part.shape {
        PartShape::Box {
            width,
            height,
            depth,
        } => scene.create_box(
            part.name,
            BoxOptions {
                width: width * scale,
                height: height * scale,
                depth: depth * scale,
            },
        )?,
        PartShape::Cylinder { diameter, height } => scene.create_cylinder(
            part.name,
            CylinderOptions::new(diameter * scale, height * scale),
        )?,
        PartShape::Sphere { diameter } => {
            scene.create_sphere(part.name, SphereOptions::new(diameter * scale))?
        }
    };

    let mesh = scene.mesh_mut(id)?;
    mesh.position = Vec3::from(part.offset) * scale;
    mesh.rotation.z = part.tilt;
    debug!("Part {:?} at {:?}", part.name, mesh.position);
    Ok(id)
}

/// Spawn a fixed list of parts, in order
fn spawn<const N: usize>(
    scene: &mut Scene,
    parts: &[PartSpec; N],
    scale: f32,
) -> Result<[MeshId; N], SceneError> {
    let mut ids = [MeshId::from_raw(0); N];
    for (slot, part) in ids.iter_mut().zip(parts) {
        *slot = spawn_part(scene, part, scale)?;
    }
    Ok(ids)
}

/// Rotate `target` about Y by a fixed amount every frame
///
/// The callback unregisters itself once the mesh is gone.
pub fn spin(scene: &mut Scene, target: MeshId, radians_per_frame: f32) {
    scene.register_before_render(move |meshes| match meshes.get_mut(target) {
        Some(mesh) => {
            mesh.rotation.y += radians_per_frame;
            true
        }
        None => false,
    });
}

/// Kind of prop a builder produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PropKind {
    #[default]
    Couch,
    Sword,
}

impl PropKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            PropKind::Couch => "Couch",
            PropKind::Sword => "Sword",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            PropKind::Couch => "🛋",
            PropKind::Sword => "🗡",
        }
    }

    pub fn all() -> &'static [PropKind] {
        &[PropKind::Couch, PropKind::Sword]
    }

    /// Build this prop into `scene`
    pub fn build(
        &self,
        scene: &mut Scene,
        options: &BuildOptions,
    ) -> Result<CompositeObject, SceneError> {
        match self {
            PropKind::Couch => build_couch(scene, options),
            PropKind::Sword => build_sword(scene, options),
        }
    }
}

impl fmt::Display for PropKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PropKind::Couch => "couch",
            PropKind::Sword => "sword",
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown prop {0:?} (expected couch or sword)")]
pub struct ParsePropError(pub String);

impl FromStr for PropKind {
    type Err = ParsePropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "couch" => Ok(PropKind::Couch),
            "sword" => Ok(PropKind::Sword),
            _ => Err(ParsePropError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_prop_kind_parse() {
        assert_eq!("couch".parse(), Ok(PropKind::Couch));
        assert_eq!(" Sword ".parse(), Ok(PropKind::Sword));
        assert_eq!(
            "lamp".parse::<PropKind>(),
            Err(ParsePropError("lamp".to_string()))
        );
        for kind in PropKind::all() {
            assert_eq!(kind.to_string().parse(), Ok(*kind));
        }
    }

    #[test]
    fn test_spawn_part_scales_size_and_offset() {
        let mut scene = Scene::new();
        let part = PartSpec {
            name: "slab",
            shape: PartShape::Box {
                width: 2.0,
                height: 1.0,
                depth: 1.0,
            },
            offset: [1.0, 2.0, 0.0],
            tilt: 0.3,
        };
        let id = spawn_part(&mut scene, &part, 1.5).unwrap();
        let mesh = scene.mesh(id).unwrap();
        assert_eq!(mesh.name, "slab");
        assert_relative_eq!(mesh.position.y, 3.0);
        assert_relative_eq!(mesh.rotation.z, 0.3);
        let (min, max) = mesh.data.bounds().unwrap();
        assert_relative_eq!(max.x - min.x, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_spawn_part_rejects_zero_scale() {
        let mut scene = Scene::new();
        let part = PartSpec {
            name: "ball",
            shape: PartShape::Sphere { diameter: 1.0 },
            offset: [0.0; 3],
            tilt: 0.0,
        };
        assert!(matches!(
            spawn_part(&mut scene, &part, 0.0),
            Err(SceneError::InvalidDimension { .. })
        ));
    }

    #[test]
    fn test_spin_unregisters_with_mesh() {
        let mut scene = Scene::new();
        let id = scene
            .create_sphere("ball", SphereOptions::new(1.0))
            .unwrap();
        spin(&mut scene, id, 0.25);
        scene.render_frame(1.0 / 60.0);
        assert_relative_eq!(scene.mesh(id).unwrap().rotation.y, 0.25);
        scene.remove_mesh(id);
        scene.render_frame(1.0 / 60.0);
        assert_eq!(scene.before_render_count(), 0);
    }
}
