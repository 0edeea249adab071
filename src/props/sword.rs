//! Tilted sword with optional magic

use super::{spawn, spin, CompositeObject, PartShape, PartSpec};
use crate::effects::{GlowLayer, ParticleConfig};
use crate::material::SurfaceMaterial;
use crate::options::{BuildOptions, PropDefaults};
use crate::palette::{color_name_to_rgb, scale_rgb};
use crate::scene::{MeshId, Scene, SceneError};
use glam::{Vec3, Vec4};
use log::{debug, info};
use std::f32::consts::{FRAC_PI_6, PI};

pub const SWORD_DEFAULTS: PropDefaults = PropDefaults {
    color_scheme: &["blue", "silver", "purple"],
    material: "metal",
    style: "minecraft_blocky",
};

/// Rotation about Y applied every frame
pub const SWORD_SPIN_PER_FRAME: f32 = 0.01;

/// Z tilt of blade, handle and guard
pub const SWORD_TILT: f32 = FRAC_PI_6;

/// Blade, handle, guard, pommel. The pommel is not tilted.
pub const SWORD_PARTS: [PartSpec; 4] = [
    PartSpec {
        name: "blade",
        shape: PartShape::Box {
            width: 0.2,
            height: 2.5,
            depth: 0.1,
        },
        offset: [0.0, 0.0, 0.0],
        tilt: SWORD_TILT,
    },
    PartSpec {
        name: "handle",
        shape: PartShape::Cylinder {
            diameter: 0.2,
            height: 0.6,
        },
        offset: [0.0, -1.5, 0.0],
        tilt: SWORD_TILT,
    },
    PartSpec {
        name: "guard",
        shape: PartShape::Box {
            width: 0.8,
            height: 0.1,
            depth: 0.1,
        },
        offset: [0.0, -1.2, 0.0],
        tilt: SWORD_TILT,
    },
    PartSpec {
        name: "pommel",
        shape: PartShape::Sphere { diameter: 0.3 },
        offset: [0.0, -1.8, 0.0],
        tilt: 0.0,
    },
];

/// Polished blade surface
pub fn blade_material(name: &str, color: &str, glowing: bool, magical: bool) -> SurfaceMaterial {
    let rgb = color_name_to_rgb(color);
    let mut material = SurfaceMaterial::new(name)
        .with_diffuse(rgb)
        .with_specular([0.8; 3]);
    if glowing {
        material.emissive = scale_rgb(rgb, 0.4);
    }
    if magical {
        material.metallic = Some(0.8);
        material.roughness = Some(0.2);
    }
    material
}

/// Matte grip surface, shared by handle, guard and pommel
pub fn handle_material(name: &str, color: &str) -> SurfaceMaterial {
    let mut material = SurfaceMaterial::new(name).with_diffuse(color_name_to_rgb(color));
    material.roughness = Some(0.8);
    material
}

/// Sparks drifting off a magical blade
pub fn magic_particles() -> ParticleConfig {
    ParticleConfig {
        capacity: 2000,
        min_emit_box: Vec3::new(-0.1, -1.0, -0.1),
        max_emit_box: Vec3::new(0.1, 1.0, 0.1),
        color1: Vec4::new(0.7, 0.8, 1.0, 1.0),
        color2: Vec4::new(0.2, 0.5, 1.0, 1.0),
        color_dead: Vec4::new(0.0, 0.0, 0.2, 0.0),
        min_size: 0.1,
        max_size: 0.3,
        min_lifetime: 0.3,
        max_lifetime: 1.5,
        emit_rate: 1500.0,
        gravity: Vec3::new(0.0, -9.81, 0.0),
        direction1: Vec3::new(-1.0, 1.0, -1.0),
        direction2: Vec3::new(1.0, 1.0, 1.0),
        min_angular_speed: 0.0,
        max_angular_speed: PI,
        min_emit_power: 1.0,
        max_emit_power: 3.0,
        update_speed: 0.025,
    }
}

/// Make `blade` glow and, when the scene supports particles, shed sparks
pub fn apply_magical_effects(scene: &mut Scene, blade: MeshId) {
    let mut glow = GlowLayer::new("magicalGlow").with_intensity(0.8);
    glow.add_included_only_mesh(blade);
    scene.add_glow_layer(glow);

    match scene.particles_mut() {
        Some(host) => {
            host.create("magicalParticles", magic_particles(), blade).start();
            debug!("Magical particles attached to blade");
        }
        None => debug!("No particle support, blade glows only"),
    }
}

/// Build a sword, merge it into one mesh named `"sword"` and start it spinning
pub fn build_sword(scene: &mut Scene, options: &BuildOptions) -> Result<CompositeObject, SceneError> {
    let resolved = options.resolve(&SWORD_DEFAULTS);
    info!(
        "Building sword: theme={}, size={}, material={}, style={}",
        resolved.theme,
        resolved.size.name(),
        resolved.material,
        resolved.style
    );

    let parts = spawn(scene, &SWORD_PARTS, resolved.scale)?;
    let [blade, handle, guard, pommel] = parts;

    let features = resolved.features;
    let blade_mat = scene.add_material(blade_material(
        "bladeMat",
        resolved.primary_color(),
        features.glowing,
        features.magical,
    ));
    let handle_mat = scene.add_material(handle_material("handleMat", resolved.accent_color()));

    scene.assign_material(blade, blade_mat)?;
    for grip in [handle, guard, pommel] {
        scene.assign_material(grip, handle_mat)?;
    }
    if features.magical {
        apply_magical_effects(scene, blade);
    }

    let mesh = scene.merge_meshes("sword", &parts, true)?;
    spin(scene, mesh, SWORD_SPIN_PER_FRAME);
    info!("Sword ready ({} parts)", parts.len());
    Ok(CompositeObject { mesh })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blade_material_flags() {
        let plain = blade_material("b", "blue", false, false);
        assert_eq!(plain.diffuse, [0.2, 0.2, 0.8]);
        assert_eq!(plain.specular, [0.8, 0.8, 0.8]);
        assert!(!plain.is_emissive());
        assert_eq!(plain.metallic, None);

        let magic = blade_material("b", "blue", true, true);
        assert_eq!(magic.emissive, scale_rgb([0.2, 0.2, 0.8], 0.4));
        assert_eq!(magic.metallic, Some(0.8));
        assert_eq!(magic.roughness, Some(0.2));
    }

    #[test]
    fn test_handle_material() {
        let grip = handle_material("h", "silver");
        assert_eq!(grip.diffuse, [0.7, 0.7, 0.7]);
        assert_eq!(grip.roughness, Some(0.8));
    }

    #[test]
    fn test_magic_particles_config() {
        let config = magic_particles();
        assert_eq!(config.capacity, 2000);
        assert_eq!(config.emit_rate, 1500.0);
        assert_eq!(config.update_speed, 0.025);
        assert_eq!(config.max_angular_speed, PI);
    }

    #[test]
    fn test_magical_effects_without_particles() {
        let mut scene = Scene::with_particle_support(false);
        let blade = scene
            .create_box(
                "blade",
                crate::scene::BoxOptions {
                    width: 0.2,
                    height: 2.5,
                    depth: 0.1,
                },
            )
            .unwrap();
        apply_magical_effects(&mut scene, blade);
        assert_eq!(scene.glow_layers().len(), 1);
        assert!(scene.particle_systems().is_empty());
    }

    #[test]
    fn test_pommel_is_upright() {
        assert!(SWORD_PARTS[..3].iter().all(|p| p.tilt == SWORD_TILT));
        assert_eq!(SWORD_PARTS[3].tilt, 0.0);
    }
}
