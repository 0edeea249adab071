//! Blocky couch

use super::{spawn, spin, CompositeObject, PartShape, PartSpec};
use crate::material::SurfaceMaterial;
use crate::options::{BuildOptions, PropDefaults};
use crate::palette::{color_name_to_rgb, scale_rgb};
use crate::scene::{MeshId, Scene, SceneError};
use crate::texture::TextAlign;
use log::{debug, info};

pub const COUCH_DEFAULTS: PropDefaults = PropDefaults {
    color_scheme: &["red", "black", "gold"],
    material: "leather",
    style: "minecraft_blocky",
};

/// Rotation about Y applied every frame
pub const COUCH_SPIN_PER_FRAME: f32 = 0.005;

const fn slab(name: &'static str, size: [f32; 3], offset: [f32; 3]) -> PartSpec {
    PartSpec {
        name,
        shape: PartShape::Box {
            width: size[0],
            height: size[1],
            depth: size[2],
        },
        offset,
        tilt: 0.0,
    }
}

/// Seat, back, both arms, then both cushions
pub const COUCH_PARTS: [PartSpec; 6] = [
    slab("seat", [3.0, 0.5, 1.5], [0.0, 0.0, 0.0]),
    slab("back", [3.0, 1.2, 0.2], [0.0, 0.6, -0.6]),
    slab("leftArm", [0.3, 0.8, 1.5], [-1.35, 0.4, 0.0]),
    slab("rightArm", [0.3, 0.8, 1.5], [1.35, 0.4, 0.0]),
    slab("cushion1", [1.2, 0.3, 1.2], [-0.6, 0.25, 0.0]),
    slab("cushion2", [1.2, 0.3, 1.2], [0.6, 0.25, 0.0]),
];

const DRAGON_TEXTURE_SIZE: u32 = 512;

/// Couch surface: diffuse from the named colour, a faint self-glow when `glowing`
pub fn couch_material(name: &str, color: &str, glowing: bool) -> SurfaceMaterial {
    let rgb = color_name_to_rgb(color);
    let material = SurfaceMaterial::new(name).with_diffuse(rgb);
    if glowing {
        material.with_emissive(scale_rgb(rgb, 0.2))
    } else {
        material
    }
}

/// Paint the dragon emblem texture and put it on every cushion
pub fn apply_dragon_theme(scene: &mut Scene, cushions: &[MeshId]) -> Result<(), SceneError> {
    let texture = scene.create_dynamic_texture(
        "dragonTex",
        DRAGON_TEXTURE_SIZE,
        DRAGON_TEXTURE_SIZE,
    );
    if let Some(surface) = scene.texture_mut(texture) {
        let center = (DRAGON_TEXTURE_SIZE / 2) as i32;
        let mut ctx = surface.context();
        ctx.set_fill_style("#550000");
        ctx.fill_rect(0, 0, DRAGON_TEXTURE_SIZE, DRAGON_TEXTURE_SIZE);

        ctx.set_text_align(TextAlign::Center);
        ctx.set_fill_style("#ff0000");
        ctx.set_font_size(48);
        ctx.fill_text("\u{1F409}", center, 200);

        ctx.set_fill_style("#00ff00");
        ctx.set_font_size(24);
        ctx.fill_text("\u{25CA}\u{25CA}\u{25CA}", center, 300);
        surface.update();
    }

    let material = scene.add_material(
        SurfaceMaterial::new("dragonMat")
            .with_texture(texture)
            .with_emissive([0.1, 0.0, 0.0]),
    );
    for &cushion in cushions {
        scene.assign_material(cushion, material)?;
    }
    debug!("Dragon theme applied to {} cushions", cushions.len());
    Ok(())
}

/// Build a couch, merge it into one mesh named `"couch"` and start it spinning
pub fn build_couch(scene: &mut Scene, options: &BuildOptions) -> Result<CompositeObject, SceneError> {
    let resolved = options.resolve(&COUCH_DEFAULTS);
    info!(
        "Building couch: theme={}, size={}, material={}, style={}",
        resolved.theme,
        resolved.size.name(),
        resolved.material,
        resolved.style
    );

    let parts = spawn(scene, &COUCH_PARTS, resolved.scale)?;
    let [seat, back, left_arm, right_arm, cushion1, cushion2] = parts;

    let glowing = resolved.features.glowing;
    let main = scene.add_material(couch_material(
        "couchMat",
        resolved.primary_color(),
        glowing,
    ));
    let accent = scene.add_material(couch_material(
        "couchMat",
        resolved.accent_color(),
        glowing,
    ));

    for frame_part in [seat, back, left_arm, right_arm] {
        scene.assign_material(frame_part, main)?;
    }
    if resolved.is_theme("dragon") {
        apply_dragon_theme(scene, &[cushion1, cushion2])?;
    } else {
        scene.assign_material(cushion1, accent)?;
        scene.assign_material(cushion2, accent)?;
    }

    let mesh = scene.merge_meshes("couch", &parts, true)?;
    spin(scene, mesh, COUCH_SPIN_PER_FRAME);
    info!("Couch ready ({} parts)", parts.len());
    Ok(CompositeObject { mesh })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_couch_material() {
        let plain = couch_material("m", "gold", false);
        assert_eq!(plain.diffuse, [0.8, 0.6, 0.2]);
        assert!(!plain.is_emissive());

        let lit = couch_material("m", "red", true);
        assert_eq!(lit.emissive, scale_rgb([0.8, 0.2, 0.2], 0.2));
    }

    #[test]
    fn test_dragon_texture_content() {
        let mut scene = Scene::new();
        let cushion = scene
            .create_box(
                "cushion",
                crate::scene::BoxOptions {
                    width: 1.0,
                    height: 1.0,
                    depth: 1.0,
                },
            )
            .unwrap();
        apply_dragon_theme(&mut scene, &[cushion]).unwrap();

        let material = scene
            .material(scene.part_material(cushion).unwrap())
            .unwrap();
        assert_eq!(material.name, "dragonMat");
        assert_eq!(material.emissive, [0.1, 0.0, 0.0]);

        let texture = scene.texture(material.diffuse_texture.unwrap()).unwrap();
        assert_eq!((texture.width(), texture.height()), (512, 512));
        assert_eq!(texture.revision(), 1);
        let image = texture.image();
        assert_eq!(*image.get_pixel(0, 0), Rgba([0x55, 0, 0, 255]));
        let red = Rgba([255, 0, 0, 255]);
        let green = Rgba([0, 255, 0, 255]);
        assert!(image.pixels().any(|p| *p == red));
        assert!(image.pixels().any(|p| *p == green));
    }

    #[test]
    fn test_couch_parts_table() {
        let names: Vec<_> = COUCH_PARTS.iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            ["seat", "back", "leftArm", "rightArm", "cushion1", "cushion2"]
        );
        assert!(COUCH_PARTS.iter().all(|p| p.tilt == 0.0));
    }
}
