//! Scene graph
//!
//! The scene owns every mesh, material, texture and effect that props are
//! built from, plus the per-frame callbacks registered on it. It does no
//! GPU work; the viewer reads it back each frame.

use crate::effects::{GlowLayer, ParticleConfig, ParticleSystem};
use crate::material::SurfaceMaterial;
use crate::mesh::{create_box, create_cylinder, create_sphere, MeshData};
use crate::texture::DynamicTexture;
use glam::{EulerRot, Mat4, Quat, Vec3};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use thiserror::Error;

/// Frame rate at which one frame equals one animation step
pub const REFERENCE_FPS: f32 = 60.0;

/// Handle to a mesh in a [`Scene`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(u32);

impl MeshId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Handle to a material in a [`Scene`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(usize);

/// Handle to a dynamic texture in a [`Scene`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(usize);

impl TextureId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Errors raised by scene operations
#[derive(Debug, Error, PartialEq)]
pub enum SceneError {
    #[error("mesh {mesh:?}: {field} must be positive and finite, got {value}")]
    InvalidDimension {
        mesh: String,
        field: &'static str,
        value: f32,
    },

    #[error("mesh {mesh:?}: tessellation must be at least 3, got {value}")]
    InvalidTessellation { mesh: String, value: u32 },

    #[error("unknown mesh {0:?}")]
    UnknownMesh(MeshId),

    #[error("unknown material {0:?}")]
    UnknownMaterial(MaterialId),

    #[error("cannot merge an empty mesh list")]
    EmptyMerge,
}

/// Box dimensions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxOptions {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

/// Cylinder dimensions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylinderOptions {
    pub diameter: f32,
    pub height: f32,
    pub tessellation: u32,
}

impl CylinderOptions {
    pub fn new(diameter: f32, height: f32) -> Self {
        Self {
            diameter,
            height,
            tessellation: 24,
        }
    }
}

/// Sphere dimensions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereOptions {
    pub diameter: f32,
    pub segments: u32,
}

impl SphereOptions {
    pub fn new(diameter: f32) -> Self {
        Self {
            diameter,
            segments: 32,
        }
    }
}

/// A source part kept inside a merged mesh
#[derive(Debug, Clone, PartialEq)]
pub struct SubMesh {
    /// Id the part had before the merge
    pub source: MeshId,
    pub name: String,
    pub material: Option<MaterialId>,
    /// Range into the merged mesh's index buffer
    pub indices: Range<u32>,
    /// The part's world transform at merge time, now relative to the merged mesh
    pub local: Mat4,
}

/// Where a disposed source ended up
#[derive(Debug, Clone, Copy)]
struct MergedPart {
    mesh: MeshId,
    sub_mesh: usize,
    /// Part transform relative to `mesh`
    local: Mat4,
}

/// A mesh placed in the scene
#[derive(Debug, Clone)]
pub struct SceneMesh {
    pub name: String,
    pub data: MeshData,
    pub position: Vec3,
    /// Euler angles in radians, applied in Y, X, Z order
    pub rotation: Vec3,
    pub scaling: Vec3,
    pub material: Option<MaterialId>,
    /// Parts this mesh was merged from; empty for primitives
    pub sub_meshes: Vec<SubMesh>,
}

impl SceneMesh {
    fn new(name: &str, data: MeshData) -> Self {
        Self {
            name: name.to_string(),
            data,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scaling: Vec3::ONE,
            material: None,
            sub_meshes: Vec::new(),
        }
    }

    pub fn world_matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::YXZ,
            self.rotation.y,
            self.rotation.x,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scaling, rotation, self.position)
    }

    pub fn sub_mesh(&self, name: &str) -> Option<&SubMesh> {
        self.sub_meshes.iter().find(|s| s.name == name)
    }
}

/// Mesh storage, handed to per-frame callbacks
#[derive(Debug, Default)]
pub struct Meshes {
    map: BTreeMap<MeshId, SceneMesh>,
    next_id: u32,
}

impl Meshes {
    fn insert(&mut self, mesh: SceneMesh) -> MeshId {
        let id = MeshId(self.next_id);
        self.next_id += 1;
        self.map.insert(id, mesh);
        id
    }

    pub fn get(&self, id: MeshId) -> Option<&SceneMesh> {
        self.map.get(&id)
    }

    pub fn get_mut(&mut self, id: MeshId) -> Option<&mut SceneMesh> {
        self.map.get_mut(&id)
    }

    pub fn contains(&self, id: MeshId) -> bool {
        self.map.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MeshId, &SceneMesh)> {
        self.map.iter().map(|(id, mesh)| (*id, mesh))
    }
}

/// Per-frame callback; returning `false` unregisters it
pub type BeforeRender = Box<dyn FnMut(&mut Meshes) -> bool>;

/// Optional particle facility of a scene
#[derive(Debug, Default)]
pub struct ParticleHost {
    systems: Vec<ParticleSystem>,
}

impl ParticleHost {
    /// Create a stopped particle system emitting from `emitter`
    pub fn create(
        &mut self,
        name: impl Into<String>,
        config: ParticleConfig,
        emitter: MeshId,
    ) -> &mut ParticleSystem {
        let index = self.systems.len();
        self.systems.push(ParticleSystem::new(name, config, emitter));
        &mut self.systems[index]
    }

    pub fn systems(&self) -> &[ParticleSystem] {
        &self.systems
    }
}

/// Location of a part: the mesh holding it and, once merged, its sub-mesh index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartLocation {
    pub mesh: MeshId,
    pub sub_mesh: Option<usize>,
}

/// CPU-side scene graph
pub struct Scene {
    meshes: Meshes,
    materials: Vec<SurfaceMaterial>,
    textures: Vec<DynamicTexture>,
    glow_layers: Vec<GlowLayer>,
    particles: Option<ParticleHost>,
    before_render: Vec<BeforeRender>,
    merged_into: HashMap<MeshId, MergedPart>,
    frame: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Scene with particle support
    pub fn new() -> Self {
        Self::with_particle_support(true)
    }

    pub fn with_particle_support(enabled: bool) -> Self {
        Self {
            meshes: Meshes::default(),
            materials: Vec::new(),
            textures: Vec::new(),
            glow_layers: Vec::new(),
            particles: enabled.then(ParticleHost::default),
            before_render: Vec::new(),
            merged_into: HashMap::new(),
            frame: 0,
        }
    }

    pub fn create_box(&mut self, name: &str, options: BoxOptions) -> Result<MeshId, SceneError> {
        check_dimension(name, "width", options.width)?;
        check_dimension(name, "height", options.height)?;
        check_dimension(name, "depth", options.depth)?;
        let data = create_box(options.width, options.height, options.depth);
        Ok(self.meshes.insert(SceneMesh::new(name, data)))
    }

    pub fn create_cylinder(
        &mut self,
        name: &str,
        options: CylinderOptions,
    ) -> Result<MeshId, SceneError> {
        check_dimension(name, "diameter", options.diameter)?;
        check_dimension(name, "height", options.height)?;
        check_tessellation(name, options.tessellation)?;
        let data = create_cylinder(options.diameter, options.height, options.tessellation);
        Ok(self.meshes.insert(SceneMesh::new(name, data)))
    }

    pub fn create_sphere(&mut self, name: &str, options: SphereOptions) -> Result<MeshId, SceneError> {
        check_dimension(name, "diameter", options.diameter)?;
        check_tessellation(name, options.segments)?;
        let data = create_sphere(options.diameter, options.segments, options.segments / 2);
        Ok(self.meshes.insert(SceneMesh::new(name, data)))
    }

    pub fn meshes(&self) -> &Meshes {
        &self.meshes
    }

    pub fn mesh(&self, id: MeshId) -> Result<&SceneMesh, SceneError> {
        self.meshes.get(id).ok_or(SceneError::UnknownMesh(id))
    }

    pub fn mesh_mut(&mut self, id: MeshId) -> Result<&mut SceneMesh, SceneError> {
        self.meshes.get_mut(id).ok_or(SceneError::UnknownMesh(id))
    }

    /// Remove a mesh; callbacks and effects tied to it stop on the next frame
    pub fn remove_mesh(&mut self, id: MeshId) -> Option<SceneMesh> {
        let removed = self.meshes.map.remove(&id)?;
        self.merged_into.retain(|_, part| part.mesh != id);
        Some(removed)
    }

    pub fn add_material(&mut self, material: SurfaceMaterial) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    pub fn material(&self, id: MaterialId) -> Option<&SurfaceMaterial> {
        self.materials.get(id.0)
    }

    pub fn materials(&self) -> &[SurfaceMaterial] {
        &self.materials
    }

    pub fn assign_material(&mut self, mesh: MeshId, material: MaterialId) -> Result<(), SceneError> {
        if material.0 >= self.materials.len() {
            return Err(SceneError::UnknownMaterial(material));
        }
        self.mesh_mut(mesh)?.material = Some(material);
        Ok(())
    }

    /// Material of a part, looked up through merges
    pub fn part_material(&self, part: MeshId) -> Option<MaterialId> {
        let location = self.resolve_part(part)?;
        let mesh = self.meshes.get(location.mesh)?;
        match location.sub_mesh {
            Some(index) => mesh.sub_meshes.get(index)?.material,
            None => mesh.material,
        }
    }

    pub fn create_dynamic_texture(&mut self, name: &str, width: u32, height: u32) -> TextureId {
        self.textures.push(DynamicTexture::new(name, width, height));
        TextureId(self.textures.len() - 1)
    }

    pub fn texture(&self, id: TextureId) -> Option<&DynamicTexture> {
        self.textures.get(id.0)
    }

    pub fn texture_mut(&mut self, id: TextureId) -> Option<&mut DynamicTexture> {
        self.textures.get_mut(id.0)
    }

    pub fn textures(&self) -> &[DynamicTexture] {
        &self.textures
    }

    pub fn add_glow_layer(&mut self, layer: GlowLayer) -> usize {
        self.glow_layers.push(layer);
        self.glow_layers.len() - 1
    }

    pub fn glow_layers(&self) -> &[GlowLayer] {
        &self.glow_layers
    }

    /// Strongest glow intensity applied to a part, if any layer includes it
    pub fn glow_intensity(&self, part: MeshId) -> Option<f32> {
        self.glow_layers
            .iter()
            .filter(|layer| layer.includes(part))
            .map(|layer| layer.intensity)
            .reduce(f32::max)
    }

    /// The particle facility, when this scene has one
    pub fn particles_mut(&mut self) -> Option<&mut ParticleHost> {
        self.particles.as_mut()
    }

    pub fn particle_systems(&self) -> &[ParticleSystem] {
        self.particles.as_ref().map_or(&[], |host| host.systems())
    }

    pub fn has_particle_support(&self) -> bool {
        self.particles.is_some()
    }

    /// Combine meshes into one, baking each source's transform
    ///
    /// The result sits at the origin and keeps one [`SubMesh`] per source.
    /// With `dispose_source` the sources are removed from the scene, and
    /// [`resolve_part`](Self::resolve_part) maps their ids to the sub-meshes.
    pub fn merge_meshes(
        &mut self,
        name: &str,
        sources: &[MeshId],
        dispose_source: bool,
    ) -> Result<MeshId, SceneError> {
        if sources.is_empty() {
            return Err(SceneError::EmptyMerge);
        }
        if let Some(missing) = sources.iter().find(|id| !self.meshes.contains(**id)) {
            return Err(SceneError::UnknownMesh(*missing));
        }

        let mut data = MeshData::new();
        let mut sub_meshes = Vec::with_capacity(sources.len());
        for &id in sources {
            let source = self.mesh(id)?;
            let local = source.world_matrix();
            let mut part = source.data.clone();
            part.transform(local);
            let (part_name, material) = (source.name.clone(), source.material);
            let indices = data.merge(part);
            sub_meshes.push(SubMesh {
                source: id,
                name: part_name,
                material,
                indices,
                local,
            });
        }

        let locals: Vec<Mat4> = sub_meshes.iter().map(|sub| sub.local).collect();
        let mut merged = SceneMesh::new(name, data);
        merged.material = sub_meshes.first().and_then(|s| s.material);
        merged.sub_meshes = sub_meshes;
        let merged_id = self.meshes.insert(merged);

        if dispose_source {
            for (index, &id) in sources.iter().enumerate() {
                self.meshes.map.remove(&id);
                self.merged_into.insert(
                    id,
                    MergedPart {
                        mesh: merged_id,
                        sub_mesh: index,
                        local: locals[index],
                    },
                );
            }
            // Parts absorbed by a source that was itself a merge follow along
            for entry in self.merged_into.values_mut() {
                if let Some(index) = sources.iter().position(|id| *id == entry.mesh) {
                    *entry = MergedPart {
                        mesh: merged_id,
                        sub_mesh: index,
                        local: locals[index] * entry.local,
                    };
                }
            }
        }

        debug!(
            "Merged {} meshes into {:?} ({} triangles)",
            sources.len(),
            name,
            self.mesh(merged_id)?.data.triangle_count()
        );
        Ok(merged_id)
    }

    /// Find where a part lives now
    pub fn resolve_part(&self, part: MeshId) -> Option<PartLocation> {
        if self.meshes.contains(part) {
            return Some(PartLocation {
                mesh: part,
                sub_mesh: None,
            });
        }
        let merged = self.merged_into.get(&part)?;
        self.meshes.contains(merged.mesh).then_some(PartLocation {
            mesh: merged.mesh,
            sub_mesh: Some(merged.sub_mesh),
        })
    }

    /// World transform of a part; a merged part keeps its own placement
    /// relative to the merged mesh
    pub fn part_world_matrix(&self, part: MeshId) -> Option<Mat4> {
        resolve_world(&self.meshes, &self.merged_into, part)
    }

    /// Register a callback run once per frame by [`render_frame`](Self::render_frame)
    pub fn register_before_render<F>(&mut self, callback: F)
    where
        F: FnMut(&mut Meshes) -> bool + 'static,
    {
        self.before_render.push(Box::new(callback));
    }

    pub fn before_render_count(&self) -> usize {
        self.before_render.len()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Run one frame: callbacks first, then particle systems
    pub fn render_frame(&mut self, dt_seconds: f32) {
        let meshes = &mut self.meshes;
        self.before_render
            .retain_mut(|callback| callback(&mut *meshes));

        let (meshes, merged_into) = (&self.meshes, &self.merged_into);
        if let Some(host) = self.particles.as_mut() {
            let ratio = dt_seconds * REFERENCE_FPS;
            let mut rng = rand::rng();
            let emitters: Vec<Option<Mat4>> = host
                .systems
                .iter()
                .map(|system| resolve_world(meshes, merged_into, system.emitter))
                .collect();
            for (system, world) in host.systems.iter_mut().zip(emitters) {
                system.animate(world, ratio, &mut rng);
            }
        }

        self.frame += 1;
    }
}

fn resolve_world(
    meshes: &Meshes,
    merged_into: &HashMap<MeshId, MergedPart>,
    part: MeshId,
) -> Option<Mat4> {
    if let Some(mesh) = meshes.get(part) {
        return Some(mesh.world_matrix());
    }
    let merged = merged_into.get(&part)?;
    let mesh = meshes.get(merged.mesh)?;
    Some(mesh.world_matrix() * merged.local)
}

fn check_dimension(mesh: &str, field: &'static str, value: f32) -> Result<(), SceneError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SceneError::InvalidDimension {
            mesh: mesh.to_string(),
            field,
            value,
        })
    }
}

fn check_tessellation(mesh: &str, value: u32) -> Result<(), SceneError> {
    if value >= 3 {
        Ok(())
    } else {
        Err(SceneError::InvalidTessellation {
            mesh: mesh.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box(scene: &mut Scene, name: &str) -> MeshId {
        scene
            .create_box(
                name,
                BoxOptions {
                    width: 1.0,
                    height: 1.0,
                    depth: 1.0,
                },
            )
            .unwrap()
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        let mut scene = Scene::new();
        let err = scene
            .create_box(
                "flat",
                BoxOptions {
                    width: 1.0,
                    height: 0.0,
                    depth: 1.0,
                },
            )
            .unwrap_err();
        assert!(matches!(err, SceneError::InvalidDimension { field: "height", .. }));

        let err = scene
            .create_sphere("nan", SphereOptions::new(f32::NAN))
            .unwrap_err();
        assert!(matches!(err, SceneError::InvalidDimension { field: "diameter", .. }));

        let err = scene
            .create_cylinder(
                "flat",
                CylinderOptions {
                    tessellation: 2,
                    ..CylinderOptions::new(1.0, 1.0)
                },
            )
            .unwrap_err();
        assert!(matches!(err, SceneError::InvalidTessellation { value: 2, .. }));
        assert!(scene.meshes().is_empty());
    }

    #[test]
    fn test_assign_unknown_material() {
        let mut scene = Scene::new();
        let id = unit_box(&mut scene, "a");
        let bogus = MaterialId(3);
        assert_eq!(
            scene.assign_material(id, bogus),
            Err(SceneError::UnknownMaterial(bogus))
        );
    }

    #[test]
    fn test_merge_bakes_transforms_and_keeps_parts() {
        let mut scene = Scene::new();
        let red = scene.add_material(SurfaceMaterial::new("red").with_diffuse([0.8, 0.2, 0.2]));
        let blue = scene.add_material(SurfaceMaterial::new("blue"));
        let a = unit_box(&mut scene, "a");
        let b = unit_box(&mut scene, "b");
        scene.mesh_mut(b).unwrap().position = Vec3::new(0.0, 3.0, 0.0);
        scene.assign_material(a, red).unwrap();
        scene.assign_material(b, blue).unwrap();

        let merged = scene.merge_meshes("pair", &[a, b], true).unwrap();
        assert_eq!(scene.meshes().len(), 1);

        let mesh = scene.mesh(merged).unwrap();
        assert_eq!(mesh.name, "pair");
        assert_eq!(mesh.sub_meshes.len(), 2);
        assert_eq!(mesh.sub_mesh("b").unwrap().material, Some(blue));
        let (_, max) = mesh.data.bounds().unwrap();
        assert_relative_eq!(max.y, 3.5);

        assert_eq!(
            scene.resolve_part(b),
            Some(PartLocation {
                mesh: merged,
                sub_mesh: Some(1)
            })
        );
        assert_eq!(scene.part_material(a), Some(red));

        let center = scene.part_world_matrix(b).unwrap().transform_point3(Vec3::ZERO);
        assert_relative_eq!(center.y, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_merged_part_keeps_its_rotation() {
        let mut scene = Scene::new();
        let a = unit_box(&mut scene, "a");
        let tilted = unit_box(&mut scene, "tilted");
        {
            let mesh = scene.mesh_mut(tilted).unwrap();
            mesh.position = Vec3::new(1.0, 0.0, 0.0);
            mesh.rotation.z = std::f32::consts::FRAC_PI_2;
        }
        let inner = scene.merge_meshes("inner", &[a, tilted], true).unwrap();
        scene.mesh_mut(inner).unwrap().position = Vec3::new(0.0, 2.0, 0.0);
        let outer = scene.merge_meshes("outer", &[inner], true).unwrap();
        scene.mesh_mut(outer).unwrap().rotation.y = std::f32::consts::FRAC_PI_2;

        assert_eq!(scene.resolve_part(tilted).unwrap().mesh, outer);
        let world = scene.part_world_matrix(tilted).unwrap();
        let expected = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2)
            * Mat4::from_translation(Vec3::new(1.0, 2.0, 0.0))
            * Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            let got = world.transform_vector3(axis);
            let want = expected.transform_vector3(axis);
            assert_relative_eq!(got.x, want.x, epsilon = 1e-5);
            assert_relative_eq!(got.y, want.y, epsilon = 1e-5);
            assert_relative_eq!(got.z, want.z, epsilon = 1e-5);
        }
        let origin = world.transform_point3(Vec3::ZERO);
        let want = expected.transform_point3(Vec3::ZERO);
        assert_relative_eq!(origin.x, want.x, epsilon = 1e-5);
        assert_relative_eq!(origin.y, want.y, epsilon = 1e-5);
        assert_relative_eq!(origin.z, want.z, epsilon = 1e-5);
    }

    #[test]
    fn test_merge_without_dispose_keeps_sources() {
        let mut scene = Scene::new();
        let a = unit_box(&mut scene, "a");
        let merged = scene.merge_meshes("copy", &[a], false).unwrap();
        assert_eq!(scene.meshes().len(), 2);
        assert_eq!(scene.resolve_part(a).unwrap().mesh, a);
        assert_ne!(merged, a);
    }

    #[test]
    fn test_merge_errors() {
        let mut scene = Scene::new();
        assert_eq!(scene.merge_meshes("none", &[], true), Err(SceneError::EmptyMerge));
        let ghost = MeshId(42);
        assert_eq!(
            scene.merge_meshes("ghost", &[ghost], true),
            Err(SceneError::UnknownMesh(ghost))
        );
    }

    #[test]
    fn test_before_render_runs_each_frame_and_unregisters() {
        let mut scene = Scene::new();
        let id = unit_box(&mut scene, "spinner");
        scene.register_before_render(move |meshes| match meshes.get_mut(id) {
            Some(mesh) => {
                mesh.rotation.y += 0.5;
                true
            }
            None => false,
        });

        scene.render_frame(1.0 / 60.0);
        scene.render_frame(1.0 / 60.0);
        assert_relative_eq!(scene.mesh(id).unwrap().rotation.y, 1.0);
        assert_eq!(scene.frame(), 2);

        scene.remove_mesh(id);
        scene.render_frame(1.0 / 60.0);
        assert_eq!(scene.before_render_count(), 0);
    }

    #[test]
    fn test_particle_support_is_optional() {
        let mut with = Scene::new();
        assert!(with.particles_mut().is_some());

        let mut without = Scene::with_particle_support(false);
        assert!(without.particles_mut().is_none());
        assert!(without.particle_systems().is_empty());
        assert!(!without.has_particle_support());
    }

    #[test]
    fn test_glow_intensity_lookup() {
        let mut scene = Scene::new();
        let a = unit_box(&mut scene, "a");
        let b = unit_box(&mut scene, "b");
        let mut glow = GlowLayer::new("g").with_intensity(0.8);
        glow.add_included_only_mesh(a);
        scene.add_glow_layer(glow);
        assert_eq!(scene.glow_intensity(a), Some(0.8));
        assert_eq!(scene.glow_intensity(b), None);
    }
}
