//! Scene-level effects: glow layers and particle systems

use crate::scene::MeshId;
use glam::{Mat4, Vec3, Vec4};
use rand::Rng;

/// Glow post-process restricted to an explicit set of meshes
#[derive(Debug, Clone, PartialEq)]
pub struct GlowLayer {
    pub name: String,
    pub intensity: f32,
    included_only: Vec<MeshId>,
}

impl GlowLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            intensity: 1.0,
            included_only: Vec::new(),
        }
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    /// Restrict the glow to `mesh` (in addition to any already included)
    pub fn add_included_only_mesh(&mut self, mesh: MeshId) {
        if !self.included_only.contains(&mesh) {
            self.included_only.push(mesh);
        }
    }

    pub fn included_meshes(&self) -> &[MeshId] {
        &self.included_only
    }

    pub fn includes(&self, mesh: MeshId) -> bool {
        self.included_only.contains(&mesh)
    }
}

/// Emission parameters of a particle system
///
/// Time values are in "update units": each frame advances particles by
/// `update_speed` scaled by the frame's animation ratio (1.0 at 60 fps).
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleConfig {
    /// Maximum number of live particles
    pub capacity: usize,
    /// Emission box corners, in the emitter's local space
    pub min_emit_box: Vec3,
    pub max_emit_box: Vec3,
    /// Initial colour is a random blend of `color1` and `color2`
    pub color1: Vec4,
    pub color2: Vec4,
    /// Colour reached at the end of each particle's life
    pub color_dead: Vec4,
    pub min_size: f32,
    pub max_size: f32,
    pub min_lifetime: f32,
    pub max_lifetime: f32,
    /// Particles per update unit
    pub emit_rate: f32,
    pub gravity: Vec3,
    pub direction1: Vec3,
    pub direction2: Vec3,
    pub min_angular_speed: f32,
    pub max_angular_speed: f32,
    pub min_emit_power: f32,
    pub max_emit_power: f32,
    pub update_speed: f32,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            min_emit_box: Vec3::splat(-0.5),
            max_emit_box: Vec3::splat(0.5),
            color1: Vec4::ONE,
            color2: Vec4::ONE,
            color_dead: Vec4::new(0.0, 0.0, 0.0, 1.0),
            min_size: 1.0,
            max_size: 1.0,
            min_lifetime: 1.0,
            max_lifetime: 1.0,
            emit_rate: 10.0,
            gravity: Vec3::ZERO,
            direction1: Vec3::new(0.0, 1.0, 0.0),
            direction2: Vec3::new(0.0, 1.0, 0.0),
            min_angular_speed: 0.0,
            max_angular_speed: 0.0,
            min_emit_power: 1.0,
            max_emit_power: 1.0,
            update_speed: 0.01,
        }
    }
}

/// One live particle, in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: Vec4,
    color_step: Vec4,
    pub size: f32,
    pub angle: f32,
    pub angular_speed: f32,
    pub age: f32,
    pub lifetime: f32,
}

/// Particle emitter anchored to a mesh
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    pub name: String,
    pub config: ParticleConfig,
    /// Mesh the emission box follows
    pub emitter: MeshId,
    particles: Vec<Particle>,
    pending: f32,
    started: bool,
}

impl ParticleSystem {
    pub fn new(name: impl Into<String>, config: ParticleConfig, emitter: MeshId) -> Self {
        Self {
            name: name.into(),
            particles: Vec::with_capacity(config.capacity),
            config,
            emitter,
            pending: 0.0,
            started: false,
        }
    }

    pub fn start(&mut self) {
        self.started = true;
    }

    /// Stop emitting; live particles finish their lives
    pub fn stop(&mut self) {
        self.started = false;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Advance by one frame
    ///
    /// `emitter_world` is the current world transform of the emitter, or
    /// `None` when the emitter no longer exists (emission then stops).
    pub fn animate<R: Rng + ?Sized>(
        &mut self,
        emitter_world: Option<Mat4>,
        animation_ratio: f32,
        rng: &mut R,
    ) {
        let step = self.config.update_speed * animation_ratio;

        self.particles.retain_mut(|p| {
            p.age += step;
            if p.age >= p.lifetime {
                return false;
            }
            p.velocity += self.config.gravity * step;
            p.position += p.velocity * step;
            p.color += p.color_step * step;
            p.angle += p.angular_speed * step;
            true
        });

        let Some(world) = emitter_world else {
            self.pending = 0.0;
            return;
        };
        if !self.started {
            return;
        }

        self.pending += self.config.emit_rate * step;
        let count = self.pending.floor();
        self.pending -= count;

        let free = self.config.capacity.saturating_sub(self.particles.len());
        for _ in 0..(count as usize).min(free) {
            let particle = self.spawn(world, rng);
            self.particles.push(particle);
        }
    }

    fn spawn<R: Rng + ?Sized>(&self, world: Mat4, rng: &mut R) -> Particle {
        let c = &self.config;
        let local = lerp_vec3(c.min_emit_box, c.max_emit_box, random3(rng));
        let direction = lerp_vec3(c.direction1, c.direction2, random3(rng));
        let power = lerp(c.min_emit_power, c.max_emit_power, rng.random());
        let lifetime = lerp(c.min_lifetime, c.max_lifetime, rng.random()).max(f32::EPSILON);
        let color = c.color1.lerp(c.color2, rng.random());

        Particle {
            position: world.transform_point3(local),
            velocity: world.transform_vector3(direction) * power,
            color,
            color_step: (c.color_dead - color) / lifetime,
            size: lerp(c.min_size, c.max_size, rng.random()),
            angle: 0.0,
            angular_speed: lerp(c.min_angular_speed, c.max_angular_speed, rng.random()),
            age: 0.0,
            lifetime,
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn lerp_vec3(a: Vec3, b: Vec3, t: Vec3) -> Vec3 {
    a + (b - a) * t
}

fn random3<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    Vec3::new(rng.random(), rng.random(), rng.random())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn emitter() -> MeshId {
        MeshId::from_raw(1)
    }

    #[test]
    fn test_glow_layer_includes() {
        let mut glow = GlowLayer::new("glow").with_intensity(0.8);
        glow.add_included_only_mesh(emitter());
        glow.add_included_only_mesh(emitter());
        assert_eq!(glow.included_meshes(), &[emitter()]);
        assert!(glow.includes(emitter()));
        assert!(!glow.includes(MeshId::from_raw(2)));
        assert_eq!(glow.intensity, 0.8);
    }

    #[test]
    fn test_not_started_emits_nothing() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut system = ParticleSystem::new("p", ParticleConfig::default(), emitter());
        system.animate(Some(Mat4::IDENTITY), 1.0, &mut rng);
        assert!(system.particles().is_empty());
    }

    #[test]
    fn test_emission_respects_rate_and_capacity() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = ParticleConfig {
            capacity: 25,
            emit_rate: 1000.0,
            update_speed: 0.01,
            min_lifetime: 100.0,
            max_lifetime: 100.0,
            ..ParticleConfig::default()
        };
        let mut system = ParticleSystem::new("p", config, emitter());
        system.start();

        system.animate(Some(Mat4::IDENTITY), 1.0, &mut rng);
        assert_eq!(system.particles().len(), 10);

        for _ in 0..5 {
            system.animate(Some(Mat4::IDENTITY), 1.0, &mut rng);
        }
        assert_eq!(system.particles().len(), 25);
    }

    #[test]
    fn test_particles_spawn_inside_emit_box() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = ParticleConfig {
            min_emit_box: Vec3::new(-0.1, -1.0, -0.1),
            max_emit_box: Vec3::new(0.1, 1.0, 0.1),
            emit_rate: 500.0,
            update_speed: 0.01,
            min_lifetime: 10.0,
            max_lifetime: 10.0,
            min_emit_power: 0.0,
            max_emit_power: 0.0,
            ..ParticleConfig::default()
        };
        let mut system = ParticleSystem::new("p", config, emitter());
        system.start();
        let offset = Vec3::new(5.0, 0.0, 0.0);
        system.animate(Some(Mat4::from_translation(offset)), 1.0, &mut rng);

        assert_eq!(system.particles().len(), 5);
        for p in system.particles() {
            let local = p.position - offset;
            assert!(local.x.abs() <= 0.1 + 1e-6);
            assert!(local.y.abs() <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn test_particles_expire_and_fade() {
        let mut rng = StdRng::seed_from_u64(11);
        let config = ParticleConfig {
            color1: Vec4::ONE,
            color2: Vec4::ONE,
            color_dead: Vec4::ZERO,
            min_lifetime: 0.1,
            max_lifetime: 0.1,
            emit_rate: 100.0,
            update_speed: 0.01,
            ..ParticleConfig::default()
        };
        let mut system = ParticleSystem::new("p", config, emitter());
        system.start();
        system.animate(Some(Mat4::IDENTITY), 1.0, &mut rng);
        assert_eq!(system.particles().len(), 1);

        system.stop();
        for _ in 0..5 {
            system.animate(Some(Mat4::IDENTITY), 1.0, &mut rng);
        }
        let p = system.particles()[0];
        assert_relative_eq!(p.color.w, 0.5, epsilon = 1e-4);

        for _ in 0..6 {
            system.animate(Some(Mat4::IDENTITY), 1.0, &mut rng);
        }
        assert!(system.particles().is_empty());
    }

    #[test]
    fn test_gravity_pulls_down() {
        let mut rng = StdRng::seed_from_u64(5);
        let config = ParticleConfig {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            direction1: Vec3::ZERO,
            direction2: Vec3::ZERO,
            min_emit_box: Vec3::ZERO,
            max_emit_box: Vec3::ZERO,
            emit_rate: 100.0,
            update_speed: 0.01,
            min_lifetime: 10.0,
            max_lifetime: 10.0,
            ..ParticleConfig::default()
        };
        let mut system = ParticleSystem::new("p", config, emitter());
        system.start();
        system.animate(Some(Mat4::IDENTITY), 1.0, &mut rng);
        system.stop();
        for _ in 0..10 {
            system.animate(Some(Mat4::IDENTITY), 1.0, &mut rng);
        }
        assert!(system.particles()[0].position.y < 0.0);
        assert!(system.particles()[0].velocity.y < 0.0);
    }

    #[test]
    fn test_missing_emitter_stops_emission() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut system = ParticleSystem::new("p", ParticleConfig::default(), emitter());
        system.start();
        for _ in 0..100 {
            system.animate(None, 1.0, &mut rng);
        }
        assert!(system.particles().is_empty());
    }
}
