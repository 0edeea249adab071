//! Crafta Props viewer
//!
//! Builds a procedural prop into a scene and renders it with wgpu, with an
//! egui panel for picking the prop and its build options.

mod camera;
mod config;
mod state;
mod ui;

use camera::{Camera, CameraUniform};
use config::{hex_to_rgb, hex_to_rgba, CONFIG};
use crafta_props::mesh::{create_box, MeshData, Vertex};
use crafta_props::scene::{MaterialId, MeshId, TextureId};
use crafta_props::texture::DynamicTexture;
use crafta_props::{BuildOptions, CompositeObject, PropKind, Scene};
use state::AppState;
use ui::{render_left_sidebar, render_right_sidebar, PartInfo, SceneInfo, UiAction, UiState};

use anyhow::{Context, Result};
use clap::Parser;
use egui_wgpu::ScreenDescriptor;
use glam::{Mat4, Vec2, Vec3};
use log::{error, info, warn};
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use wgpu::util::DeviceExt;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

/// Build and view procedural props
#[derive(Parser, Debug)]
#[command(name = "crafta-props", version, about)]
struct Args {
    /// Prop to build on start-up (couch or sword)
    prop: Option<PropKind>,

    /// JSON file with build options, e.g. {"theme": "dragon", "size": "large"}
    #[arg(long)]
    options: Option<PathBuf>,

    /// Start without particle support (magical swords only glow)
    #[arg(long)]
    no_particles: bool,
}

/// What to build when the window opens
struct Startup {
    prop: PropKind,
    options: BuildOptions,
    particles: bool,
    state: AppState,
}

/// Lighting uniform buffer data
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct LightingUniform {
    direction: [f32; 4],
    ambient: [f32; 4],
}

impl LightingUniform {
    fn from_config() -> Self {
        let light = &CONFIG.lighting;
        Self {
            direction: light.direction.normalize_or_zero().extend(0.0).to_array(),
            ambient: [light.ambient, 0.0, 0.0, 0.0],
        }
    }
}

/// Per-draw transform and material
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawUniform {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    diffuse: [f32; 4],
    specular: [f32; 4],
    emissive: [f32; 4],
    /// roughness, metallic, textured, glow multiplier
    params: [f32; 4],
}

impl DrawUniform {
    fn plain(model: Mat4, rgb: [f32; 3]) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: model.inverse().transpose().to_cols_array_2d(),
            diffuse: [rgb[0], rgb[1], rgb[2], 1.0],
            specular: [0.1, 0.1, 0.1, 1.0],
            emissive: [0.0; 4],
            params: [0.9, 0.0, 0.0, 1.0],
        }
    }
}

/// Particle quad corner
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ParticleVertex {
    center: [f32; 3],
    corner: [f32; 2],
    color: [f32; 4],
}

impl ParticleVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x4];

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ParticleVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

const QUAD_CORNERS: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
];

/// GPU mesh handle
struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
}

impl GpuMesh {
    fn from_mesh_data(device: &wgpu::Device, data: &MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Prop Vertex Buffer"),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Prop Index Buffer"),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            num_indices: data.indices.len() as u32,
        }
    }
}

/// GPU copy of a dynamic texture
struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    revision: u32,
}

impl GpuTexture {
    fn new(device: &wgpu::Device, queue: &wgpu::Queue, source: &DynamicTexture) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(source.name.as_str()),
            size: wgpu::Extent3d {
                width: source.width().max(1),
                height: source.height().max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut gpu = Self {
            texture,
            view,
            revision: source.revision(),
        };
        gpu.upload(queue, source);
        gpu
    }

    fn upload(&mut self, queue: &wgpu::Queue, source: &DynamicTexture) {
        if source.width() == 0 || source.height() == 0 {
            return;
        }
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            source.image().as_raw(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * source.width()),
                rows_per_image: Some(source.height()),
            },
            wgpu::Extent3d {
                width: source.width(),
                height: source.height(),
                depth_or_array_layers: 1,
            },
        );
        self.revision = source.revision();
    }
}

/// One draw call: a mesh, or one part of a merged mesh
struct DrawItem {
    mesh: MeshId,
    indices: Range<u32>,
    /// Id glow layers know this part by
    part: MeshId,
    material: Option<MaterialId>,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Main application state
struct App {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    render_pipeline: wgpu::RenderPipeline,
    particle_pipeline: wgpu::RenderPipeline,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    draw_bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    white_texture: GpuTexture,
    depth_texture: wgpu::TextureView,
    ground_mesh: GpuMesh,
    ground_draw: (wgpu::Buffer, wgpu::BindGroup),
    scene: Scene,
    composite: Option<(PropKind, CompositeObject)>,
    gpu_meshes: HashMap<MeshId, GpuMesh>,
    gpu_textures: HashMap<usize, GpuTexture>,
    draw_items: Vec<DrawItem>,
    camera: Camera,
    state: AppState,
    mouse_position: (f32, f32),
    orbiting: bool,
    last_frame_time: Instant,
    // Egui integration
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    ui_state: UiState,
}

impl App {
    async fn new(window: Arc<Window>, startup: Startup) -> Result<Self> {
        let size = window.inner_size();
        let aspect = size.width as f32 / size.height.max(1) as f32;

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to find an appropriate adapter")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .context("Failed to create device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("Surface reports no formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[CameraUniform::new()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let lighting_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lighting Buffer"),
            contents: bytemuck::cast_slice(&[LightingUniform::from_config()]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        // Camera and lighting (group 0)
        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[
                    uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
                    uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
                ],
                label: Some("camera_bind_group_layout"),
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lighting_buffer.as_entire_binding(),
                },
            ],
            label: Some("camera_bind_group"),
        });

        // Per-draw transform, material and texture (group 1)
        let draw_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[
                    uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
                label: Some("draw_bind_group_layout"),
            });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Diffuse Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let mut white = DynamicTexture::new("white", 1, 1);
        {
            let mut ctx = white.context();
            ctx.set_fill_style("#ffffff");
            ctx.fill_rect(0, 0, 1, 1);
        }
        let white_texture = GpuTexture::new(&device, &queue, &white);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&camera_bind_group_layout, &draw_bind_group_layout],
            push_constant_ranges: &[],
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[Vertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        // Particles blend additively and never write depth
        let particle_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Pipeline Layout"),
            bind_group_layouts: &[&camera_bind_group_layout],
            push_constant_ranges: &[],
        });

        let particle_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Particle Pipeline"),
            layout: Some(&particle_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_particle",
                buffers: &[ParticleVertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_particle",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::SrcAlpha,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent::OVER,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let depth_texture = Self::create_depth_texture(&device, &config);

        let ground_mesh = GpuMesh::from_mesh_data(&device, &create_box(14.0, 0.1, 14.0));
        let (r, g, b) = hex_to_rgb(CONFIG.colors.ground);
        let ground_uniform = DrawUniform::plain(Mat4::IDENTITY, [r, g, b]);
        let ground_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Ground Draw Buffer"),
            contents: bytemuck::cast_slice(&[ground_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let ground_bind_group = create_draw_bind_group(
            &device,
            &draw_bind_group_layout,
            &ground_buffer,
            &white_texture.view,
            &sampler,
        );

        let camera = Camera::new(aspect);

        // Initialize egui
        let egui_ctx = egui::Context::default();

        let mut style = egui::Style::default();
        style.visuals = egui::Visuals::dark();
        style.visuals.window_fill = egui::Color32::from_rgba_unmultiplied(26, 26, 46, 242);
        style.visuals.panel_fill = egui::Color32::from_rgba_unmultiplied(26, 26, 46, 242);
        egui_ctx.set_style(style);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1, false);

        let ui_state = UiState::new(startup.prop, &startup.options, startup.particles);

        let mut app = Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            render_pipeline,
            particle_pipeline,
            camera_buffer,
            camera_bind_group,
            draw_bind_group_layout,
            sampler,
            white_texture,
            depth_texture,
            ground_mesh,
            ground_draw: (ground_buffer, ground_bind_group),
            scene: Scene::with_particle_support(startup.particles),
            composite: None,
            gpu_meshes: HashMap::new(),
            gpu_textures: HashMap::new(),
            draw_items: Vec::new(),
            camera,
            state: startup.state,
            mouse_position: (0.0, 0.0),
            orbiting: false,
            last_frame_time: Instant::now(),
            egui_ctx,
            egui_state,
            egui_renderer,
            ui_state,
        };

        app.build_prop(startup.prop, &startup.options, startup.particles);

        Ok(app)
    }

    /// Replace the scene with a freshly built prop
    fn build_prop(&mut self, prop: PropKind, options: &BuildOptions, particles: bool) {
        let mut scene = Scene::with_particle_support(particles);
        match prop.build(&mut scene, options) {
            Ok(composite) => {
                info!("Built {} into mesh {:?}", prop, composite.mesh);
                self.scene = scene;
                self.composite = Some((prop, composite));
                self.state.remember(prop, options.clone());
                self.upload_scene();
                self.frame_composite();
            }
            Err(e) => error!("Failed to build {}: {}", prop, e),
        }
    }

    fn clear_scene(&mut self) {
        if let Some((prop, composite)) = self.composite.take() {
            self.scene.remove_mesh(composite.mesh);
            info!("Removed {}", prop);
        }
        self.upload_scene();
    }

    /// Recreate GPU buffers for every mesh and texture in the scene
    fn upload_scene(&mut self) {
        self.gpu_meshes.clear();
        self.gpu_textures.clear();
        self.draw_items.clear();

        for (index, texture) in self.scene.textures().iter().enumerate() {
            self.gpu_textures
                .insert(index, GpuTexture::new(&self.device, &self.queue, texture));
        }

        for (id, mesh) in self.scene.meshes().iter() {
            if mesh.data.is_empty() {
                continue;
            }
            self.gpu_meshes
                .insert(id, GpuMesh::from_mesh_data(&self.device, &mesh.data));

            let parts: Vec<(MeshId, Range<u32>, Option<MaterialId>)> = if mesh.sub_meshes.is_empty() {
                vec![(id, 0..mesh.data.indices.len() as u32, mesh.material)]
            } else {
                mesh.sub_meshes
                    .iter()
                    .map(|sub| (sub.source, sub.indices.clone(), sub.material))
                    .collect()
            };

            for (part, indices, material) in parts {
                let texture = material
                    .and_then(|m| self.scene.material(m))
                    .and_then(|m| m.diffuse_texture)
                    .and_then(|t: TextureId| self.gpu_textures.get(&t.index()))
                    .map_or(&self.white_texture.view, |t| &t.view);
                let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Draw Buffer"),
                    size: std::mem::size_of::<DrawUniform>() as wgpu::BufferAddress,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = create_draw_bind_group(
                    &self.device,
                    &self.draw_bind_group_layout,
                    &uniform_buffer,
                    texture,
                    &self.sampler,
                );
                self.draw_items.push(DrawItem {
                    mesh: id,
                    indices,
                    part,
                    material,
                    uniform_buffer,
                    bind_group,
                });
            }
        }

        // Ground sits just under the lowest point of the scene
        let floor = self
            .scene
            .meshes()
            .iter()
            .filter_map(|(_, mesh)| mesh.data.bounds().map(|(min, _)| min.y + mesh.position.y))
            .reduce(f32::min)
            .unwrap_or(-1.0);
        let (r, g, b) = hex_to_rgb(CONFIG.colors.ground);
        let ground = DrawUniform::plain(Mat4::from_translation(Vec3::new(0.0, floor - 0.1, 0.0)), [r, g, b]);
        self.queue
            .write_buffer(&self.ground_draw.0, 0, bytemuck::cast_slice(&[ground]));
    }

    /// Fit the camera to the current composite
    fn frame_composite(&mut self) {
        let Some((_, composite)) = self.composite else {
            return;
        };
        if let Ok(mesh) = self.scene.mesh(composite.mesh) {
            if let Some((min, max)) = mesh.data.bounds() {
                let radius = min.length().max(max.length());
                self.camera.frame_radius(radius);
            }
        }
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = Self::create_depth_texture(&self.device, &self.config);
            self.camera
                .set_aspect(new_size.width as f32 / new_size.height as f32);
        }
    }

    fn update(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_frame_time).as_secs_f32().min(0.1);
        self.last_frame_time = now;

        self.scene.render_frame(dt);

        // Re-upload textures redrawn since the last frame
        for (index, texture) in self.scene.textures().iter().enumerate() {
            if let Some(gpu) = self.gpu_textures.get_mut(&index) {
                if gpu.revision != texture.revision() {
                    gpu.upload(&self.queue, texture);
                }
            }
        }

        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update(&self.camera);
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[camera_uniform]));
    }

    fn draw_uniform(&self, item: &DrawItem) -> Option<DrawUniform> {
        let mesh = self.scene.mesh(item.mesh).ok()?;
        let model = mesh.world_matrix();
        let mut uniform = DrawUniform::plain(model, [1.0; 3]);

        if let Some(material) = item.material.and_then(|m| self.scene.material(m)) {
            uniform.diffuse = rgba(material.diffuse);
            uniform.specular = rgba(material.specular);
            uniform.emissive = rgba(material.emissive);
            uniform.params = [
                material.roughness.unwrap_or(0.5),
                material.metallic.unwrap_or(0.0),
                if material.diffuse_texture.is_some() { 1.0 } else { 0.0 },
                1.0,
            ];
        }
        if let Some(intensity) = self.scene.glow_intensity(item.part) {
            uniform.params[3] = 1.0 + intensity * CONFIG.glow.boost;
        }
        Some(uniform)
    }

    /// Camera-facing quads for every live particle
    fn particle_vertices(&self) -> Vec<ParticleVertex> {
        let mut vertices = Vec::new();
        for system in self.scene.particle_systems() {
            for particle in system.particles() {
                let half = particle.size / 2.0;
                let (sin, cos) = particle.angle.sin_cos();
                for corner in QUAD_CORNERS {
                    let c = Vec2::from(corner) * half;
                    let rotated = Vec2::new(c.x * cos - c.y * sin, c.x * sin + c.y * cos);
                    vertices.push(ParticleVertex {
                        center: particle.position.to_array(),
                        corner: rotated.to_array(),
                        color: particle.color.to_array(),
                    });
                }
            }
        }
        vertices
    }

    fn scene_info(&self) -> SceneInfo {
        let mut info = SceneInfo {
            glow_layers: self.scene.glow_layers().len(),
            live_particles: self
                .scene
                .particle_systems()
                .iter()
                .map(|s| s.particles().len())
                .sum(),
            particle_support: self.scene.has_particle_support(),
            callbacks: self.scene.before_render_count(),
            ..Default::default()
        };
        let Some((prop, composite)) = self.composite else {
            return info;
        };
        let Ok(mesh) = self.scene.mesh(composite.mesh) else {
            return info;
        };
        info.composite = Some(format!("{} {}", prop.icon(), prop.display_name()));
        info.triangles = mesh.data.triangle_count();
        info.parts = mesh
            .sub_meshes
            .iter()
            .map(|sub| PartInfo {
                name: sub.name.clone(),
                material: sub
                    .material
                    .and_then(|m| self.scene.material(m))
                    .map_or_else(|| "-".to_string(), |m| m.name.clone()),
                glow: self.scene.glow_intensity(sub.source),
            })
            .collect();
        info
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let mut visible = Vec::with_capacity(self.draw_items.len());
        for (index, item) in self.draw_items.iter().enumerate() {
            if let Some(uniform) = self.draw_uniform(item) {
                self.queue
                    .write_buffer(&item.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));
                visible.push(index);
            }
        }

        let particle_vertices = self.particle_vertices();
        let particle_buffer = (!particle_vertices.is_empty()).then(|| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Particle Vertex Buffer"),
                    contents: bytemuck::cast_slice(&particle_vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        });

        {
            let bg_color = hex_to_rgba(CONFIG.colors.background);
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: bg_color[0] as f64,
                            g: bg_color[1] as f64,
                            b: bg_color[2] as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);

            // Render ground
            render_pass.set_bind_group(1, &self.ground_draw.1, &[]);
            render_pass.set_vertex_buffer(0, self.ground_mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(
                self.ground_mesh.index_buffer.slice(..),
                wgpu::IndexFormat::Uint32,
            );
            render_pass.draw_indexed(0..self.ground_mesh.num_indices, 0, 0..1);

            // Render prop parts with their materials
            for index in visible {
                let item = &self.draw_items[index];
                let Some(mesh) = self.gpu_meshes.get(&item.mesh) else {
                    continue;
                };
                render_pass.set_bind_group(1, &item.bind_group, &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(item.indices.clone(), 0, 0..1);
            }

            if let Some(buffer) = &particle_buffer {
                render_pass.set_pipeline(&self.particle_pipeline);
                render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
                render_pass.set_vertex_buffer(0, buffer.slice(..));
                render_pass.draw(0..particle_vertices.len() as u32, 0..1);
            }
        }

        // Render egui UI
        let info = self.scene_info();
        let egui_input = self.egui_state.take_egui_input(&self.window);
        let egui_ctx = self.egui_ctx.clone();

        let mut ui_actions = Vec::new();
        let egui_output = egui_ctx.run(egui_input, |ctx| {
            ui_actions.extend(render_left_sidebar(ctx, &mut self.ui_state));
            render_right_sidebar(ctx, &self.ui_state, &info);
        });

        for action in ui_actions {
            self.process_ui_action(action);
        }

        self.egui_state
            .handle_platform_output(&self.window, egui_output.platform_output);

        let screen_descriptor = ScreenDescriptor {
            size_in_pixels: [self.size.width, self.size.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        let tris = self
            .egui_ctx
            .tessellate(egui_output.shapes, egui_output.pixels_per_point);
        for (id, image_delta) in &egui_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }
        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &tris,
            &screen_descriptor,
        );

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            // egui-wgpu wants a 'static render pass with wgpu 22
            let mut render_pass = render_pass.forget_lifetime();
            self.egui_renderer
                .render(&mut render_pass, &tris, &screen_descriptor);
        }

        for id in &egui_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    fn process_ui_action(&mut self, action: UiAction) {
        match action {
            UiAction::Build {
                prop,
                options,
                particles,
            } => {
                self.state.particles_enabled = Some(particles);
                self.build_prop(prop, &options, particles);
            }
            UiAction::Clear => self.clear_scene(),
            UiAction::ResetCamera => {
                self.camera.reset();
                self.frame_composite();
            }
        }
    }

    /// Handle a window event, returning whether egui consumed it
    fn handle_event(&mut self, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(&self.window, event);
        if response.consumed {
            return true;
        }

        match event {
            WindowEvent::MouseInput { button, state, .. } => {
                if *button == MouseButton::Left {
                    self.orbiting = *state == ElementState::Pressed;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = (position.x as f32, position.y as f32);
                if self.orbiting {
                    self.camera
                        .orbit(x - self.mouse_position.0, y - self.mouse_position.1);
                }
                self.mouse_position = (x, y);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 40.0,
                };
                self.camera.zoom(lines);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    if let PhysicalKey::Code(KeyCode::KeyR) = event.physical_key {
                        self.process_ui_action(UiAction::ResetCamera);
                    }
                }
            }
            _ => {}
        }
        false
    }

    fn save_state(&mut self) -> Result<()> {
        self.state
            .remember(self.ui_state.prop, self.ui_state.build_options());
        self.state.save()
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
    ) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: config.width,
                height: config.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }
}

fn rgba([r, g, b]: [f32; 3]) -> [f32; 4] {
    [r, g, b, 1.0]
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_draw_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    texture: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(texture),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some("draw_bind_group"),
    })
}

/// Application wrapper for winit 0.30 ApplicationHandler
struct AppWrapper {
    app: Option<App>,
    startup: Option<Startup>,
}

impl ApplicationHandler for AppWrapper {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.app.is_some() {
            return;
        }
        let Some(startup) = self.startup.take() else {
            return;
        };

        let window_attrs = WindowAttributes::default()
            .with_title(CONFIG.window.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(
                CONFIG.window.width,
                CONFIG.window.height,
            ));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(App::new(window, startup)) {
            Ok(app) => {
                self.app = Some(app);
                info!("Viewer initialized");
            }
            Err(e) => {
                error!("Failed to initialize viewer: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(app) = &mut self.app else { return };

        let _egui_consumed = app.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                info!("Saving state and exiting...");
                if let Err(e) = app.save_state() {
                    warn!("Could not save state: {e:#}");
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => app.resize(size),
            WindowEvent::RedrawRequested => {
                app.update();
                if let Err(e) = app.render() {
                    match e {
                        wgpu::SurfaceError::Lost => app.resize(app.size),
                        wgpu::SurfaceError::OutOfMemory => event_loop.exit(),
                        _ => error!("Render error: {:?}", e),
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(app) = &self.app {
            app.window.request_redraw();
        }
    }
}

fn load_options(path: &Path) -> Result<BuildOptions> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read options file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid build options in {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let state = AppState::load();
    let prop = args.prop.unwrap_or(state.last_prop);
    let options = match &args.options {
        Some(path) => load_options(path)?,
        None => state.options_for(prop),
    };
    let particles = state.particles_for_launch(args.no_particles);

    info!("Starting Crafta Props viewer with {prop}...");
    info!("Controls:");
    info!("  Drag - Orbit camera");
    info!("  Scroll - Zoom");
    info!("  R - Reset camera");
    info!("  Menu button (top-left) - Toggle build panel");

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app_wrapper = AppWrapper {
        app: None,
        startup: Some(Startup {
            prop,
            options,
            particles,
            state,
        }),
    };
    event_loop
        .run_app(&mut app_wrapper)
        .context("Event loop error")?;
    Ok(())
}
