//! Scene rendering with stereo composition
//!
//! Every frame renders one image per eye into offscreen targets, then a
//! full-screen pass combines them into the surface according to the
//! [`StereoMode`]. Mono frames render the left eye only.

use crate::actor::{ActorDraw, TextureCoordActor};
use crate::buffers::{linear_color, MeshBuffers, MeshVertex};
use crate::device::GpuContext;
use crate::stereo::StereoMode;
use crate::texture3d::{GpuTexture, Texture3D, TextureOptions};
use bytemuck::{Pod, Zeroable};
use meshview_core::{Error, Matrix4, Point3f, Result, VolumeField};
use std::collections::HashMap;
use winit::dpi::PhysicalSize;

const MESH_SHADER: &str = include_str!("shaders/mesh.wgsl");
const COMPOSITE_SHADER: &str = include_str!("shaders/composite.wgsl");
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Per-eye camera uniform
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub view_pos: [f32; 4],
    pub light_dir: [f32; 4],
    pub viewport: [f32; 4],
}

impl CameraUniform {
    /// Uniform for `eye` with a headlight at the eye position
    pub fn new(eye: &EyeView, size: PhysicalSize<u32>) -> Self {
        let light = eye.position - eye.focal_point;
        Self {
            view_proj: (eye.projection * eye.view).into(),
            view_pos: [eye.position.x, eye.position.y, eye.position.z, 1.0],
            light_dir: [light.x, light.y, light.z, 0.0],
            viewport: [size.width.max(1) as f32, size.height.max(1) as f32, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct ItemUniform {
    point_size: f32,
    ambient: f32,
    diffuse: f32,
    _padding: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct VolumeUniform {
    max_texture_coordinates: [f32; 3],
    texture_scale: f32,
    components: u32,
    _padding: [u32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct CompositeUniform {
    mode: u32,
    anaglyph_saturation: f32,
    _padding: [f32; 2],
}

/// Renderer settings
#[derive(Debug, Clone)]
pub struct SceneRenderConfig {
    pub background: [f32; 3],
    /// Total angle between the eyes in degrees
    pub eye_angle: f32,
    pub ambient: f32,
    pub diffuse: f32,
    pub anaglyph_saturation: f32,
}

impl Default for SceneRenderConfig {
    fn default() -> Self {
        Self {
            background: [0.0, 0.0, 0.0],
            eye_angle: 2.0,
            ambient: 0.0,
            diffuse: 1.0,
            anaglyph_saturation: 0.65,
        }
    }
}

/// How polygons are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Representation {
    #[default]
    Surface,
    Wireframe,
}

/// Camera for one eye
#[derive(Debug, Clone, PartialEq)]
pub struct EyeView {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub position: Point3f,
    pub focal_point: Point3f,
}

/// Handle of an uploaded item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(usize);

/// One item to draw this frame
#[derive(Debug, Clone, Copy)]
pub struct DrawItem {
    pub id: ItemId,
    pub representation: Representation,
    /// Shade with the attached volume
    pub textured: bool,
}

/// Everything that varies per frame
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    pub left: EyeView,
    /// Present when stereo is on
    pub right: Option<EyeView>,
    pub mode: StereoMode,
    pub items: &'a [DrawItem],
}

struct IndexBuffer {
    buffer: wgpu::Buffer,
    count: u32,
}

struct GpuItem {
    vertices: Option<wgpu::Buffer>,
    triangles: Option<IndexBuffer>,
    lines: Option<IndexBuffer>,
    edges: Option<IndexBuffer>,
    points: Option<IndexBuffer>,
    uniform_bind_group: wgpu::BindGroup,
}

struct MeshPipelines {
    triangles: wgpu::RenderPipeline,
    lines: wgpu::RenderPipeline,
}

struct Layouts {
    camera: wgpu::BindGroupLayout,
    item: wgpu::BindGroupLayout,
    composite: wgpu::BindGroupLayout,
}

struct VolumeBinding {
    field: VolumeField,
    texture: Texture3D<GpuTexture>,
    actor: TextureCoordActor<wgpu::ShaderModule>,
    uniform: wgpu::Buffer,
    // Bind group and whether it was built for a filtering sampler
    bind_group: Option<(wgpu::BindGroup, bool)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VolumeDraw {
    Custom { filterable: bool },
    Default,
    Skip,
}

struct EyeTargets {
    left: wgpu::TextureView,
    right: wgpu::TextureView,
    depth: wgpu::TextureView,
    composite_bind_group: wgpu::BindGroup,
}

/// Draws meshes into a window surface
pub struct SceneRenderer {
    context: GpuContext,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    config: SceneRenderConfig,
    layouts: Layouts,
    default_pipelines: MeshPipelines,
    point_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    textured_pipelines: HashMap<bool, MeshPipelines>,
    camera_buffers: [wgpu::Buffer; 2],
    camera_bind_groups: [wgpu::BindGroup; 2],
    composite_buffer: wgpu::Buffer,
    eye_sampler: wgpu::Sampler,
    targets: EyeTargets,
    items: Vec<GpuItem>,
    volume: Option<VolumeBinding>,
}

impl SceneRenderer {
    /// Configure `surface` and build the pipelines
    pub fn new(
        context: GpuContext,
        surface: wgpu::Surface<'static>,
        size: PhysicalSize<u32>,
        config: SceneRenderConfig,
    ) -> Result<Self> {
        let surface_caps = surface.get_capabilities(&context.adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| Error::Gpu("surface reports no formats".to_string()))?;
        if !surface_format.is_srgb() {
            log::warn!("no sRGB surface format, colors will look darker ({:?})", surface_format);
        }

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&context.device, &surface_config);

        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let eye_texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let layouts = Layouts {
            camera: context.create_bind_group_layout("camera_bind_group_layout", &[uniform_entry(0)]),
            item: context.create_bind_group_layout("item_bind_group_layout", &[uniform_entry(0)]),
            composite: context.create_bind_group_layout(
                "composite_bind_group_layout",
                &[
                    eye_texture_entry(0),
                    eye_texture_entry(1),
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    uniform_entry(3),
                ],
            ),
        };

        let mesh_shader = context.create_shader_module("Mesh Shader", MESH_SHADER);
        let mesh_layout = context.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&layouts.camera, &layouts.item],
            push_constant_ranges: &[],
        });
        let default_pipelines = MeshPipelines {
            triangles: create_mesh_pipeline(
                &context.device,
                "Triangle Pipeline",
                &mesh_layout,
                &mesh_shader,
                "vs_main",
                wgpu::PrimitiveTopology::TriangleList,
                surface_format,
            ),
            lines: create_mesh_pipeline(
                &context.device,
                "Line Pipeline",
                &mesh_layout,
                &mesh_shader,
                "vs_main",
                wgpu::PrimitiveTopology::LineList,
                surface_format,
            ),
        };
        let point_pipeline = create_mesh_pipeline(
            &context.device,
            "Point Pipeline",
            &mesh_layout,
            &mesh_shader,
            "vs_point",
            wgpu::PrimitiveTopology::TriangleList,
            surface_format,
        );

        let composite_shader = context.create_shader_module("Composite Shader", COMPOSITE_SHADER);
        let composite_layout = context.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Composite Pipeline Layout"),
            bind_group_layouts: &[&layouts.composite],
            push_constant_ranges: &[],
        });
        let composite_pipeline = context.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Composite Pipeline"),
            layout: Some(&composite_layout),
            vertex: wgpu::VertexState {
                module: &composite_shader,
                entry_point: "vs_main",
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &composite_shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let camera = CameraUniform::zeroed();
        let camera_buffers = [0usize, 1].map(|eye| {
            context.create_buffer_init(
                if eye == 0 { "Left Camera Buffer" } else { "Right Camera Buffer" },
                &[camera],
                wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            )
        });
        let camera_bind_groups = [0usize, 1].map(|eye| {
            context.create_bind_group(
                "camera_bind_group",
                &layouts.camera,
                &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffers[eye].as_entire_binding(),
                }],
            )
        });
        let composite_buffer = context.create_buffer_init(
            "Composite Buffer",
            &[CompositeUniform::zeroed()],
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let eye_sampler = context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("eye sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let targets = create_eye_targets(
            &context,
            &surface_config,
            &layouts.composite,
            &eye_sampler,
            &composite_buffer,
        );

        log::info!(
            "scene renderer ready: {}x{} {:?}",
            surface_config.width,
            surface_config.height,
            surface_format
        );

        Ok(Self {
            context,
            surface,
            surface_config,
            config,
            layouts,
            default_pipelines,
            point_pipeline,
            composite_pipeline,
            textured_pipelines: HashMap::new(),
            camera_buffers,
            camera_bind_groups,
            composite_buffer,
            eye_sampler,
            targets,
            items: Vec::new(),
            volume: None,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn config(&self) -> &SceneRenderConfig {
        &self.config
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.surface_config.width, self.surface_config.height)
    }

    /// Number of uploaded items
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Upload an item's buffers; they are never rewritten
    pub fn add_item(&mut self, buffers: &MeshBuffers, point_size: f32) -> ItemId {
        let device = &self.context;
        let vertices = (!buffers.vertices.is_empty())
            .then(|| device.create_buffer_init("Item Vertex Buffer", &buffers.vertices, wgpu::BufferUsages::VERTEX));
        let index = |label: &str, indices: &[u32]| {
            (!indices.is_empty()).then(|| IndexBuffer {
                buffer: device.create_buffer_init(label, indices, wgpu::BufferUsages::INDEX),
                count: indices.len() as u32,
            })
        };
        let points = (!buffers.points.is_empty()).then(|| IndexBuffer {
            buffer: device.create_buffer_init("Item Point Buffer", &buffers.points, wgpu::BufferUsages::VERTEX),
            count: buffers.points.len() as u32,
        });

        let uniform = device.create_buffer_init(
            "Item Uniform Buffer",
            &[ItemUniform {
                point_size,
                ambient: self.config.ambient,
                diffuse: self.config.diffuse,
                _padding: 0.0,
            }],
            wgpu::BufferUsages::UNIFORM,
        );
        let uniform_bind_group = device.create_bind_group(
            "item_bind_group",
            &self.layouts.item,
            &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
        );

        let item = GpuItem {
            vertices,
            triangles: index("Item Triangle Buffer", &buffers.triangles),
            lines: index("Item Line Buffer", &buffers.lines),
            edges: index("Item Edge Buffer", &buffers.edges),
            points,
            uniform_bind_group,
        };
        self.items.push(item);
        log::debug!(
            "uploaded item {} ({} vertices, {} triangles)",
            self.items.len() - 1,
            buffers.vertices.len(),
            buffers.triangles.len() / 3
        );
        ItemId(self.items.len() - 1)
    }

    /// Attach the volume that textured items sample
    pub fn set_volume(
        &mut self,
        field: VolumeField,
        options: TextureOptions,
        actor: TextureCoordActor<wgpu::ShaderModule>,
    ) {
        if let Some(mut old) = self.volume.take() {
            old.texture.release(&mut self.context);
        }
        let uniform = self.context.create_buffer_init(
            "Volume Uniform Buffer",
            &[VolumeUniform::zeroed()],
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        self.volume = Some(VolumeBinding {
            field,
            texture: Texture3D::new(options),
            actor,
            uniform,
            bind_group: None,
        });
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.surface_config.width = size.width;
        self.surface_config.height = size.height;
        self.surface.configure(&self.context.device, &self.surface_config);
        self.targets = create_eye_targets(
            &self.context,
            &self.surface_config,
            &self.layouts.composite,
            &self.eye_sampler,
            &self.composite_buffer,
        );
    }

    /// Render and present one frame
    pub fn render(&mut self, frame: &Frame<'_>) -> Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.context.device, &self.surface_config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("surface timed out, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(Error::Gpu(format!("Failed to get surface texture: {:?}", e))),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let volume_draw = if frame.items.iter().any(|item| item.textured) {
            self.prepare_volume()
        } else {
            VolumeDraw::Default
        };

        let size = self.size();
        let right = frame.right.as_ref().filter(|_| frame.mode.uses_right_eye());
        let queue = &self.context.queue;
        queue.write_buffer(&self.camera_buffers[0], 0, bytemuck::bytes_of(&CameraUniform::new(&frame.left, size)));
        if let Some(eye) = right {
            queue.write_buffer(&self.camera_buffers[1], 0, bytemuck::bytes_of(&CameraUniform::new(eye, size)));
        }
        let composite = CompositeUniform {
            mode: if frame.right.is_some() { frame.mode.composite_mode() } else { 0 },
            anaglyph_saturation: self.config.anaglyph_saturation,
            _padding: [0.0; 2],
        };
        queue.write_buffer(&self.composite_buffer, 0, bytemuck::bytes_of(&composite));

        let mut encoder = self.context.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Scene Render Encoder"),
        });
        self.draw_eye(&mut encoder, &self.targets.left, 0, frame.items, volume_draw);
        if right.is_some() {
            self.draw_eye(&mut encoder, &self.targets.right, 1, frame.items, volume_draw);
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Composite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(&self.composite_pipeline);
            render_pass.set_bind_group(0, &self.targets.composite_bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        if let Some(volume) = self.volume.as_mut() {
            volume.texture.unbind();
        }
        Ok(())
    }

    /// Upload or refresh the volume texture and pick the textured program
    fn prepare_volume(&mut self) -> VolumeDraw {
        let Some(volume) = self.volume.as_mut() else {
            return VolumeDraw::Default;
        };
        let context = &mut self.context;

        let stale = volume.texture.needs_upload(context.id, &volume.field, None);
        if volume.texture.bind(context, &volume.field, None).is_none() {
            // Unusable texture: draw without it
            return VolumeDraw::Default;
        }
        let filterable = volume
            .texture
            .format()
            .map(|f| !f.is_full_precision() || context.device.features().contains(wgpu::Features::FLOAT32_FILTERABLE))
            .unwrap_or(true);

        let rebuild = match &volume.bind_group {
            Some((_, built_filterable)) => stale || *built_filterable != filterable,
            None => true,
        };
        if rebuild {
            if let Some(gpu_texture) = volume.texture.handle() {
                let layout = volume_layout(context, filterable);
                let bind_group = context.create_bind_group(
                    "volume_bind_group",
                    &layout,
                    &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&gpu_texture.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&gpu_texture.sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: volume.uniform.as_entire_binding(),
                        },
                    ],
                );
                volume.bind_group = Some((bind_group, filterable));
            }
        }

        let max_texture_coordinates = volume.texture.max_texture_coordinates();
        let components = volume.texture.components() as u32;
        match volume.actor.prepare(context) {
            ActorDraw::Custom { program, scale } => {
                let uniform = VolumeUniform {
                    max_texture_coordinates,
                    texture_scale: scale,
                    components,
                    _padding: [0; 3],
                };
                context.queue.write_buffer(&volume.uniform, 0, bytemuck::bytes_of(&uniform));

                if !self.textured_pipelines.contains_key(&filterable) {
                    let pipelines = create_textured_pipelines(
                        context,
                        &self.layouts,
                        program,
                        filterable,
                        self.surface_config.format,
                    );
                    self.textured_pipelines.insert(filterable, pipelines);
                }
                VolumeDraw::Custom { filterable }
            }
            ActorDraw::Default => VolumeDraw::Default,
            ActorDraw::Skip => VolumeDraw::Skip,
        }
    }

    fn draw_eye(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        eye: usize,
        items: &[DrawItem],
        volume_draw: VolumeDraw,
    ) {
        let [r, g, b] = linear_color(self.config.background);
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(if eye == 0 { "Left Eye Pass" } else { "Right Eye Pass" }),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: r as f64,
                        g: g as f64,
                        b: b as f64,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_bind_group(0, &self.camera_bind_groups[eye], &[]);

        let volume_group = self
            .volume
            .as_ref()
            .and_then(|v| v.bind_group.as_ref())
            .map(|(group, _)| group);

        for draw in items {
            let Some(item) = self.items.get(draw.id.0) else {
                continue;
            };
            let pipelines = match (draw.textured, volume_draw, volume_group) {
                (true, VolumeDraw::Skip, _) => continue,
                (true, VolumeDraw::Custom { filterable }, Some(group)) => {
                    match self.textured_pipelines.get(&filterable) {
                        Some(pipelines) => {
                            render_pass.set_bind_group(2, group, &[]);
                            pipelines
                        }
                        None => &self.default_pipelines,
                    }
                }
                _ => &self.default_pipelines,
            };
            render_pass.set_bind_group(1, &item.uniform_bind_group, &[]);

            if let Some(vertices) = &item.vertices {
                render_pass.set_vertex_buffer(0, vertices.slice(..));
                let polygons = match draw.representation {
                    Representation::Surface => item.triangles.as_ref().map(|t| (&pipelines.triangles, t)),
                    Representation::Wireframe => item.edges.as_ref().map(|e| (&pipelines.lines, e)),
                };
                let lines = item.lines.as_ref().map(|l| (&pipelines.lines, l));
                for (pipeline, indices) in polygons.into_iter().chain(lines) {
                    render_pass.set_pipeline(pipeline);
                    render_pass.set_index_buffer(indices.buffer.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..indices.count, 0, 0..1);
                }
            }
            if let Some(points) = &item.points {
                render_pass.set_pipeline(&self.point_pipeline);
                render_pass.set_vertex_buffer(0, points.buffer.slice(..));
                render_pass.draw(0..6, 0..points.count);
            }
        }
    }
}

fn volume_layout(context: &GpuContext, filterable: bool) -> wgpu::BindGroupLayout {
    let sampler = if filterable {
        wgpu::SamplerBindingType::Filtering
    } else {
        wgpu::SamplerBindingType::NonFiltering
    };
    context.create_bind_group_layout(
        "volume_bind_group_layout",
        &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable },
                    view_dimension: wgpu::TextureViewDimension::D3,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(sampler),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    )
}

fn create_textured_pipelines(
    context: &GpuContext,
    layouts: &Layouts,
    program: &wgpu::ShaderModule,
    filterable: bool,
    format: wgpu::TextureFormat,
) -> MeshPipelines {
    let volume = volume_layout(context, filterable);
    let layout = context.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Textured Pipeline Layout"),
        bind_group_layouts: &[&layouts.camera, &layouts.item, &volume],
        push_constant_ranges: &[],
    });
    MeshPipelines {
        triangles: create_mesh_pipeline(
            &context.device,
            "Textured Triangle Pipeline",
            &layout,
            program,
            "vs_main",
            wgpu::PrimitiveTopology::TriangleList,
            format,
        ),
        lines: create_mesh_pipeline(
            &context.device,
            "Textured Line Pipeline",
            &layout,
            program,
            "vs_main",
            wgpu::PrimitiveTopology::LineList,
            format,
        ),
    }
}

fn create_mesh_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    vertex_entry: &str,
    topology: wgpu::PrimitiveTopology,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    // Point sprites expand one instance into a quad
    let step_mode = if vertex_entry == "vs_point" {
        wgpu::VertexStepMode::Instance
    } else {
        wgpu::VertexStepMode::Vertex
    };
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: vertex_entry,
            buffers: &[MeshVertex::desc(step_mode)],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

fn create_eye_targets(
    context: &GpuContext,
    surface_config: &wgpu::SurfaceConfiguration,
    composite_layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    composite_buffer: &wgpu::Buffer,
) -> EyeTargets {
    let size = wgpu::Extent3d {
        width: surface_config.width.max(1),
        height: surface_config.height.max(1),
        depth_or_array_layers: 1,
    };
    let target = |label: &str, format: wgpu::TextureFormat, usage: wgpu::TextureUsages| {
        context
            .device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    };
    let color_usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    let left = target("Left Eye Texture", surface_config.format, color_usage);
    let right = target("Right Eye Texture", surface_config.format, color_usage);
    let depth = target("Depth Texture", DEPTH_FORMAT, wgpu::TextureUsages::RENDER_ATTACHMENT);

    let composite_bind_group = context.create_bind_group(
        "composite_bind_group",
        composite_layout,
        &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&left),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&right),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: composite_buffer.as_entire_binding(),
            },
        ],
    );
    EyeTargets {
        left,
        right,
        depth,
        composite_bind_group,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::Vector3f;

    #[test]
    fn test_uniform_layouts_match_shaders() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 112);
        assert_eq!(std::mem::size_of::<ItemUniform>(), 16);
        assert_eq!(std::mem::size_of::<VolumeUniform>(), 32);
        assert_eq!(std::mem::size_of::<CompositeUniform>(), 16);
    }

    #[test]
    fn test_camera_uniform_headlight() {
        let eye = EyeView {
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
            position: Point3f::new(0.0, 0.0, 5.0),
            focal_point: Point3f::origin(),
        };
        let uniform = CameraUniform::new(&eye, PhysicalSize::new(640, 0));
        assert_eq!(uniform.light_dir, [0.0, 0.0, 5.0, 0.0]);
        assert_eq!(uniform.viewport[..2], [640.0, 1.0]);
        assert_eq!(Vector3f::new(uniform.view_pos[0], uniform.view_pos[1], uniform.view_pos[2]).z, 5.0);
    }

    #[test]
    fn test_default_config_uses_two_degree_separation() {
        let config = SceneRenderConfig::default();
        assert_eq!(config.eye_angle, 2.0);
        assert_eq!(Representation::default(), Representation::Surface);
    }
}
