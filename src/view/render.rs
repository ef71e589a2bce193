use wgpu::*;
use wgpu::util::DeviceExt;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, ViewerError};
use crate::model::{PerspectiveCamera, Scene};
use crate::utils::{hex_to_rgba, MeshBuffer, Vertex};
use crate::view::gpu_init::GpuContext;
use crate::view::surface::{scaled_size, DrawableSurface};

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// What the viewer needs from a renderer bound to a drawable surface.
pub trait RenderTarget {
    /// Size the surface is displayed at
    fn display_size(&self) -> (u32, u32);
    /// Size of the render buffer in physical pixels
    fn buffer_size(&self) -> (u32, u32);
    fn pixel_ratio(&self) -> f64;
    fn set_pixel_ratio(&mut self, ratio: f64);
    /// Buffer size matching the current display size
    fn buffer_target(&self) -> (u32, u32) {
        let (width, height) = self.display_size();
        scaled_size(width, height, self.pixel_ratio())
    }
    /// Resize the render buffer to `width`x`height` display pixels times the
    /// pixel ratio; `update_style` also changes the displayed size.
    fn set_size(&mut self, width: u32, height: u32, update_style: bool);
    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<()>;
    fn dispose(&mut self) {}
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub ambient: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniform {
    pub transform: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub lit: [f32; 4],
}

pub struct CameraResources {
    pub camera_buffer: Buffer,
    pub bind_group_layout: BindGroupLayout,
    pub camera_bind_group: BindGroup,
}

/// Uploaded scene mesh
pub struct GpuMesh {
    pub mesh: MeshBuffer,
    pub model_buffer: Buffer,
    pub model_bind_group: BindGroup,
}

pub fn create_depth_texture(device: &Device, width: u32, height: u32) -> (Texture, TextureView) {
    let depth_texture = device.create_texture(&TextureDescriptor {
        label: Some("depth_texture"),
        size: Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&TextureViewDescriptor::default());
    (depth_texture, depth_view)
}

fn uniform_layout_entry(visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding: 0,
        visibility,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub fn create_camera_resources(device: &Device) -> CameraResources {
    let camera_buffer = device.create_buffer(&BufferDescriptor {
        label: Some("camera_buffer"),
        size: std::mem::size_of::<CameraUniform>() as BufferAddress,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("camera_bind_group_layout"),
        entries: &[uniform_layout_entry(ShaderStages::VERTEX_FRAGMENT)],
    });

    let camera_bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some("camera_bind_group"),
        layout: &bind_group_layout,
        entries: &[BindGroupEntry { binding: 0, resource: camera_buffer.as_entire_binding() }],
    });

    CameraResources { camera_buffer, bind_group_layout, camera_bind_group }
}

pub fn create_model_layout(device: &Device) -> BindGroupLayout {
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("model_bind_group_layout"),
        entries: &[uniform_layout_entry(ShaderStages::VERTEX_FRAGMENT)],
    })
}

pub fn create_scene_pipeline(
    device: &Device,
    format: TextureFormat,
    camera_layout: &BindGroupLayout,
    model_layout: &BindGroupLayout,
) -> RenderPipeline {
    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("scene_shader"),
        source: ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("scene_pipeline_layout"),
        bind_group_layouts: &[camera_layout, model_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("scene_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState { format, blend: Some(BlendState::REPLACE), write_mask: ColorWrites::ALL })],
            compilation_options: Default::default(),
        }),
        primitive: PrimitiveState {
            topology: PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: FrontFace::Ccw,
            cull_mode: Some(Face::Back),
            polygon_mode: PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
        multiview: None,
        cache: None,
    })
}

///////////////////////////////////////////////////////////////////////////////

/// wgpu renderer bound to one drawable surface
pub struct WgpuRenderer<S: DrawableSurface> {
    pub surface_host: S,
    gpu: GpuContext,
    pixel_ratio: f64,

    pipeline: RenderPipeline,
    camera: CameraResources,
    model_layout: BindGroupLayout,
    depth: (Texture, TextureView),

    meshes: Vec<GpuMesh>,
    /// Scene revision the mesh list was built from
    uploaded_revision: Option<u64>,
}

impl<S: DrawableSurface> WgpuRenderer<S> {
    pub fn new(surface_host: S, gpu: GpuContext) -> Self {
        let device = gpu.device.as_ref();
        let camera = create_camera_resources(device);
        let model_layout = create_model_layout(device);
        let pipeline = create_scene_pipeline(device, gpu.format, &camera.bind_group_layout, &model_layout);
        let depth = create_depth_texture(device, gpu.config.width, gpu.config.height);

        info!(
            format = ?gpu.format,
            width = gpu.config.width,
            height = gpu.config.height,
            "renderer created"
        );

        Self {
            surface_host,
            gpu,
            pixel_ratio: 1.0,
            pipeline,
            camera,
            model_layout,
            depth,
            meshes: Vec::new(),
            uploaded_revision: None,
        }
    }

    fn sync_scene(&mut self, scene: &Scene) {
        if self.uploaded_revision == Some(scene.revision()) {
            return;
        }
        let device = self.gpu.device.as_ref();
        for old in self.meshes.drain(..) {
            old.mesh.vertex_buffer.destroy();
            old.mesh.index_buffer.destroy();
            old.model_buffer.destroy();
        }

        for node in scene.meshes().filter(|m| !m.geometry.is_empty()) {
            let material = node.material;
            let uniform = ModelUniform {
                transform: node.transform.matrix().to_cols_array_2d(),
                color: hex_to_rgba(material.color()),
                lit: [if material.is_lit() { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
            };
            let model_buffer = device.create_buffer_init(&util::BufferInitDescriptor {
                label: Some("model_uniform"),
                contents: bytemuck::bytes_of(&uniform),
                usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            });
            let model_bind_group = device.create_bind_group(&BindGroupDescriptor {
                label: Some("model_bind_group"),
                layout: &self.model_layout,
                entries: &[BindGroupEntry { binding: 0, resource: model_buffer.as_entire_binding() }],
            });
            self.meshes.push(GpuMesh {
                mesh: node.geometry.upload(device),
                model_buffer,
                model_bind_group,
            });
        }

        debug!(revision = scene.revision(), meshes = self.meshes.len(), "scene uploaded");
        self.uploaded_revision = Some(scene.revision());
    }

    fn acquire_frame(&mut self) -> Result<Option<SurfaceTexture>> {
        match self.gpu.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                debug!("surface lost, reconfiguring");
                self.gpu.reconfigure();
                Ok(None)
            }
            Err(SurfaceError::Timeout) => {
                trace!("surface timeout, skipping frame");
                Ok(None)
            }
            Err(SurfaceError::OutOfMemory) => Err(ViewerError::Surface(SurfaceError::OutOfMemory)),
            Err(e) => {
                warn!(error = %e, "surface error, skipping frame");
                Ok(None)
            }
        }
    }
}

impl<S: DrawableSurface> RenderTarget for WgpuRenderer<S> {
    fn display_size(&self) -> (u32, u32) {
        self.surface_host.display_size()
    }

    fn buffer_size(&self) -> (u32, u32) {
        (self.gpu.config.width, self.gpu.config.height)
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.pixel_ratio = ratio;
    }

    fn buffer_target(&self) -> (u32, u32) {
        let (width, height) = self.surface_host.display_size();
        self.surface_host.buffer_size_for(width, height, self.pixel_ratio)
    }

    fn set_size(&mut self, width: u32, height: u32, update_style: bool) {
        let (bw, bh) = self.surface_host.buffer_size_for(width, height, self.pixel_ratio);
        let (bw, bh) = (bw.max(1), bh.max(1));

        self.surface_host.set_buffer_size(bw, bh);
        if update_style {
            self.surface_host.set_display_size(width, height);
        }

        self.gpu.resize(bw, bh);
        let old = std::mem::replace(&mut self.depth, create_depth_texture(self.gpu.device.as_ref(), bw, bh));
        old.0.destroy();
        debug!(width, height, buffer_width = bw, buffer_height = bh, "render buffer resized");
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<()> {
        self.sync_scene(scene);

        let [r, g, b] = scene.ambient();
        let uniform = CameraUniform {
            view_proj: camera.view_proj().to_cols_array_2d(),
            ambient: [r, g, b, 1.0],
        };
        self.gpu.queue.write_buffer(&self.camera.camera_buffer, 0, bytemuck::bytes_of(&uniform));

        let Some(frame) = self.acquire_frame()? else {
            return Ok(());
        };

        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = self.gpu.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("encoder"),
        });

        let bg = hex_to_rgba(scene.background);
        {
            let mut rp = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("render_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color {
                            r: bg[0] as f64,
                            g: bg[1] as f64,
                            b: bg[2] as f64,
                            a: 1.0,
                        }),
                        store: StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &self.depth.1,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rp.set_pipeline(&self.pipeline);
            rp.set_bind_group(0, &self.camera.camera_bind_group, &[]);

            for gpu_mesh in &self.meshes {
                rp.set_bind_group(1, &gpu_mesh.model_bind_group, &[]);
                rp.set_vertex_buffer(0, gpu_mesh.mesh.vertex_buffer.slice(..));
                rp.set_index_buffer(gpu_mesh.mesh.index_buffer.slice(..), IndexFormat::Uint32);
                rp.draw_indexed(0..gpu_mesh.mesh.index_count, 0, 0..1);
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn dispose(&mut self) {
        for gpu_mesh in self.meshes.drain(..) {
            gpu_mesh.mesh.vertex_buffer.destroy();
            gpu_mesh.mesh.index_buffer.destroy();
            gpu_mesh.model_buffer.destroy();
        }
        self.camera.camera_buffer.destroy();
        self.depth.0.destroy();
        self.uploaded_revision = None;
        info!("renderer disposed");
    }
}
