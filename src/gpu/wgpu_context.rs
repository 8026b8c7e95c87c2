// SPDX-License-Identifier: GPL-3.0-only

//! Headless wgpu implementation of [`GpuContext`]
//!
//! Textures, framebuffers, and programs live in handle-indexed tables; the
//! logical-key table gives handle values that are stable across texture
//! recreation (see the module docs in [`crate::gpu`]). The display target is
//! an offscreen RGBA8 texture resized by surface-changed events, since OS
//! windowing sits outside the pipeline core.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::device::create_render_device;
use super::{
    DrawPass, FramebufferHandle, GpuContext, GpuError, GpuResult, ProgramHandle, TextureFilter,
    TextureHandle, TextureKey,
};
use crate::backends::camera::CameraFrame;
use crate::constants::{DEFAULT_DISPLAY_HEIGHT, DEFAULT_DISPLAY_WIDTH};

/// Vertex for the full-bounds quad
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct QuadVertex {
    position: [f32; 2],
    tex_coord: [f32; 2],
}

/// Triangle-strip quad covering clip space, texture coordinates flipped
/// vertically so row 0 of the source lands at the top of the target
const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, -1.0],
        tex_coord: [0.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, 1.0],
        tex_coord: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        tex_coord: [1.0, 1.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        tex_coord: [1.0, 0.0],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextureKind {
    /// Camera stream import target; sized lazily on first import
    External,
    /// Ordinary RGBA8 render/sample texture
    TwoDim,
}

struct TextureEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    kind: TextureKind,
    filter: TextureFilter,
    size: (u32, u32),
}

/// Headless wgpu GPU context
pub struct WgpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,

    sampler_nearest: wgpu::Sampler,
    sampler_linear: wgpu::Sampler,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    quad_vertices: wgpu::Buffer,

    /// Logical key -> handle value; survives texture deletion so recreation
    /// under the same key reuses the value
    key_table: HashMap<TextureKey, TextureHandle>,
    textures: HashMap<TextureHandle, TextureEntry>,
    framebuffers: HashMap<FramebufferHandle, TextureHandle>,
    programs: HashMap<ProgramHandle, wgpu::RenderPipeline>,

    next_texture: u64,
    next_framebuffer: u64,
    next_program: u64,

    display: wgpu::Texture,
    display_view: wgpu::TextureView,
    display_size: (u32, u32),

    /// Device errors captured outside explicit error scopes; drained by
    /// `poll_errors` and escalated as fatal
    device_errors: Arc<Mutex<Vec<String>>>,
}

impl WgpuContext {
    /// Create a context on the system's best adapter (blocking)
    pub fn new() -> GpuResult<Self> {
        let (device, queue, info) = pollster::block_on(create_render_device("hdr-preview"))?;
        info!(adapter = %info.adapter_name, backend = ?info.backend, "GPU context ready");
        Ok(Self::with_device(device, queue))
    }

    /// Create a context over an existing device/queue pair
    pub fn with_device(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let device_errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&device_errors);
        device.on_uncaptured_error(Box::new(move |error| {
            sink.lock().unwrap().push(error.to_string());
        }));

        let sampler_nearest = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("camera_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let sampler_linear = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("offscreen_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quad_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quad_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let quad_vertices = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("quad_vertex_buffer"),
            size: std::mem::size_of_val(&QUAD_VERTICES) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&quad_vertices, 0, bytemuck::cast_slice(&QUAD_VERTICES));

        let display_size = (DEFAULT_DISPLAY_WIDTH, DEFAULT_DISPLAY_HEIGHT);
        let (display, display_view) = Self::make_display(&device, display_size);

        Self {
            device,
            queue,
            sampler_nearest,
            sampler_linear,
            bind_group_layout,
            pipeline_layout,
            quad_vertices,
            key_table: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            next_texture: 1,
            next_framebuffer: 1,
            next_program: 1,
            display,
            display_view,
            display_size,
            device_errors,
        }
    }

    fn make_display(device: &wgpu::Device, size: (u32, u32)) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("display_target"),
            size: wgpu::Extent3d {
                width: size.0.max(1),
                height: size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    fn make_texture(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    /// Handle value for `key`: reused if the key was ever allocated before
    fn handle_for_key(&mut self, key: TextureKey) -> TextureHandle {
        if let Some(handle) = self.key_table.get(&key) {
            return *handle;
        }
        let handle = TextureHandle::from_raw(self.next_texture);
        self.next_texture += 1;
        self.key_table.insert(key, handle);
        handle
    }

    fn compile_stage(&self, stage: &str, label: &str, source: &str) -> GpuResult<wgpu::ShaderModule> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(GpuError::ShaderCompile {
                stage: stage.to_string(),
                log: error.to_string(),
            });
        }
        Ok(module)
    }
}

impl GpuContext for WgpuContext {
    fn create_external_texture(&mut self, key: TextureKey) -> GpuResult<TextureHandle> {
        let handle = self.handle_for_key(key);
        // Sized lazily: the device decides the stream format/size, which is
        // only known once the first frame is imported.
        let (texture, view) = Self::make_texture(&self.device, &key.to_string(), 1, 1);
        self.textures.insert(
            handle,
            TextureEntry {
                texture,
                view,
                kind: TextureKind::External,
                filter: TextureFilter::Nearest,
                size: (1, 1),
            },
        );
        debug!(key = %key, texture = %handle, "External texture created");
        Ok(handle)
    }

    fn create_texture_2d(
        &mut self,
        key: TextureKey,
        width: u32,
        height: u32,
        filter: TextureFilter,
    ) -> GpuResult<TextureHandle> {
        let handle = self.handle_for_key(key);
        let (texture, view) = Self::make_texture(&self.device, &key.to_string(), width, height);
        self.textures.insert(
            handle,
            TextureEntry {
                texture,
                view,
                kind: TextureKind::TwoDim,
                filter,
                size: (width, height),
            },
        );
        debug!(key = %key, texture = %handle, width, height, "2D texture created");
        Ok(handle)
    }

    fn create_framebuffer(&mut self, color: TextureHandle) -> GpuResult<FramebufferHandle> {
        let handle = FramebufferHandle::from_raw(self.next_framebuffer);
        self.next_framebuffer += 1;

        match self.textures.get(&color) {
            Some(entry) if entry.kind == TextureKind::TwoDim => {}
            Some(_) => {
                // Incomplete but tolerated: draws to it are dropped later.
                warn!(
                    texture = %color,
                    "Framebuffer color attachment is not renderable"
                );
            }
            None => return Err(GpuError::InvalidHandle(color.to_string())),
        }

        self.framebuffers.insert(handle, color);
        Ok(handle)
    }

    fn delete_texture(&mut self, texture: TextureHandle) -> GpuResult<()> {
        match self.textures.remove(&texture) {
            Some(entry) => {
                entry.texture.destroy();
                Ok(())
            }
            None => Err(GpuError::InvalidHandle(texture.to_string())),
        }
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) -> GpuResult<()> {
        match self.framebuffers.remove(&framebuffer) {
            Some(_) => Ok(()),
            None => Err(GpuError::InvalidHandle(framebuffer.to_string())),
        }
    }

    fn resolve(&self, key: TextureKey) -> Option<TextureHandle> {
        self.key_table.get(&key).copied()
    }

    fn compile_program(
        &mut self,
        label: &str,
        vertex_src: &str,
        fragment_src: &str,
    ) -> GpuResult<ProgramHandle> {
        let vertex = self.compile_stage("vertex", label, vertex_src)?;
        let fragment = self.compile_stage("fragment", label, fragment_src)?;

        // Link status is checked deliberately; see GpuError::ShaderLink.
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<QuadVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(GpuError::ShaderLink(error.to_string()));
        }

        let handle = ProgramHandle::from_raw(self.next_program);
        self.next_program += 1;
        self.programs.insert(handle, pipeline);
        debug!(label = label, program = %handle, "Shader program linked");
        Ok(handle)
    }

    fn delete_program(&mut self, program: ProgramHandle) -> GpuResult<()> {
        match self.programs.remove(&program) {
            Some(_) => Ok(()),
            None => Err(GpuError::InvalidHandle(program.to_string())),
        }
    }

    fn import_camera_frame(
        &mut self,
        texture: TextureHandle,
        frame: &CameraFrame,
    ) -> GpuResult<()> {
        let entry = self
            .textures
            .get_mut(&texture)
            .ok_or_else(|| GpuError::InvalidHandle(texture.to_string()))?;

        let expected = (frame.width as usize) * (frame.height as usize) * 4;
        if frame.data.len() != expected {
            return Err(GpuError::Import(format!(
                "frame payload is {} bytes, expected {}",
                frame.data.len(),
                expected
            )));
        }

        if entry.size != (frame.width, frame.height) {
            // Stream dimensions changed; rebuild the texture behind the same
            // handle value.
            debug!(
                texture = %texture,
                width = frame.width,
                height = frame.height,
                "Resizing external texture for new stream dimensions"
            );
            let (tex, view) =
                Self::make_texture(&self.device, "camera-input", frame.width, frame.height);
            entry.texture.destroy();
            entry.texture = tex;
            entry.view = view;
            entry.size = (frame.width, frame.height);
        }

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(frame.width * 4),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn set_display_size(&mut self, width: u32, height: u32) {
        if self.display_size == (width, height) {
            return;
        }
        debug!(width, height, "Resizing display target");
        let (display, view) = Self::make_display(&self.device, (width, height));
        self.display.destroy();
        self.display = display;
        self.display_view = view;
        self.display_size = (width, height);
    }

    fn display_size(&self) -> (u32, u32) {
        self.display_size
    }

    fn draw_quad(&mut self, pass: &DrawPass) -> GpuResult<()> {
        if !pass.program.is_valid() {
            // Degraded output: a failed program draws nothing.
            debug!("Skipping draw with invalid program");
            return Ok(());
        }
        let pipeline = self
            .programs
            .get(&pass.program)
            .ok_or_else(|| GpuError::InvalidHandle(pass.program.to_string()))?;
        let source = self
            .textures
            .get(&pass.source)
            .ok_or_else(|| GpuError::InvalidHandle(pass.source.to_string()))?;

        let (target_view, target_size) = match pass.target {
            Some(fb) => {
                let color = self
                    .framebuffers
                    .get(&fb)
                    .ok_or_else(|| GpuError::InvalidHandle(fb.to_string()))?;
                match self.textures.get(color) {
                    Some(entry) if entry.kind == TextureKind::TwoDim => {
                        (&entry.view, entry.size)
                    }
                    _ => {
                        warn!(framebuffer = %fb, "Skipping draw to incomplete framebuffer");
                        return Ok(());
                    }
                }
            }
            None => (&self.display_view, self.display_size),
        };

        let sampler = match source.filter {
            TextureFilter::Nearest => &self.sampler_nearest,
            TextureFilter::Linear => &self.sampler_linear,
        };
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quad_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("quad_encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quad_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: if pass.clear {
                            wgpu::LoadOp::Clear(wgpu::Color::BLACK)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            let vw = pass.viewport.0.min(target_size.0).max(1) as f32;
            let vh = pass.viewport.1.min(target_size.1).max(1) as f32;
            rpass.set_viewport(0.0, 0.0, vw, vh, 0.0, 1.0);
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.set_vertex_buffer(0, self.quad_vertices.slice(..));
            rpass.draw(0..4, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn copy_texture(&mut self, src: TextureHandle, dst: TextureHandle) -> GpuResult<()> {
        if src == dst {
            return Ok(());
        }
        let src_entry = self
            .textures
            .get(&src)
            .ok_or_else(|| GpuError::InvalidHandle(src.to_string()))?;
        let dst_entry = self
            .textures
            .get(&dst)
            .ok_or_else(|| GpuError::InvalidHandle(dst.to_string()))?;
        if src_entry.size != dst_entry.size {
            return Err(GpuError::Import(format!(
                "copy size mismatch: {}x{} vs {}x{}",
                src_entry.size.0, src_entry.size.1, dst_entry.size.0, dst_entry.size.1
            )));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("copy_encoder"),
            });
        encoder.copy_texture_to_texture(
            wgpu::ImageCopyTexture {
                texture: &src_entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyTexture {
                texture: &dst_entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: src_entry.size.0,
                height: src_entry.size.1,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn finish(&mut self) -> GpuResult<()> {
        let _ = self.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    fn flush(&mut self) {
        self.queue.submit(std::iter::empty());
    }

    fn poll_errors(&mut self) -> GpuResult<()> {
        let mut errors = self.device_errors.lock().unwrap();
        if errors.is_empty() {
            return Ok(());
        }
        let joined = errors.join("; ");
        errors.clear();
        Err(GpuError::Fatal(joined))
    }

    fn read_display(&mut self) -> GpuResult<Vec<u8>> {
        let (width, height) = self.display_size;
        let unpadded_bytes_per_row = width * 4;
        // COPY_DST rows must be 256-byte aligned
        let padded_bytes_per_row = (unpadded_bytes_per_row + 255) & !255;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("display_readback"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.display,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);

        pollster::block_on(receiver)
            .map_err(|_| GpuError::Fatal("readback channel dropped".into()))?
            .map_err(|e| GpuError::Fatal(format!("buffer map failed: {:?}", e)))?;

        let padded = slice.get_mapped_range().to_vec();
        staging.unmap();

        // Strip row padding
        let mut data = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in 0..height as usize {
            let start = row * padded_bytes_per_row as usize;
            data.extend_from_slice(&padded[start..start + unpadded_bytes_per_row as usize]);
        }
        Ok(data)
    }
}
