//! wgpu presenter.
//!
//! Renders a [`Frame`] as instanced glyph quads in one render pass, one draw
//! call per batch. The atlas lives in a single RGBA texture that is
//! recreated when the CPU atlas grows and patched in place otherwise.
//!
//! Instance data goes through a `StagingBelt` so steady-state frames write
//! into already-mapped memory.

use std::num::NonZeroU64;

use wgpu::util::StagingBelt;

use super::{DrawInstance, Frame, FramePresenter, create_orthographic_matrix};
use crate::atlas::AtlasUpload;
use crate::error::RendererError;

/// Uniform data for the shader.
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct Globals {
    /// Transform matrix (orthographic projection).
    transform: [[f32; 4]; 4],  // 64 bytes
    /// Atlas size for UV normalization.
    atlas_size: [f32; 2],      // 8 bytes
    /// Padding for alignment.
    _padding: [f32; 2],        // 8 bytes
}

/// Views a frame renders into.
///
/// With MSAA enabled the frame is drawn into `multisample` and resolved into
/// `color`; otherwise it is drawn into `color` directly.
#[derive(Debug, Clone, Copy)]
pub struct WgpuTarget<'a> {
    pub color: &'a wgpu::TextureView,
    pub multisample: Option<&'a wgpu::TextureView>,
}

struct AtlasTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// [`FramePresenter`] on a wgpu device.
pub struct WgpuPresenter {
    device: wgpu::Device,
    queue: wgpu::Queue,
    glyph_pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    atlas_bind_group_layout: wgpu::BindGroupLayout,
    atlas_sampler: wgpu::Sampler,
    atlas: Option<AtlasTexture>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    sample_count: u32,
    staging_belt: StagingBelt,
}

impl WgpuPresenter {
    /// Build the pipeline for `format` render targets with `sample_count`
    /// MSAA samples.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Tether Glyph Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/glyph.wgsl").into()),
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Tether Globals Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let atlas_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Tether Atlas Layout"),
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
            label: Some("Tether Pipeline Layout"),
            bind_group_layouts: &[&globals_layout, &atlas_bind_group_layout],
            push_constant_ranges: &[],
        });

        let glyph_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Tether Glyph Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<DrawInstance>() as u64,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &[
                        // pos
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x2,
                            offset: 0,
                            shader_location: 0,
                        },
                        // size
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x2,
                            offset: 8,
                            shader_location: 1,
                        },
                        // uv_tl
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x2,
                            offset: 16,
                            shader_location: 2,
                        },
                        // uv_br
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x2,
                            offset: 24,
                            shader_location: 3,
                        },
                        // color
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Uint32,
                            offset: 32,
                            shader_location: 4,
                        },
                    ],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: sample_count,
                ..Default::default()
            },
            multiview: None,
            cache: None,
        });

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Tether Globals Buffer"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Tether Globals Bind Group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let atlas_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Tether Atlas Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let instance_capacity = 1024;
        let instance_buffer = create_instance_buffer(&device, instance_capacity);

        Self {
            device,
            queue,
            glyph_pipeline,
            globals_buffer,
            globals_bind_group,
            atlas_bind_group_layout,
            atlas_sampler,
            atlas: None,
            instance_buffer,
            instance_capacity,
            sample_count,
            // 64KB chunks: ~1800 instances before the belt allocates another.
            staging_belt: StagingBelt::new(64 * 1024),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    fn recreate_atlas_texture(&mut self, width: u32, height: u32) {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Tether Atlas Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let atlas_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Tether Atlas Bind Group"),
            layout: &self.atlas_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&atlas_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.atlas_sampler),
                },
            ],
        });

        tracing::debug!("Created {}x{} atlas texture", width, height);
        self.atlas = Some(AtlasTexture {
            texture,
            bind_group,
            width,
            height,
        });
    }
}

impl FramePresenter for WgpuPresenter {
    type Target<'a> = WgpuTarget<'a>;

    fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn upload_atlas(&mut self, upload: AtlasUpload<'_>) -> Result<(), RendererError> {
        let stale = match &self.atlas {
            Some(atlas) => atlas.width != upload.width || atlas.height != upload.height,
            None => true,
        };
        if upload.recreate || stale {
            self.recreate_atlas_texture(upload.width, upload.height);
        }
        let Some(atlas) = &self.atlas else {
            return Err(RendererError::Presentation("atlas texture missing".into()));
        };

        let region = upload.region;
        if region.is_empty() {
            return Ok(());
        }
        if region.right() > upload.width || region.bottom() > upload.height {
            return Err(RendererError::Presentation(format!(
                "upload region {region:?} outside {}x{} atlas",
                upload.width, upload.height
            )));
        }

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &atlas.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: region.x,
                    y: region.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            upload.data,
            wgpu::ImageDataLayout {
                offset: ((region.y * upload.width + region.x) * 4) as u64,
                bytes_per_row: Some(upload.width * 4),
                rows_per_image: Some(region.height),
            },
            wgpu::Extent3d {
                width: region.width,
                height: region.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn present(&mut self, target: WgpuTarget<'_>, frame: &Frame<'_>) -> Result<(), RendererError> {
        if (self.sample_count > 1) != target.multisample.is_some() {
            return Err(RendererError::Presentation(format!(
                "pipeline expects {} samples but target multisample view is {}",
                self.sample_count,
                if target.multisample.is_some() { "present" } else { "missing" }
            )));
        }
        let Some(atlas) = &self.atlas else {
            return Err(RendererError::Presentation("atlas was never uploaded".into()));
        };

        // Update globals (small uniform buffer, write_buffer is fine)
        let globals = Globals {
            transform: create_orthographic_matrix(frame.width as f32, frame.height as f32),
            atlas_size: [frame.atlas_size.0 as f32, frame.atlas_size.1 as f32],
            _padding: [0.0, 0.0],
        };
        self.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

        // Resize instance buffer if needed
        let total = frame.instance_count();
        if total > self.instance_capacity {
            self.instance_capacity = total.next_power_of_two();
            self.instance_buffer = create_instance_buffer(&self.device, self.instance_capacity);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Tether Frame Encoder"),
            });

        // Batches are laid out back to back in the instance buffer.
        let stride = std::mem::size_of::<DrawInstance>();
        let mut ranges = Vec::with_capacity(frame.batches.len());
        let mut offset = 0usize;
        for batch in &frame.batches {
            let bytes: &[u8] = bytemuck::cast_slice(batch.instances);
            if let Some(size) = NonZeroU64::new(bytes.len() as u64) {
                let mut staging = self.staging_belt.write_buffer(
                    &mut encoder,
                    &self.instance_buffer,
                    (offset * stride) as u64,
                    size,
                    &self.device,
                );
                staging.copy_from_slice(bytes);
            }
            ranges.push(offset..offset + batch.instances.len());
            offset += batch.instances.len();
        }
        self.staging_belt.finish();

        let clear = frame.clear_color.to_f64_array();
        let (view, resolve_target) = match target.multisample {
            Some(ms) => (ms, Some(target.color)),
            None => (target.color, None),
        };

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Tether Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear[0],
                            g: clear[1],
                            b: clear[2],
                            a: clear[3],
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.glyph_pipeline);
            render_pass.set_bind_group(0, &self.globals_bind_group, &[]);
            render_pass.set_bind_group(1, &atlas.bind_group, &[]);
            for range in ranges.into_iter().filter(|r| !r.is_empty()) {
                let bytes = (range.start * stride) as u64..(range.end * stride) as u64;
                render_pass.set_vertex_buffer(0, self.instance_buffer.slice(bytes));
                // 6 vertices per quad (2 triangles)
                render_pass.draw(0..6, 0..range.len() as u32);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.staging_belt.recall();
        Ok(())
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Tether Instance Buffer"),
        size: (capacity * std::mem::size_of::<DrawInstance>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
