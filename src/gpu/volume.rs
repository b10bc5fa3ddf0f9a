use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::error::{LifeError, PresentError};
use crate::raymarch::{Camera, RaymarchParams, ScalarField, BACKGROUND};

use super::{allocate, GpuContext, RenderTarget};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct RaymarchUniform {
    inv_view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    target_size: [f32; 2],
    threshold: f32,
    steps: f32,
}

// Keep in sync with shaders/raymarch.wgsl
const _: [(); 96] = [(); std::mem::size_of::<RaymarchUniform>()];

impl RaymarchUniform {
    pub fn new(camera: &Camera, params: &RaymarchParams, target_size: (u32, u32)) -> Self {
        let mut camera = *camera;
        camera.aspect = target_size.0.max(1) as f32 / target_size.1.max(1) as f32;
        Self {
            inv_view_proj: camera.view_proj().inverse().to_cols_array_2d(),
            camera_pos: camera.position.extend(1.0).to_array(),
            target_size: [target_size.0.max(1) as f32, target_size.1.max(1) as f32],
            threshold: params.threshold,
            steps: params.steps,
        }
    }
}

fn background_color() -> wgpu::Color {
    wgpu::Color {
        r: BACKGROUND[0] as f64 / 255.0,
        g: BACKGROUND[1] as f64 / 255.0,
        b: BACKGROUND[2] as f64 / 255.0,
        a: 1.0,
    }
}

/// Full-screen isosurface pass over a field uploaded once as an R8 3D texture.
pub struct GpuRaymarcher {
    field_texture: wgpu::Texture,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pipeline: wgpu::RenderPipeline,
    steps: u32,
}

impl GpuRaymarcher {
    pub fn new(
        gpu: &GpuContext,
        field: &ScalarField,
        format: wgpu::TextureFormat,
        steps: u32,
    ) -> Result<Self, LifeError> {
        RaymarchParams::new(0.0, steps as f32)?;
        let device = &gpu.device;
        let size = field.size();
        let extent = wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: size,
        };

        let field_texture = allocate(device, "scalar field", || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Scalar Field"),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D3,
                format: wgpu::TextureFormat::R8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        })?;
        gpu.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &field_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            field.data(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(size),
                rows_per_image: Some(size),
            },
            extent,
        );
        let field_view = field_texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Scalar Field View"),
            dimension: Some(wgpu::TextureViewDimension::D3),
            ..Default::default()
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Scalar Field Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniform_buffer = allocate(device, "raymarch uniform", || {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Raymarch Params"),
                contents: bytemuck::cast_slice(&[RaymarchUniform::zeroed()]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
        })?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Raymarch Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D3,
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
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Raymarch Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&field_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Raymarch Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/raymarch.wgsl").into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Raymarch Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Raymarch"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        log::info!("raymarcher ready: {size}^3 field, {steps} steps");

        Ok(Self {
            field_texture,
            uniform_buffer,
            bind_group,
            pipeline,
            steps,
        })
    }

    pub fn field_size(&self) -> u32 {
        self.field_texture.width()
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Draws one frame into `target`. Pixels whose ray misses the isosurface
    /// keep the background clear colour.
    pub fn render(
        &self,
        gpu: &GpuContext,
        target: &RenderTarget,
        camera: &Camera,
        frame: u64,
    ) -> Result<(), PresentError> {
        let params = RaymarchParams::for_frame(frame, self.steps as f32)
            .map_err(|err| PresentError::Backend(err.to_string()))?;
        let uniform = RaymarchUniform::new(camera, &params, target.size());
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));

        let output = target.acquire(&gpu.device)?;
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Raymarch"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Raymarch Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &output.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(background_color()),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
