use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::error::{PresentError, ResourceAllocationError, TickError};
use crate::kernel::NeighborKernel;
use crate::scheduler::{FrameBackend, SimulationContext};
use crate::world::{PassSlots, Slot, Texel, WorldState};

use super::{allocate, read_texture_rgba8, workgroups, GpuContext, RenderTarget};

const SIMULATE_WG_SIZE: u32 = 16;
const STATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Uniform shared by both automaton passes (`LifeParams` in WGSL).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct LifeUniform {
    grid_size: [u32; 2],
    born: u32,
    survive: u32,
    steps: [f32; 4],
    frame: u32,
    seed: f32,
    target_size: [f32; 2],
    weights: [[f32; 4]; 7],
}

// Keep in sync with shaders/life_shared.wgsl
const _: [(); 160] = [(); std::mem::size_of::<LifeUniform>()];

impl LifeUniform {
    pub fn new(
        ctx: &SimulationContext,
        kernel: &NeighborKernel,
        grid_size: (u32, u32),
        target_size: (u32, u32),
    ) -> Self {
        Self {
            grid_size: [grid_size.0, grid_size.1],
            born: ctx.rule.born() as u32,
            survive: ctx.rule.survive() as u32,
            steps: ctx.palette.steps,
            // Only parity is observed by the shader.
            frame: ctx.frame as u32,
            seed: ctx.palette.seed,
            target_size: [target_size.0.max(1) as f32, target_size.1.max(1) as f32],
            weights: kernel.packed(),
        }
    }
}

/// Automaton backend running both passes on the GPU.
///
/// Cell state lives in two RGBA8 textures. `simulate_bind_groups[i]` reads
/// slot `i` and writes the other one; `present_bind_groups[i]` reads slot
/// `i`. Flipping the scheduler's index is the whole swap.
pub struct GpuLifeBackend {
    gpu: GpuContext,
    target: RenderTarget,
    kernel: NeighborKernel,
    width: u32,
    height: u32,
    states: [wgpu::Texture; 2],
    uniform_buffer: wgpu::Buffer,
    simulate_pipeline: wgpu::ComputePipeline,
    present_pipeline: wgpu::RenderPipeline,
    simulate_bind_groups: [wgpu::BindGroup; 2],
    present_bind_groups: [wgpu::BindGroup; 2],
}

impl GpuLifeBackend {
    pub fn new(
        gpu: GpuContext,
        target: RenderTarget,
        world: &WorldState,
    ) -> Result<Self, ResourceAllocationError> {
        let device = &gpu.device;
        let (width, height) = (world.width(), world.height());
        let kernel = NeighborKernel::generate();

        let states = [
            create_state_texture(&gpu, world, Slot::A, "State A")?,
            create_state_texture(&gpu, world, Slot::B, "State B")?,
        ];
        let state_views = [
            states[0].create_view(&wgpu::TextureViewDescriptor::default()),
            states[1].create_view(&wgpu::TextureViewDescriptor::default()),
        ];

        let uniform_buffer = allocate(device, "life uniform", || {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Life Params"),
                contents: bytemuck::cast_slice(&[LifeUniform::zeroed()]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
        })?;

        let simulate_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Life Simulate Shader"),
            source: wgpu::ShaderSource::Wgsl(
                concat!(
                    include_str!("../../shaders/life_shared.wgsl"),
                    include_str!("../../shaders/life.wgsl")
                )
                .into(),
            ),
        });
        let present_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Life Present Shader"),
            source: wgpu::ShaderSource::Wgsl(
                concat!(
                    include_str!("../../shaders/life_shared.wgsl"),
                    include_str!("../../shaders/present.wgsl")
                )
                .into(),
            ),
        });

        let state_entry = |visibility| wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let uniform_entry = |visibility| wgpu::BindGroupLayoutEntry {
            binding: 2,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let simulate_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Life Simulate Bind Group Layout"),
            entries: &[
                state_entry(wgpu::ShaderStages::COMPUTE),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: STATE_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                uniform_entry(wgpu::ShaderStages::COMPUTE),
            ],
        });
        let present_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Life Present Bind Group Layout"),
            entries: &[
                state_entry(wgpu::ShaderStages::FRAGMENT),
                uniform_entry(wgpu::ShaderStages::FRAGMENT),
            ],
        });

        // Index = slot read by the pass.
        let simulate_bind_groups = [Slot::A, Slot::B].map(|read| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(match read {
                    Slot::A => "Simulate Bind Group A->B",
                    Slot::B => "Simulate Bind Group B->A",
                }),
                layout: &simulate_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&state_views[read.index()]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(
                            &state_views[read.other().index()],
                        ),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                ],
            })
        });
        let present_bind_groups = [Slot::A, Slot::B].map(|current| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(match current {
                    Slot::A => "Present Bind Group A",
                    Slot::B => "Present Bind Group B",
                }),
                layout: &present_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&state_views[current.index()]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                ],
            })
        });

        let simulate_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Life Simulate Pipeline Layout"),
            bind_group_layouts: &[&simulate_layout],
            push_constant_ranges: &[],
        });
        let simulate_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Life Simulate"),
            layout: Some(&simulate_pipeline_layout),
            module: &simulate_shader,
            entry_point: "simulate",
            compilation_options: Default::default(),
            cache: None,
        });

        let present_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Life Present Pipeline Layout"),
            bind_group_layouts: &[&present_layout],
            push_constant_ranges: &[],
        });
        let present_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Life Present"),
            layout: Some(&present_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &present_shader,
                entry_point: "vs_main",
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &present_shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: target.format(),
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        log::info!("life backend ready: {}x{} grid", width, height);

        Ok(Self {
            gpu,
            target,
            kernel,
            width,
            height,
            states,
            uniform_buffer,
            simulate_pipeline,
            present_pipeline,
            simulate_bind_groups,
            present_bind_groups,
        })
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.target.resize(&self.gpu.device, width, height);
    }

    /// Copies one state slot back to the host.
    pub fn read_state(&self, slot: Slot) -> Result<Vec<Texel>, ResourceAllocationError> {
        read_texture_rgba8(
            &self.gpu.device,
            &self.gpu.queue,
            &self.states[slot.index()],
            "state readback",
        )
    }

    /// Pixels of the last presentation, when drawing offscreen.
    pub fn read_image(&self) -> Option<Result<Vec<[u8; 4]>, ResourceAllocationError>> {
        self.target.read_pixels(&self.gpu)
    }
}

impl FrameBackend for GpuLifeBackend {
    fn simulate(&mut self, ctx: &SimulationContext, slots: PassSlots) -> Result<(), TickError> {
        let uniform = LifeUniform::new(ctx, &self.kernel, (self.width, self.height), self.target.size());
        self.gpu
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));

        self.gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Life Simulate"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Simulate"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.simulate_pipeline);
            pass.set_bind_group(0, &self.simulate_bind_groups[slots.read.index()], &[]);
            pass.dispatch_workgroups(
                workgroups(self.width, SIMULATE_WG_SIZE),
                workgroups(self.height, SIMULATE_WG_SIZE),
                1,
            );
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        match pollster::block_on(self.gpu.device.pop_error_scope()) {
            Some(err) => Err(TickError::Submission {
                frame: ctx.frame,
                message: err.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn present(&mut self, ctx: &SimulationContext) -> Result<(), PresentError> {
        let frame = self.target.acquire(&self.gpu.device)?;

        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Life Present"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
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
            render_pass.set_pipeline(&self.present_pipeline);
            render_pass.set_bind_group(0, &self.present_bind_groups[ctx.current.index()], &[]);
            render_pass.draw(0..3, 0..1);
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

fn create_state_texture(
    gpu: &GpuContext,
    world: &WorldState,
    slot: Slot,
    label: &'static str,
) -> Result<wgpu::Texture, ResourceAllocationError> {
    let size = wgpu::Extent3d {
        width: world.width(),
        height: world.height(),
        depth_or_array_layers: 1,
    };
    let texture = allocate(&gpu.device, label, || {
        gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: STATE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    })?;

    gpu.queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        world.bytes(slot),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * world.width()),
            rows_per_image: Some(world.height()),
        },
        size,
    );
    Ok(texture)
}
