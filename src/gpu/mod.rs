//! wgpu plumbing shared by the automaton and the raymarcher.

pub mod life;
pub mod target;
pub mod volume;

pub use life::{GpuLifeBackend, LifeUniform};
pub use target::{RenderTarget, TargetFrame};
pub use volume::{GpuRaymarcher, RaymarchUniform};

use crate::error::ResourceAllocationError;

/// Adapter, device and queue for one run.
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub fn instance() -> wgpu::Instance {
        wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        })
    }

    pub async fn request(
        instance: &wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self, ResourceAllocationError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(ResourceAllocationError::NoAdapter)?;
        Self::from_adapter(adapter).await
    }

    async fn from_adapter(adapter: wgpu::Adapter) -> Result<Self, ResourceAllocationError> {
        let info = adapter.get_info();
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Weighted Life Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }

    /// Device without a surface, for offscreen rendering and readback.
    /// Falls back to a software adapter on any backend when no hardware
    /// adapter is available.
    pub fn headless() -> Result<Self, ResourceAllocationError> {
        let instance = Self::instance();
        match pollster::block_on(Self::request(&instance, None)) {
            Err(ResourceAllocationError::NoAdapter) => {}
            other => return other,
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: true,
        }))
        .ok_or(ResourceAllocationError::NoAdapter)?;
        pollster::block_on(Self::from_adapter(adapter))
    }
}

/// Runs `create` inside out-of-memory and validation error scopes and turns
/// any captured error into a [`ResourceAllocationError`].
pub fn allocate<T>(
    device: &wgpu::Device,
    label: &'static str,
    create: impl FnOnce() -> T,
) -> Result<T, ResourceAllocationError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    match validation.or(out_of_memory) {
        Some(err) => Err(ResourceAllocationError::Gpu {
            label,
            message: err.to_string(),
        }),
        None => Ok(value),
    }
}

#[inline]
pub fn workgroups(extent: u32, group_size: u32) -> u32 {
    extent.div_ceil(group_size)
}

/// Copies a 4-byte-per-texel 2D texture back to the host, row padding
/// stripped.
pub fn read_texture_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    label: &'static str,
) -> Result<Vec<[u8; 4]>, ResourceAllocationError> {
    let width = texture.width();
    let height = texture.height();
    let unpadded_row = width * 4;
    let padded_row = unpadded_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
        * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

    let staging_buffer = allocate(device, label, || {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size: padded_row as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    })?;

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging_buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let buffer_slice = staging_buffer.slice(..);
    let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::Wait);

    match pollster::block_on(receiver.receive()) {
        Some(Ok(())) => {}
        Some(Err(err)) => {
            return Err(ResourceAllocationError::Readback {
                label,
                message: err.to_string(),
            })
        }
        None => {
            return Err(ResourceAllocationError::Readback {
                label,
                message: "map callback dropped".to_string(),
            })
        }
    }

    let data = buffer_slice.get_mapped_range();
    let mut texels = Vec::with_capacity(width as usize * height as usize);
    for row in data.chunks(padded_row as usize) {
        texels.extend_from_slice(bytemuck::cast_slice::<u8, [u8; 4]>(
            &row[..unpadded_row as usize],
        ));
    }
    drop(data);
    staging_buffer.unmap();

    Ok(texels)
}
