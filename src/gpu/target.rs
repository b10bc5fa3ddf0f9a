use crate::error::ResourceAllocationError;

use super::{allocate, read_texture_rgba8, GpuContext};

pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Where a presentation pass draws: the host window, or a texture that can
/// be read back.
pub enum RenderTarget {
    Window {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
    },
}

/// One acquired image. Dropping it without [`TargetFrame::present`] discards
/// a surface frame.
pub struct TargetFrame {
    pub view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl TargetFrame {
    pub fn present(self) {
        if let Some(surface_texture) = self.surface_texture {
            surface_texture.present();
        }
    }
}

impl RenderTarget {
    pub fn window(
        gpu: &GpuContext,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self, ResourceAllocationError> {
        let surface_caps = surface.get_capabilities(&gpu.adapter);
        let surface_format = pick_surface_format(&surface_caps.formats)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &config);
        log::info!(
            "surface configured: {}x{} {:?} {:?}",
            config.width,
            config.height,
            config.format,
            config.present_mode
        );

        Ok(Self::Window { surface, config })
    }

    pub fn offscreen(gpu: &GpuContext, width: u32, height: u32) -> Result<Self, ResourceAllocationError> {
        let texture = allocate(&gpu.device, "offscreen target", || {
            gpu.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Offscreen Target"),
                size: wgpu::Extent3d {
                    width: width.max(1),
                    height: height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: OFFSCREEN_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        })?;
        Ok(Self::Offscreen { texture })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        match self {
            Self::Window { config, .. } => config.format,
            Self::Offscreen { .. } => OFFSCREEN_FORMAT,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::Window { config, .. } => (config.width, config.height),
            Self::Offscreen { texture } => (texture.width(), texture.height()),
        }
    }

    /// Reconfigures a window surface; offscreen targets keep their size.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Self::Window { surface, config } = self {
            config.width = width;
            config.height = height;
            surface.configure(device, config);
        }
    }

    /// Reapplies the current configuration after the surface was lost.
    pub fn reconfigure(&self, device: &wgpu::Device) {
        if let Self::Window { surface, config } = self {
            surface.configure(device, config);
        }
    }

    /// Next image to draw into. A lost or outdated surface is reconfigured
    /// before the error is returned, so the following frame can succeed.
    pub fn acquire(&self, device: &wgpu::Device) -> Result<TargetFrame, wgpu::SurfaceError> {
        match self {
            Self::Window { surface, .. } => {
                let surface_texture = match surface.get_current_texture() {
                    Ok(texture) => texture,
                    Err(err) => {
                        if surface_needs_reconfigure(&err) {
                            log::debug!("surface {err:?}, reconfiguring");
                            self.reconfigure(device);
                        }
                        return Err(err);
                    }
                };
                let view = surface_texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                Ok(TargetFrame {
                    view,
                    surface_texture: Some(surface_texture),
                })
            }
            Self::Offscreen { texture } => Ok(TargetFrame {
                view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
                surface_texture: None,
            }),
        }
    }

    /// Pixels of an offscreen target; `None` for window surfaces.
    pub fn read_pixels(&self, gpu: &GpuContext) -> Option<Result<Vec<[u8; 4]>, ResourceAllocationError>> {
        match self {
            Self::Window { .. } => None,
            Self::Offscreen { texture } => Some(read_texture_rgba8(
                &gpu.device,
                &gpu.queue,
                texture,
                "offscreen target",
            )),
        }
    }
}

/// Lost and outdated surfaces recover by reconfiguring; the rest do not.
pub fn surface_needs_reconfigure(err: &wgpu::SurfaceError) -> bool {
    matches!(err, wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)
}

/// First non-sRGB format the surface offers, else the first one. Both passes
/// write display-space colour.
pub fn pick_surface_format(
    formats: &[wgpu::TextureFormat],
) -> Result<wgpu::TextureFormat, ResourceAllocationError> {
    formats
        .iter()
        .find(|f| !f.is_srgb())
        .or_else(|| formats.first())
        .copied()
        .ok_or(ResourceAllocationError::NoSurfaceFormat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_format_is_preferred() {
        let formats = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm,
        ];
        assert_eq!(
            pick_surface_format(&formats).unwrap(),
            wgpu::TextureFormat::Bgra8Unorm
        );
        assert_eq!(
            pick_surface_format(&formats[..1]).unwrap(),
            wgpu::TextureFormat::Bgra8UnormSrgb
        );
    }

    #[test]
    fn surface_without_formats_is_an_allocation_error() {
        assert!(matches!(
            pick_surface_format(&[]),
            Err(ResourceAllocationError::NoSurfaceFormat)
        ));
    }

    #[test]
    fn only_lost_and_outdated_are_recoverable() {
        assert!(surface_needs_reconfigure(&wgpu::SurfaceError::Lost));
        assert!(surface_needs_reconfigure(&wgpu::SurfaceError::Outdated));
        assert!(!surface_needs_reconfigure(&wgpu::SurfaceError::Timeout));
        assert!(!surface_needs_reconfigure(&wgpu::SurfaceError::OutOfMemory));
    }
}
