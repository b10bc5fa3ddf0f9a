// Weighted Life - GPU Weighted Cellular Automaton
// Licensed under MIT License

use std::sync::Arc;

use anyhow::Context;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use winit::{
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
};

use weighted_life::error::ResourceAllocationError;
use weighted_life::gpu::{GpuContext, GpuRaymarcher, RenderTarget};
use weighted_life::{Camera, ScalarField, Settings};

fn main() -> anyhow::Result<()> {
    use env_logger::Env;
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let settings_path = Settings::default_path();
    let settings = Settings::load_or_default(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;
    settings.validate().context("invalid settings")?;
    let raymarch = &settings.raymarch;

    let mut rng = match raymarch.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let field = ScalarField::generate(raymarch.field_size, &mut rng)?;

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let window = Arc::new(
        event_loop
            .create_window(
                winit::window::WindowAttributes::default()
                    .with_title("Weighted Life - Raymarch")
                    .with_inner_size(winit::dpi::LogicalSize::new(800, 800)),
            )
            .context("failed to create window")?,
    );

    let instance = GpuContext::instance();
    let surface = instance
        .create_surface(window.clone())
        .map_err(ResourceAllocationError::from)?;
    let gpu = pollster::block_on(GpuContext::request(&instance, Some(&surface)))?;
    let size = window.inner_size();
    let mut target = RenderTarget::window(&gpu, surface, size.width, size.height, true)?;
    let raymarcher = GpuRaymarcher::new(&gpu, &field, target.format(), raymarch.steps)?;
    let camera = Camera::new(
        Vec3::from_array(raymarch.camera_position),
        raymarch.fov_y_degrees,
        size.width.max(1) as f32 / size.height.max(1) as f32,
    );
    let mut frame: u64 = 0;

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { event, window_id } if window_id == window.id() => match event {
                WindowEvent::CloseRequested
                | WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(KeyCode::Escape),
                            state: ElementState::Pressed,
                            ..
                        },
                    ..
                } => elwt.exit(),
                WindowEvent::Resized(physical_size) => {
                    target.resize(&gpu.device, physical_size.width, physical_size.height);
                }
                WindowEvent::RedrawRequested => match raymarcher.render(&gpu, &target, &camera, frame) {
                    Ok(()) => frame += 1,
                    Err(err) => log::warn!("frame {frame}: skipped presentation: {err}"),
                },
                _ => {}
            },
            Event::AboutToWait => {
                elwt.set_control_flow(ControlFlow::Wait);
                window.request_redraw();
            }
            _ => {}
        })
        .context("event loop terminated abnormally")?;

    Ok(())
}
