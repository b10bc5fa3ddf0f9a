// Weighted Life - GPU Weighted Cellular Automaton
// Licensed under MIT License

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use winit::{
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
};

use weighted_life::error::{ResourceAllocationError, TickError};
use weighted_life::gpu::{GpuContext, GpuLifeBackend, RenderTarget};
use weighted_life::world::texel_is_alive;
use weighted_life::{FrameScheduler, RuleEncoder, Settings, SimulationContext, TickOutcome, WorldState};

const TITLE_INTERVAL: Duration = Duration::from_millis(500);

/// Frames counted between title refreshes.
struct FpsCounter {
    frames: u32,
    since: Instant,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            frames: 0,
            since: Instant::now(),
            fps: 0.0,
        }
    }

    /// Returns true when the rate was recomputed.
    fn record(&mut self) -> bool {
        self.frames += 1;
        let elapsed = self.since.elapsed();
        if elapsed < TITLE_INTERVAL {
            return false;
        }
        self.fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.since = Instant::now();
        true
    }
}

fn main() -> anyhow::Result<()> {
    use env_logger::Env;
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let settings_path = Settings::default_path();
    let settings = Settings::load_or_default(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;
    settings.validate().context("invalid settings")?;

    let mut rng = match settings.life.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let rule = RuleEncoder::encode(settings.rule_overrides(), &mut rng)?;
    let world = WorldState::seeded(settings.life.width, settings.life.height, &mut rng)?;
    let context = SimulationContext::random_palette(rule, &mut rng);
    log::info!(
        "rule {rule}, {}x{} grid, {} live cells",
        world.width(),
        world.height(),
        world.population(context.current)
    );

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let window = Arc::new(
        event_loop
            .create_window(
                winit::window::WindowAttributes::default()
                    .with_title("Weighted Life")
                    .with_inner_size(winit::dpi::LogicalSize::new(
                        settings.life.width.clamp(256, 1024),
                        settings.life.height.clamp(256, 1024),
                    )),
            )
            .context("failed to create window")?,
    );

    let instance = GpuContext::instance();
    let surface = instance
        .create_surface(window.clone())
        .map_err(ResourceAllocationError::from)?;
    let gpu = pollster::block_on(GpuContext::request(&instance, Some(&surface)))?;
    let size = window.inner_size();
    let target = RenderTarget::window(&gpu, surface, size.width, size.height, true)?;
    let backend = GpuLifeBackend::new(gpu, target, &world)?;
    let mut scheduler = FrameScheduler::new(backend, context);
    let stop = scheduler.stop_handle();

    let frame_interval =
        (settings.life.limit_fps > 0.0).then(|| Duration::from_secs_f32(1.0 / settings.life.limit_fps));
    let mut last_tick = Instant::now();
    let mut paused = false;
    let mut counter = FpsCounter::new();
    let mut fatal: Option<TickError> = None;
    let fatal_slot = &mut fatal;

    event_loop
        .run(move |event, target| match event {
            Event::WindowEvent { event, window_id } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    stop.stop();
                    target.exit();
                }
                WindowEvent::Resized(physical_size) => {
                    scheduler
                        .backend_mut()
                        .resize(physical_size.width, physical_size.height);
                }
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(code),
                            state: ElementState::Pressed,
                            repeat: false,
                            ..
                        },
                    ..
                } => match code {
                    KeyCode::Escape => {
                        stop.stop();
                        target.exit();
                    }
                    KeyCode::Space => {
                        paused = !paused;
                        log::info!(
                            "{} at frame {}",
                            if paused { "paused" } else { "resumed" },
                            scheduler.frame()
                        );
                        window.request_redraw();
                    }
                    KeyCode::KeyC => match scheduler.backend().read_state(scheduler.current()) {
                        Ok(texels) => {
                            let population = texels.iter().filter(|t| texel_is_alive(**t)).count();
                            log::info!("frame {}: {} live cells", scheduler.frame(), population);
                        }
                        Err(err) => log::warn!("population readback failed: {err}"),
                    },
                    KeyCode::KeyR => log::info!("rule {}", scheduler.context().rule),
                    _ => {}
                },
                WindowEvent::RedrawRequested => {
                    if paused {
                        return;
                    }
                    last_tick = Instant::now();
                    match scheduler.tick() {
                        Ok(TickOutcome::Stopped) => target.exit(),
                        Ok(_) => {
                            if counter.record() {
                                window.set_title(&format!(
                                    "Weighted Life - {} - frame {} - {:.1} FPS",
                                    scheduler.context().rule,
                                    scheduler.frame(),
                                    counter.fps
                                ));
                            }
                        }
                        Err(err) => {
                            *fatal_slot = Some(err);
                            target.exit();
                        }
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                if paused || stop.is_stopped() {
                    target.set_control_flow(ControlFlow::Wait);
                    return;
                }
                match frame_interval {
                    Some(interval) if last_tick.elapsed() < interval => {
                        target.set_control_flow(ControlFlow::WaitUntil(last_tick + interval));
                    }
                    _ => {
                        target.set_control_flow(ControlFlow::Wait);
                        window.request_redraw();
                    }
                }
            }
            _ => {}
        })
        .context("event loop terminated abnormally")?;

    match fatal {
        Some(err) => Err(err).context("simulation stopped"),
        None => Ok(()),
    }
}
