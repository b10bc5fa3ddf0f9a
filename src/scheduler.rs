//! Tick loop: one simulation pass, one buffer-role swap, one presentation
//! pass. The scheduler owns the only copy of the "current slot" index and
//! the frame counter; backends see them through [`SimulationContext`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::automaton;
use crate::error::{PresentError, TickError};
use crate::kernel::NeighborKernel;
use crate::presentation::{self, PaletteParams};
use crate::rule::RuleMask;
use crate::world::{PassSlots, Slot, Texel, WorldState};

/// Everything a pass may read about the run, threaded through every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationContext {
    pub frame: u64,
    pub current: Slot,
    pub rule: RuleMask,
    pub palette: PaletteParams,
}

impl SimulationContext {
    pub fn new(rule: RuleMask, palette: PaletteParams) -> Self {
        Self {
            frame: 0,
            current: Slot::A,
            rule,
            palette,
        }
    }

    pub fn random_palette<R: Rng + ?Sized>(rule: RuleMask, rng: &mut R) -> Self {
        Self::new(rule, PaletteParams::random(rng))
    }
}

/// Executes the two per-tick passes against backend-owned buffers.
pub trait FrameBackend {
    /// Evaluates every cell of `slots.read` into `slots.write`.
    fn simulate(&mut self, ctx: &SimulationContext, slots: PassSlots) -> Result<(), TickError>;

    /// Displays `ctx.current`, which holds the generation just computed.
    fn present(&mut self, ctx: &SimulationContext) -> Result<(), PresentError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Simulating,
    Presenting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Presented,
    /// Simulation committed but the frame could not be shown.
    PresentSkipped,
    Stopped,
}

/// Cloneable handle that stops a scheduler from another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct FrameScheduler<B> {
    backend: B,
    context: SimulationContext,
    phase: SchedulerPhase,
    stop: StopHandle,
}

impl<B: FrameBackend> FrameScheduler<B> {
    pub fn new(backend: B, context: SimulationContext) -> Self {
        Self {
            backend,
            context,
            phase: SchedulerPhase::Idle,
            stop: StopHandle::default(),
        }
    }

    pub fn context(&self) -> &SimulationContext {
        &self.context
    }

    pub fn frame(&self) -> u64 {
        self.context.frame
    }

    pub fn current(&self) -> Slot {
        self.context.current
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Runs one full Idle -> Simulating -> Presenting -> Idle cycle.
    ///
    /// A failed simulation stops the scheduler and leaves the current slot
    /// and frame untouched. A failed presentation is logged and the tick
    /// still completes.
    pub fn tick(&mut self) -> Result<TickOutcome, TickError> {
        if self.stop.is_stopped() {
            return Ok(TickOutcome::Stopped);
        }

        self.phase = SchedulerPhase::Simulating;
        let slots = PassSlots::from_current(self.context.current);
        if let Err(err) = self.backend.simulate(&self.context, slots) {
            log::error!("frame {}: {err}; stopping", self.context.frame);
            self.stop.stop();
            self.phase = SchedulerPhase::Idle;
            return Err(err);
        }
        self.context.current = slots.write;

        self.phase = SchedulerPhase::Presenting;
        let outcome = match self.backend.present(&self.context) {
            Ok(()) => TickOutcome::Presented,
            Err(err) => {
                log::warn!("frame {}: skipped presentation: {err}", self.context.frame);
                TickOutcome::PresentSkipped
            }
        };

        self.context.frame += 1;
        self.phase = SchedulerPhase::Idle;
        log::trace!("tick complete, frame={} current={:?}", self.context.frame, self.context.current);
        Ok(outcome)
    }

    /// Ticks until `ticks` complete or the scheduler is stopped.
    pub fn run_for(&mut self, ticks: u64) -> Result<u64, TickError> {
        let mut completed = 0;
        while completed < ticks {
            match self.tick()? {
                TickOutcome::Stopped => break,
                _ => completed += 1,
            }
        }
        Ok(completed)
    }
}

/// In-memory backend evaluating both passes on the CPU.
pub struct CpuBackend {
    kernel: NeighborKernel,
    world: WorldState,
    image: Vec<Texel>,
}

impl CpuBackend {
    pub fn new(world: WorldState) -> Self {
        Self {
            kernel: NeighborKernel::generate(),
            world,
            image: Vec::new(),
        }
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn kernel(&self) -> &NeighborKernel {
        &self.kernel
    }

    /// Colour image produced by the latest presentation.
    pub fn image(&self) -> &[Texel] {
        &self.image
    }
}

impl FrameBackend for CpuBackend {
    fn simulate(&mut self, ctx: &SimulationContext, slots: PassSlots) -> Result<(), TickError> {
        let (width, height) = (self.world.width(), self.world.height());
        let (current, next) = self.world.split(slots);
        automaton::step(&self.kernel, ctx.rule, width, height, current, next);
        Ok(())
    }

    fn present(&mut self, ctx: &SimulationContext) -> Result<(), PresentError> {
        self.image = presentation::present(
            &self.kernel,
            self.world.texels(ctx.current),
            self.world.width(),
            self.world.height(),
            ctx.frame,
            &ctx.palette,
        );
        Ok(())
    }
}
