use rand::rngs::StdRng;
use rand::SeedableRng;

use weighted_life::error::{PresentError, TickError};
use weighted_life::presentation::PaletteParams;
use weighted_life::rule::RuleMask;
use weighted_life::scheduler::{
    CpuBackend, FrameBackend, FrameScheduler, SchedulerPhase, SimulationContext, TickOutcome,
};
use weighted_life::world::{PassSlots, Slot, WorldState};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Simulate { frame: u64, read: Slot, write: Slot },
    Present { frame: u64, current: Slot },
}

#[derive(Default)]
struct RecordingBackend {
    calls: Vec<Call>,
    fail_simulate_at: Option<u64>,
    fail_present_at: Option<u64>,
}

impl FrameBackend for RecordingBackend {
    fn simulate(&mut self, ctx: &SimulationContext, slots: PassSlots) -> Result<(), TickError> {
        self.calls.push(Call::Simulate {
            frame: ctx.frame,
            read: slots.read,
            write: slots.write,
        });
        if self.fail_simulate_at == Some(ctx.frame) {
            return Err(TickError::Submission {
                frame: ctx.frame,
                message: "device lost".to_string(),
            });
        }
        Ok(())
    }

    fn present(&mut self, ctx: &SimulationContext) -> Result<(), PresentError> {
        self.calls.push(Call::Present {
            frame: ctx.frame,
            current: ctx.current,
        });
        if self.fail_present_at == Some(ctx.frame) {
            return Err(PresentError::Backend("surface timeout".to_string()));
        }
        Ok(())
    }
}

fn context() -> SimulationContext {
    SimulationContext::new(RuleMask::from_bytes(0b0000_1000, 0b0001_0000), PaletteParams::default())
}

#[test]
fn ticks_alternate_slots_and_present_the_fresh_buffer() {
    let mut scheduler = FrameScheduler::new(RecordingBackend::default(), context());
    assert_eq!(scheduler.run_for(3).unwrap(), 3);
    assert_eq!(scheduler.frame(), 3);
    assert_eq!(scheduler.current(), Slot::B);
    assert_eq!(scheduler.phase(), SchedulerPhase::Idle);
    assert_eq!(
        scheduler.backend().calls,
        vec![
            Call::Simulate { frame: 0, read: Slot::A, write: Slot::B },
            Call::Present { frame: 0, current: Slot::B },
            Call::Simulate { frame: 1, read: Slot::B, write: Slot::A },
            Call::Present { frame: 1, current: Slot::A },
            Call::Simulate { frame: 2, read: Slot::A, write: Slot::B },
            Call::Present { frame: 2, current: Slot::B },
        ]
    );
}

#[test]
fn stopped_scheduler_issues_no_more_work() {
    let mut scheduler = FrameScheduler::new(RecordingBackend::default(), context());
    scheduler.tick().unwrap();
    let handle = scheduler.stop_handle();
    handle.stop();
    assert!(scheduler.is_stopped());
    assert_eq!(scheduler.tick().unwrap(), TickOutcome::Stopped);
    assert_eq!(scheduler.run_for(10).unwrap(), 0);
    assert_eq!(scheduler.frame(), 1);
    assert_eq!(scheduler.backend().calls.len(), 2);
}

#[test]
fn failed_simulation_is_fatal_and_keeps_committed_state() {
    let backend = RecordingBackend {
        fail_simulate_at: Some(1),
        ..Default::default()
    };
    let mut scheduler = FrameScheduler::new(backend, context());
    let err = scheduler.run_for(5).unwrap_err();
    assert!(matches!(err, TickError::Submission { frame: 1, .. }));
    assert!(scheduler.is_stopped());
    assert_eq!(scheduler.frame(), 1);
    assert_eq!(scheduler.current(), Slot::B);
    assert_eq!(scheduler.phase(), SchedulerPhase::Idle);
    assert_eq!(scheduler.tick().unwrap(), TickOutcome::Stopped);
}

#[test]
fn failed_presentation_still_completes_the_tick() {
    let backend = RecordingBackend {
        fail_present_at: Some(0),
        ..Default::default()
    };
    let mut scheduler = FrameScheduler::new(backend, context());
    assert_eq!(scheduler.tick().unwrap(), TickOutcome::PresentSkipped);
    assert_eq!(scheduler.frame(), 1);
    assert_eq!(scheduler.current(), Slot::B);
    assert_eq!(scheduler.tick().unwrap(), TickOutcome::Presented);
    assert_eq!(scheduler.current(), Slot::A);
}

#[test]
fn cpu_backend_matches_direct_evaluation() {
    let mut rng = StdRng::seed_from_u64(11);
    let world = WorldState::seeded(24, 18, &mut rng).unwrap();
    let rule = RuleMask::random(&mut rng);
    let ctx = SimulationContext::random_palette(rule, &mut rng);

    let mut reference = world.clone();
    let kernel = weighted_life::kernel::NeighborKernel::generate();
    for tick in 0..4u64 {
        let read = if tick % 2 == 0 { Slot::A } else { Slot::B };
        let (current, next) = reference.split(PassSlots::from_current(read));
        weighted_life::automaton::step(&kernel, rule, 24, 18, current, next);
    }

    let mut scheduler = FrameScheduler::new(CpuBackend::new(world), ctx);
    assert_eq!(scheduler.run_for(4).unwrap(), 4);
    assert_eq!(scheduler.current(), Slot::A);
    assert_eq!(
        scheduler.backend().world().texels(Slot::A),
        reference.texels(Slot::A)
    );
    assert_eq!(scheduler.backend().image().len(), 24 * 18);
}
