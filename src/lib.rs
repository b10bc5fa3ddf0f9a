//! Weighted cellular automaton on a toroidal grid, double-buffered on the GPU,
//! plus an isosurface raymarcher over a 3D scalar field.
//!
//! Every GPU pass has a CPU twin in this crate so the semantics can be
//! checked without a device.

pub mod automaton;
pub mod error;
pub mod gpu;
pub mod kernel;
pub mod presentation;
pub mod raymarch;
pub mod rule;
pub mod scheduler;
pub mod settings;
pub mod world;

pub use error::{ConfigurationError, LifeError, PresentError, ResourceAllocationError, TickError};
pub use kernel::NeighborKernel;
pub use presentation::PaletteParams;
pub use raymarch::{Camera, RayOutcome, RaymarchParams, ScalarField, VolumeRaymarcher};
pub use rule::{RuleEncoder, RuleMask, RuleOverrides};
pub use scheduler::{
    CpuBackend, FrameBackend, FrameScheduler, SchedulerPhase, SimulationContext, StopHandle,
    TickOutcome,
};
pub use settings::Settings;
pub use world::{PassSlots, Slot, Texel, WorldState};
