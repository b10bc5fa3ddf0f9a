use thiserror::Error;

/// Invalid user-supplied parameters, rejected before any GPU work starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("{mask} override {value} is outside 0..=255")]
    RuleOverrideOutOfRange { mask: &'static str, value: i64 },
    #[error("grid dimensions {width}x{height} must both be non-zero")]
    EmptyGrid { width: u32, height: u32 },
    #[error("scalar field size must be non-zero")]
    EmptyField,
    #[error("raymarch step count {0} is outside 1..=4096")]
    InvalidStepCount(f32),
    #[error("field data holds {actual} samples, expected {expected}")]
    FieldSizeMismatch { expected: usize, actual: usize },
}

/// Startup failures creating the device, surface, textures or buffers.
#[derive(Debug, Error)]
pub enum ResourceAllocationError {
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("failed to create window surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("window surface reports no supported texture formats")]
    NoSurfaceFormat,
    #[error("failed to request GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("GPU rejected allocation of {label}: {message}")]
    Gpu { label: &'static str, message: String },
    #[error("failed to map {label} for readback: {message}")]
    Readback { label: &'static str, message: String },
}

/// A simulation submission that failed. Fatal: history cannot be rebuilt.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("simulation submission for frame {frame} failed: {message}")]
    Submission { frame: u64, message: String },
}

/// A presentation that could not be shown. The tick still completes.
#[derive(Debug, Error)]
pub enum PresentError {
    #[error("surface unavailable: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("presentation failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum LifeError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    ResourceAllocation(#[from] ResourceAllocationError),
    #[error(transparent)]
    Tick(#[from] TickError),
}
