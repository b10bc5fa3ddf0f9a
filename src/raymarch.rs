//! Isosurface raymarching through a precomputed 3D scalar field.
//!
//! The field fills the unit box `[-0.5, 0.5]^3`. Every output pixel is an
//! independent pure function of the camera, the field and the frame number;
//! `shaders/raymarch.wgsl` is the GPU twin of [`VolumeRaymarcher::march`].

use std::f32::consts::TAU;

use glam::{Mat4, Vec3, Vec4};
use rand::Rng;
use rayon::prelude::*;

use crate::error::ConfigurationError;

pub const DEFAULT_FIELD_SIZE: u32 = 40;
pub const DEFAULT_STEPS: u32 = 254;
pub const MAX_STEPS: u32 = 4096;
/// `TAU^3 + TAU`, the scale shared by the field quantisation and the
/// threshold period.
pub const FIELD_SCALE: f32 = TAU * TAU * TAU + TAU;
pub const BACKGROUND: [u8; 4] = [0x10, 0x10, 0x10, 255];

const BOX_MIN: f32 = -0.5;
const BOX_MAX: f32 = 0.5;
const FACE_EPSILON: f32 = 1e-4;
const GRADIENT_STEP: f32 = 0.01;
/// Upper bound on samples along one ray. A box chord is at most `sqrt(3)`
/// long and `delta >= 1 / steps`, so valid step counts stay below it.
const MAX_MARCH_ITERATIONS: u32 = 2 * MAX_STEPS;

/// Cubic R8 field, x fastest, as uploaded to a 3D texture.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    size: u32,
    data: Vec<u8>,
}

impl ScalarField {
    pub fn from_data(size: u32, data: Vec<u8>) -> Result<Self, ConfigurationError> {
        if size == 0 {
            return Err(ConfigurationError::EmptyField);
        }
        let expected = (size as usize).pow(3);
        if data.len() != expected {
            return Err(ConfigurationError::FieldSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { size, data })
    }

    /// Noisy lattice of sines: a random term plus `sin` of each integer
    /// coordinate, quantised to a byte.
    pub fn generate<R: Rng + ?Sized>(size: u32, rng: &mut R) -> Result<Self, ConfigurationError> {
        if size == 0 {
            return Err(ConfigurationError::EmptyField);
        }
        let mut data = Vec::with_capacity((size as usize).pow(3));
        for z in 0..size {
            for y in 0..size {
                for x in 0..size {
                    let r: f32 = rng.gen();
                    let d = r / TAU
                        + ((x as f32).sin() + 1.0) / TAU
                        + ((y as f32).sin() + 1.0) / TAU
                        + ((z as f32).sin() + 1.0) / TAU;
                    data.push((d * FIELD_SCALE).ceil().clamp(0.0, 255.0) as u8);
                }
            }
        }
        Self::from_data(size, data)
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn texel(&self, x: i64, y: i64, z: i64) -> f32 {
        let max = self.size as i64 - 1;
        let (x, y, z) = (x.clamp(0, max), y.clamp(0, max), z.clamp(0, max));
        let n = self.size as usize;
        self.data[(z as usize * n + y as usize) * n + x as usize] as f32 / 255.0
    }

    /// Trilinear sample at normalised texture coordinates with
    /// clamp-to-edge addressing, matching a linear-filtered GPU sampler.
    pub fn sample(&self, uvw: Vec3) -> f32 {
        let p = uvw.clamp(Vec3::ZERO, Vec3::ONE) * self.size as f32 - Vec3::splat(0.5);
        let base = p.floor();
        let f = p - base;
        let (x0, y0, z0) = (base.x as i64, base.y as i64, base.z as i64);

        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let c00 = lerp(self.texel(x0, y0, z0), self.texel(x0 + 1, y0, z0), f.x);
        let c10 = lerp(self.texel(x0, y0 + 1, z0), self.texel(x0 + 1, y0 + 1, z0), f.x);
        let c01 = lerp(self.texel(x0, y0, z0 + 1), self.texel(x0 + 1, y0, z0 + 1), f.x);
        let c11 = lerp(
            self.texel(x0, y0 + 1, z0 + 1),
            self.texel(x0 + 1, y0 + 1, z0 + 1),
            f.x,
        );
        lerp(lerp(c00, c10, f.y), lerp(c01, c11, f.y), f.z)
    }

    /// Surface normal at `coord` in `[0, 1]^3`: the box face normal on the
    /// boundary, otherwise the negated central-difference gradient.
    pub fn normal(&self, coord: Vec3) -> Vec3 {
        if coord.x < FACE_EPSILON {
            return Vec3::X;
        }
        if coord.y < FACE_EPSILON {
            return Vec3::Y;
        }
        if coord.z < FACE_EPSILON {
            return Vec3::Z;
        }
        if coord.x > 1.0 - FACE_EPSILON {
            return Vec3::NEG_X;
        }
        if coord.y > 1.0 - FACE_EPSILON {
            return Vec3::NEG_Y;
        }
        if coord.z > 1.0 - FACE_EPSILON {
            return Vec3::NEG_Z;
        }

        let dx = Vec3::new(GRADIENT_STEP, 0.0, 0.0);
        let dy = Vec3::new(0.0, GRADIENT_STEP, 0.0);
        let dz = Vec3::new(0.0, 0.0, GRADIENT_STEP);
        Vec3::new(
            self.sample(coord - dx) - self.sample(coord + dx),
            self.sample(coord - dy) - self.sample(coord + dy),
            self.sample(coord - dz) - self.sample(coord + dz),
        )
        .normalize_or_zero()
    }
}

/// Entry/exit distances of a ray against the field's box. The interval is
/// empty when `near > far`.
pub fn hit_box(origin: Vec3, dir: Vec3) -> (f32, f32) {
    let inv_dir = dir.recip();
    let t_a = (Vec3::splat(BOX_MIN) - origin) * inv_dir;
    let t_b = (Vec3::splat(BOX_MAX) - origin) * inv_dir;
    let t_min = t_a.min(t_b);
    let t_max = t_a.max(t_b);
    (t_min.max_element(), t_max.min_element())
}

/// Number of samples taken between `t0` and `t1`, fixed before marching.
pub fn march_iterations(t0: f32, t1: f32, delta: f32) -> u32 {
    let count = ((t1 - t0) / delta).ceil();
    if count.is_nan() || count <= 0.0 {
        return 0;
    }
    count.min(MAX_MARCH_ITERATIONS as f32) as u32
}

/// Isosurface level for `frame`, oscillating inside `[4/TAU, 6/TAU]`.
pub fn threshold_at(frame: u64) -> f32 {
    ((frame as f32 / FIELD_SCALE).sin() + 1.0) / 2.0 * (2.0 / TAU) + 4.0 / TAU
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(position: Vec3, fov_y_degrees: f32, aspect: f32) -> Self {
        Self {
            position,
            target: Vec3::ZERO,
            up: Vec3::Z,
            fov_y_degrees,
            aspect,
            near: 1.0,
            far: TAU.powi(5),
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        let view = Mat4::look_at_rh(self.position, self.target, self.up);
        let proj = Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        );
        proj * view
    }

    /// Ray through the center of pixel `(px, py)`; `py = 0` is the top row.
    pub fn ray(&self, inv_view_proj: &Mat4, px: u32, py: u32, width: u32, height: u32) -> (Vec3, Vec3) {
        let ndc_x = (px as f32 + 0.5) / width as f32 * 2.0 - 1.0;
        let ndc_y = 1.0 - (py as f32 + 0.5) / height as f32 * 2.0;
        let far = *inv_view_proj * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        let far = far.truncate() / far.w;
        (self.position, (far - self.position).normalize())
    }
}

/// Strongly typed per-pass parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaymarchParams {
    pub threshold: f32,
    pub steps: f32,
}

impl RaymarchParams {
    pub fn new(threshold: f32, steps: f32) -> Result<Self, ConfigurationError> {
        if !(1.0..=MAX_STEPS as f32).contains(&steps) {
            return Err(ConfigurationError::InvalidStepCount(steps));
        }
        Ok(Self { threshold, steps })
    }

    pub fn for_frame(frame: u64, steps: f32) -> Result<Self, ConfigurationError> {
        Self::new(threshold_at(frame), steps)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RayOutcome {
    /// No colour is written for this pixel.
    Discarded,
    Shaded([f32; 4]),
}

pub struct VolumeRaymarcher {
    field: ScalarField,
    camera: Camera,
    steps: f32,
}

impl VolumeRaymarcher {
    pub fn new(field: ScalarField, camera: Camera, steps: u32) -> Result<Self, ConfigurationError> {
        RaymarchParams::new(0.0, steps as f32)?;
        Ok(Self {
            field,
            camera,
            steps: steps as f32,
        })
    }

    pub fn field(&self) -> &ScalarField {
        &self.field
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn steps(&self) -> f32 {
        self.steps
    }

    /// Marches one ray (`dir` normalised) until the field exceeds the
    /// threshold or the ray leaves the box.
    pub fn march(&self, origin: Vec3, dir: Vec3, params: &RaymarchParams) -> RayOutcome {
        let (t0, t1) = hit_box(origin, dir);
        if !(t0 <= t1) {
            return RayOutcome::Discarded;
        }
        let t0 = t0.max(0.0);

        let inc = dir.abs().recip();
        let delta = inc.min_element() / params.steps;
        let count = march_iterations(t0, t1, delta);
        let entry = origin + dir * t0;
        for i in 0..count {
            let p = entry + dir * (delta * i as f32);
            let coord = p + Vec3::splat(0.5);
            if self.field.sample(coord) > params.threshold {
                let rgb = self.field.normal(coord) * 0.5 + (p * 1.5 + Vec3::splat(0.25));
                return RayOutcome::Shaded([rgb.x, rgb.y, rgb.z, 1.0]);
            }
        }
        RayOutcome::Discarded
    }

    pub fn render(&self, width: u32, height: u32, frame: u64) -> Result<Vec<RayOutcome>, ConfigurationError> {
        let params = RaymarchParams::for_frame(frame, self.steps)?;
        let mut camera = self.camera;
        camera.aspect = width as f32 / height.max(1) as f32;
        let inv_view_proj = camera.view_proj().inverse();

        let mut pixels = vec![RayOutcome::Discarded; width as usize * height as usize];
        pixels
            .par_chunks_mut(width.max(1) as usize)
            .enumerate()
            .for_each(|(py, row)| {
                for (px, out) in row.iter_mut().enumerate() {
                    let (origin, dir) = camera.ray(&inv_view_proj, px as u32, py as u32, width, height);
                    *out = self.march(origin, dir, &params);
                }
            });
        Ok(pixels)
    }
}

/// Flattens marched pixels onto the background colour.
pub fn to_rgba8(pixels: &[RayOutcome]) -> Vec<[u8; 4]> {
    pixels
        .iter()
        .map(|outcome| match outcome {
            RayOutcome::Discarded => BACKGROUND,
            RayOutcome::Shaded(c) => [
                (c[0].clamp(0.0, 1.0) * 255.0) as u8,
                (c[1].clamp(0.0, 1.0) * 255.0) as u8,
                (c[2].clamp(0.0, 1.0) * 255.0) as u8,
                (c[3].clamp(0.0, 1.0) * 255.0) as u8,
            ],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_stays_in_band() {
        for frame in (0..5_000).step_by(37) {
            let t = threshold_at(frame);
            assert!(t >= 4.0 / TAU - 1e-6 && t <= 6.0 / TAU + 1e-6);
        }
    }

    #[test]
    fn axis_ray_hits_box_faces() {
        let (t0, t1) = hit_box(Vec3::new(0.0, 0.0, -2.0), Vec3::Z);
        assert!((t0 - 1.5).abs() < 1e-6);
        assert!((t1 - 2.5).abs() < 1e-6);
    }

    #[test]
    fn uniform_field_samples_to_constant() {
        let field = ScalarField::from_data(2, vec![255; 8]).unwrap();
        assert!((field.sample(Vec3::splat(0.3)) - 1.0).abs() < 1e-6);
        assert!((field.sample(Vec3::new(-4.0, 0.5, 9.0)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn face_normals_point_inward() {
        let field = ScalarField::from_data(2, vec![0; 8]).unwrap();
        assert_eq!(field.normal(Vec3::new(0.0, 0.5, 0.5)), Vec3::X);
        assert_eq!(field.normal(Vec3::new(0.5, 0.5, 1.0)), Vec3::NEG_Z);
    }

    #[test]
    fn iteration_count_is_bounded() {
        assert_eq!(march_iterations(0.0, 1.0, 0.25), 4);
        assert_eq!(march_iterations(0.0, 1.0, 1e-9), MAX_MARCH_ITERATIONS);
        assert_eq!(march_iterations(1.0, 0.5, 0.1), 0);
        assert_eq!(march_iterations(0.0, 1.0, f32::NAN), 0);
    }

    #[test]
    fn oversized_step_counts_are_rejected() {
        assert!(RaymarchParams::new(0.5, MAX_STEPS as f32).is_ok());
        assert_eq!(
            RaymarchParams::new(0.5, 100_000_000.0),
            Err(ConfigurationError::InvalidStepCount(100_000_000.0))
        );
        assert!(RaymarchParams::new(0.5, f32::INFINITY).is_err());
    }

    #[test]
    fn zero_steps_are_rejected() {
        assert_eq!(
            RaymarchParams::new(0.5, 0.0),
            Err(ConfigurationError::InvalidStepCount(0.0))
        );
    }
}
