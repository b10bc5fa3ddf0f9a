//! Display mapping for the automaton. Read-only with respect to the world:
//! nothing here feeds back into the simulation.

use rand::Rng;

use crate::automaton::{density_index, neighbor_density};
use crate::kernel::NeighborKernel;
use crate::world::{texel_is_alive, Texel};

pub const PALETTE: [[f32; 3]; 5] = [
    [0.96, 0.42, 0.26],
    [0.99, 0.78, 0.31],
    [0.36, 0.80, 0.62],
    [0.25, 0.52, 0.90],
    [0.62, 0.36, 0.86],
];

const ODD_FRAME_DIM: f32 = 0.92;
const DEAD_GLOW: f32 = 0.12;

/// Per-run palette parameters, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaletteParams {
    /// Ascending band edges in `[0, 1)`.
    pub steps: [f32; 4],
    /// Palette rotation in `[0, 1)`.
    pub seed: f32,
}

impl PaletteParams {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut steps: [f32; 4] = [rng.gen(), rng.gen(), rng.gen(), rng.gen()];
        steps.sort_by(|a, b| a.total_cmp(b));
        Self {
            steps,
            seed: rng.gen(),
        }
    }

    /// Palette entry for a density index.
    pub fn band(&self, index: u8) -> usize {
        let t = index as f32 / 255.0;
        let band = self.steps.iter().filter(|edge| **edge < t).count();
        let rotation = (self.seed.clamp(0.0, 0.999_999) * PALETTE.len() as f32) as usize;
        (band + rotation) % PALETTE.len()
    }
}

impl Default for PaletteParams {
    fn default() -> Self {
        Self {
            steps: [0.2, 0.4, 0.6, 0.8],
            seed: 0.0,
        }
    }
}

/// Display colour of one cell.
pub fn shade(alive: bool, index: u8, frame: u64, palette: &PaletteParams) -> Texel {
    let base = PALETTE[palette.band(index)];
    let scale = if alive {
        if frame % 2 == 1 {
            ODD_FRAME_DIM
        } else {
            1.0
        }
    } else {
        DEAD_GLOW * index as f32 / 255.0
    };
    [
        to_unorm(base[0] * scale),
        to_unorm(base[1] * scale),
        to_unorm(base[2] * scale),
        255,
    ]
}

/// Colours the whole grid for `frame`.
pub fn present(
    kernel: &NeighborKernel,
    cells: &[Texel],
    width: u32,
    height: u32,
    frame: u64,
    palette: &PaletteParams,
) -> Vec<Texel> {
    let mut image = Vec::with_capacity(cells.len());
    for y in 0..height {
        for x in 0..width {
            let alive = texel_is_alive(cells[y as usize * width as usize + x as usize]);
            let index = density_index(neighbor_density(kernel, cells, width, height, x, y));
            image.push(shade(alive, index, frame, palette));
        }
    }
    image
}

#[inline]
fn to_unorm(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5).floor() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_cell_without_neighbours_is_black() {
        assert_eq!(shade(false, 0, 0, &PaletteParams::default()), [0, 0, 0, 255]);
    }

    #[test]
    fn odd_frames_dim_live_cells() {
        let palette = PaletteParams::default();
        let even = shade(true, 128, 2, &palette);
        let odd = shade(true, 128, 3, &palette);
        assert!(odd[0] <= even[0] && odd[1] <= even[1] && odd[2] <= even[2]);
        assert_ne!(odd, even);
    }

    #[test]
    fn bands_follow_steps() {
        let palette = PaletteParams::default();
        assert_eq!(palette.band(0), 0);
        assert_eq!(palette.band(255), 4);
    }
}
