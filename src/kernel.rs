//! Fixed 5x5 neighbour weighting matrix.
//!
//! Weights are grouped by anti-diagonal `d = row + col`. The five bands
//! `d = 0..=4` carry `5/15, 4/15, 3/15, 2/15, 1/15` of the total mass, split
//! evenly between the `d + 1` entries that share a band. Entries past the
//! main anti-diagonal (`d > 4`) are zero, so the matrix sums to one and the
//! heaviest weight sits in the `(0, 0)` corner.

pub const KERNEL_SIZE: usize = 5;
pub const KERNEL_CELLS: usize = KERNEL_SIZE * KERNEL_SIZE;

const BAND_TOTAL: f32 = 15.0; // 5 + 4 + 3 + 2 + 1

/// Every weight is an integer multiple of `1 / WEIGHT_DENOMINATOR`
/// (300, 120, 60, 30 and 12 units per band), so every density is too.
pub const WEIGHT_DENOMINATOR: u32 = 900;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborKernel {
    weights: [[f32; KERNEL_SIZE]; KERNEL_SIZE],
}

impl NeighborKernel {
    pub fn generate() -> Self {
        let mut weights = [[0.0f32; KERNEL_SIZE]; KERNEL_SIZE];
        for (row, line) in weights.iter_mut().enumerate() {
            for (col, weight) in line.iter_mut().enumerate() {
                *weight = band_weight(row + col);
            }
        }
        Self { weights }
    }

    #[inline]
    pub fn weight(&self, row: usize, col: usize) -> f32 {
        self.weights[row][col]
    }

    pub fn rows(&self) -> &[[f32; KERNEL_SIZE]; KERNEL_SIZE] {
        &self.weights
    }

    /// Sum of the entries on anti-diagonal `d`.
    pub fn diagonal_sum(&self, d: usize) -> f32 {
        let mut sum = 0.0;
        for row in 0..KERNEL_SIZE {
            if d >= row && d - row < KERNEL_SIZE {
                sum += self.weights[row][d - row];
            }
        }
        sum
    }

    pub fn total(&self) -> f32 {
        self.weights.iter().flatten().sum()
    }

    /// Row-major weights packed four to a `vec4`, the layout WGSL uniform
    /// arrays require.
    pub fn packed(&self) -> [[f32; 4]; 7] {
        let mut packed = [[0.0f32; 4]; 7];
        for (i, weight) in self.weights.iter().flatten().enumerate() {
            packed[i / 4][i % 4] = *weight;
        }
        packed
    }
}

impl Default for NeighborKernel {
    fn default() -> Self {
        Self::generate()
    }
}

fn band_weight(d: usize) -> f32 {
    if d >= KERNEL_SIZE {
        return 0.0;
    }
    (KERNEL_SIZE - d) as f32 / BAND_TOTAL / (d + 1) as f32
}
