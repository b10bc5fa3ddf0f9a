//! Per-cell automaton rule.
//!
//! Each cell looks at its 5x5 toroidal window, weights every live neighbour
//! with the matching [`NeighborKernel`] entry, and quantises the resulting
//! density to a byte. The top three bits of that byte select the rule bit
//! tested against the born or survive mask. `shaders/life.wgsl` evaluates
//! the exact same function on the GPU.

use rayon::prelude::*;

use crate::kernel::{NeighborKernel, KERNEL_SIZE, WEIGHT_DENOMINATOR};
use crate::rule::RuleMask;
use crate::world::{texel_for, texel_is_alive, wrap_coord, Texel};

const RADIUS: i64 = (KERNEL_SIZE / 2) as i64;

/// Grid cells read by `(x, y)`, in kernel order, paired with their weight.
/// The window center is skipped.
pub fn neighbor_samples(
    kernel: &NeighborKernel,
    width: u32,
    height: u32,
    x: u32,
    y: u32,
) -> impl Iterator<Item = ((u32, u32), f32)> + '_ {
    (0..KERNEL_SIZE)
        .flat_map(|row| (0..KERNEL_SIZE).map(move |col| (row, col)))
        .filter(|&(row, col)| !(row == KERNEL_SIZE / 2 && col == KERNEL_SIZE / 2))
        .map(move |(row, col)| {
            let dx = col as i64 - RADIUS;
            let dy = row as i64 - RADIUS;
            let cell = wrap_coord(x as i64 + dx, y as i64 + dy, width, height);
            (cell, kernel.weight(row, col))
        })
}

/// Weighted live-neighbour density in `[0, 1]`.
pub fn neighbor_density(
    kernel: &NeighborKernel,
    cells: &[Texel],
    width: u32,
    height: u32,
    x: u32,
    y: u32,
) -> f32 {
    let mut density = 0.0f32;
    for ((nx, ny), weight) in neighbor_samples(kernel, width, height, x, y) {
        let idx = ny as usize * width as usize + nx as usize;
        if texel_is_alive(cells[idx]) {
            density += weight;
        }
    }
    density
}

/// Quantises a density to the byte index `n = floor(density * 255 + 0.5)`.
///
/// The density is first snapped to whole kernel units, then rounded with
/// integer arithmetic, so float summation order cannot move `n`.
#[inline]
pub fn density_index(density: f32) -> u8 {
    let units = (density.clamp(0.0, 1.0) * WEIGHT_DENOMINATOR as f32).round() as u32;
    ((units * 510 + WEIGHT_DENOMINATOR) / (2 * WEIGHT_DENOMINATOR)) as u8
}

/// Rule bit addressed by a density index.
#[inline]
pub fn rule_bit(index: u8) -> u8 {
    index >> 5
}

/// Next state of a single cell. Born is checked before survive.
#[inline]
pub fn next_state(alive: bool, index: u8, rule: RuleMask) -> bool {
    let bit = rule_bit(index);
    if !alive && rule.is_born(bit) {
        true
    } else {
        alive && rule.survives(bit)
    }
}

/// Index `n` every cell sees in `cells`.
pub fn density_indices(
    kernel: &NeighborKernel,
    cells: &[Texel],
    width: u32,
    height: u32,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(cells.len());
    for y in 0..height {
        for x in 0..width {
            out.push(density_index(neighbor_density(kernel, cells, width, height, x, y)));
        }
    }
    out
}

/// One generation: reads only `current`, writes every cell of `next`.
pub fn step(
    kernel: &NeighborKernel,
    rule: RuleMask,
    width: u32,
    height: u32,
    current: &[Texel],
    next: &mut [Texel],
) {
    let row_len = width as usize;
    assert_eq!(current.len(), row_len * height as usize);
    assert_eq!(next.len(), current.len());

    next.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let alive = texel_is_alive(current[y * row_len + x]);
                let density = neighbor_density(kernel, current, width, height, x as u32, y as u32);
                *out = texel_for(next_state(alive, density_index(density), rule));
            }
        });
}
