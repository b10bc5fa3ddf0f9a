use weighted_life::kernel::{NeighborKernel, KERNEL_SIZE};

#[test]
fn anti_diagonal_bands_carry_fixed_mass() {
    let kernel = NeighborKernel::generate();
    for d in 0..5 {
        let expected = (5 - d) as f32 / 15.0;
        let sum = kernel.diagonal_sum(d);
        assert!(
            (sum - expected).abs() < 1e-6,
            "diagonal {d}: got {sum}, expected {expected}"
        );
    }
}

#[test]
fn kernel_sums_to_one() {
    let kernel = NeighborKernel::generate();
    assert!((kernel.total() - 1.0).abs() < 1e-6);
}

#[test]
fn entries_past_main_anti_diagonal_are_zero() {
    let kernel = NeighborKernel::generate();
    for row in 0..KERNEL_SIZE {
        for col in 0..KERNEL_SIZE {
            let w = kernel.weight(row, col);
            assert!((0.0..=1.0).contains(&w));
            if row + col > 4 {
                assert_eq!(w, 0.0, "({row}, {col})");
            }
        }
    }
}

#[test]
fn band_entries_share_weight_evenly() {
    let kernel = NeighborKernel::generate();
    assert!((kernel.weight(0, 0) - 5.0 / 15.0).abs() < 1e-7);
    assert_eq!(kernel.weight(1, 0), kernel.weight(0, 1));
    assert_eq!(kernel.weight(2, 2), kernel.weight(4, 0));
    assert!((kernel.weight(2, 2) - 1.0 / 75.0).abs() < 1e-7);
}

#[test]
fn packed_layout_is_row_major() {
    let kernel = NeighborKernel::generate();
    let packed = kernel.packed();
    for i in 0..KERNEL_SIZE * KERNEL_SIZE {
        assert_eq!(packed[i / 4][i % 4], kernel.weight(i / KERNEL_SIZE, i % KERNEL_SIZE));
    }
    assert_eq!(packed[6][1..], [0.0, 0.0, 0.0]);
}
