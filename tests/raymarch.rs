use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use weighted_life::raymarch::{
    hit_box, to_rgba8, Camera, RayOutcome, RaymarchParams, ScalarField, VolumeRaymarcher,
    BACKGROUND, DEFAULT_FIELD_SIZE, DEFAULT_STEPS, MAX_STEPS,
};

fn raymarcher(data: Vec<u8>, size: u32) -> VolumeRaymarcher {
    let field = ScalarField::from_data(size, data).unwrap();
    let camera = Camera::new(Vec3::splat(2.0), 39.0, 1.0);
    VolumeRaymarcher::new(field, camera, DEFAULT_STEPS).unwrap()
}

#[test]
fn ray_missing_the_box_is_discarded() {
    let marcher = raymarcher(vec![255; 8], 2);
    let params = RaymarchParams::new(0.1, DEFAULT_STEPS as f32).unwrap();

    let origin = Vec3::new(3.0, 3.0, 0.0);
    let dir = Vec3::Z;
    let (near, far) = hit_box(origin, dir);
    assert!(near > far);
    assert_eq!(marcher.march(origin, dir, &params), RayOutcome::Discarded);
}

#[test]
fn ray_pointing_away_from_the_box_is_discarded() {
    let marcher = raymarcher(vec![255; 8], 2);
    let params = RaymarchParams::new(0.1, DEFAULT_STEPS as f32).unwrap();
    assert_eq!(
        marcher.march(Vec3::new(0.0, 0.0, 2.0), Vec3::Z, &params),
        RayOutcome::Discarded
    );
}

#[test]
fn full_field_shades_the_entry_face() {
    let marcher = raymarcher(vec![255; 8], 2);
    let params = RaymarchParams::new(0.5, DEFAULT_STEPS as f32).unwrap();
    match marcher.march(Vec3::new(0.0, 0.0, -2.0), Vec3::Z, &params) {
        RayOutcome::Shaded(rgba) => {
            // Entry point (0, 0, -0.5) lies on the z = 0 face, normal +Z.
            assert!((rgba[0] - 0.25).abs() < 1e-4);
            assert!((rgba[1] - 0.25).abs() < 1e-4);
            assert!((rgba[2] - (0.5 - 0.75 + 0.25)).abs() < 1e-4);
            assert_eq!(rgba[3], 1.0);
        }
        RayOutcome::Discarded => panic!("ray through a full field must hit"),
    }
}

#[test]
fn empty_field_discards_every_pixel() {
    let marcher = raymarcher(vec![0; 8], 2);
    let pixels = marcher.render(8, 6, 0).unwrap();
    assert_eq!(pixels.len(), 48);
    assert!(pixels.iter().all(|p| *p == RayOutcome::Discarded));
    assert!(to_rgba8(&pixels).iter().all(|p| *p == BACKGROUND));
}

#[test]
fn generated_field_renders_a_visible_surface() {
    let mut rng = StdRng::seed_from_u64(17);
    let field = ScalarField::generate(DEFAULT_FIELD_SIZE, &mut rng).unwrap();
    assert_eq!(field.data().len(), 40 * 40 * 40);

    let camera = Camera::new(Vec3::splat(2.0), 39.0, 1.0);
    let marcher = VolumeRaymarcher::new(field, camera, DEFAULT_STEPS).unwrap();
    let pixels = marcher.render(32, 32, 0).unwrap();
    let shaded = pixels
        .iter()
        .filter(|p| matches!(p, RayOutcome::Shaded(_)))
        .count();
    assert!(shaded > 0);
    // Corners look past the box.
    assert_eq!(pixels[0], RayOutcome::Discarded);
}

#[test]
fn mismatched_field_data_is_rejected() {
    assert!(ScalarField::from_data(3, vec![0; 8]).is_err());
    assert!(ScalarField::from_data(0, Vec::new()).is_err());
}

#[test]
fn march_with_tiny_delta_terminates() {
    let marcher = raymarcher(vec![0; 8], 2);
    // Built directly, bypassing the step-count check.
    let params = RaymarchParams {
        threshold: 2.0,
        steps: 100_000_000.0,
    };
    assert_eq!(
        marcher.march(Vec3::new(0.0, 0.0, -2.0), Vec3::Z, &params),
        RayOutcome::Discarded
    );
}

#[test]
fn largest_step_count_still_hits() {
    let field = ScalarField::from_data(2, vec![255; 8]).unwrap();
    let camera = Camera::new(Vec3::splat(2.0), 39.0, 1.0);
    let marcher = VolumeRaymarcher::new(field.clone(), camera, MAX_STEPS).unwrap();
    assert!(VolumeRaymarcher::new(field, camera, MAX_STEPS + 1).is_err());

    let params = RaymarchParams::new(0.5, MAX_STEPS as f32).unwrap();
    assert!(matches!(
        marcher.march(Vec3::new(0.0, 0.0, -2.0), Vec3::Z, &params),
        RayOutcome::Shaded(_)
    ));
}
