use levsar::core::cube::{CubeParams, FrameData, InsarCube, SelectionMode};
use levsar::io::insar::InsarCubeReader;
use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use ndarray::{Array2, Array3};
use std::path::PathBuf;

fn small_cube() -> InsarCube {
    // 3 epochs of 2 x 2 pixels; slice k holds k * (pixel index + 1)
    let displacement = Array3::from_shape_fn((3, 2, 2), |(k, r, c)| (k * (r * 2 + c + 1)) as f64);
    let lon = Array2::from_shape_fn((2, 2), |(_, c)| -115.5 + 0.001 * c as f64);
    let lat = Array2::from_shape_fn((2, 2), |(r, _)| 33.0 + 0.001 * r as f64);
    InsarCube::from_day_offsets(
        CubeParams::default().day0,
        &[0.0, 12.7, 24.0],
        lon,
        lat,
        displacement,
    )
    .unwrap()
}

#[test]
fn test_epochs_from_day_offsets() {
    let cube = small_cube();
    assert_eq!(
        cube.epochs(),
        &[
            NaiveDate::from_ymd_opt(2009, 4, 24).unwrap(),
            NaiveDate::from_ymd_opt(2009, 5, 6).unwrap(),
            NaiveDate::from_ymd_opt(2009, 5, 18).unwrap(),
        ]
    );
    assert_eq!(cube.shape(), (2, 2));
}

#[test]
fn test_cumulative_frames() {
    let frames = small_cube().select(&[0, 2], SelectionMode::Cumulative).unwrap();
    assert_eq!(frames.len(), 2);
    assert!(frames[0].grid().unwrap().iter().all(|&v| v == 0.0));
    assert_eq!(frames[1].index, 2);
    assert_eq!(frames[1].grid().unwrap()[[1, 1]], 8.0);
}

#[test]
fn test_incremental_frames() {
    let frames = small_cube()
        .select(&[0, 1, 2], SelectionMode::Incremental)
        .unwrap();
    assert_eq!(frames[0].data, FrameData::NotComputable);
    assert!(!frames[0].is_computable());
    // increments are slice[k] - slice[k-1] = pixel index + 1
    assert_eq!(frames[1].grid().unwrap()[[0, 1]], 2.0);
    assert_eq!(frames[2].grid().unwrap()[[1, 0]], 3.0);
}

#[test]
fn test_bad_selection() {
    let cube = small_cube();
    assert!(cube.select(&[2, 1], SelectionMode::Cumulative).is_err());
    assert!(cube.select(&[0, 3], SelectionMode::Incremental).is_err());
}

#[test]
fn test_shape_mismatch() {
    let result = InsarCube::from_day_offsets(
        CubeParams::default().day0,
        &[0.0, 12.0],
        Array2::zeros((2, 2)),
        Array2::zeros((2, 2)),
        Array3::zeros((3, 2, 2)),
    );
    assert!(result.is_err());
}

#[test]
fn test_displacement_between_and_ramp() {
    let field = small_cube().displacement_between(0, 2).unwrap();
    assert_eq!(field.len(), 4);
    assert_eq!(field.los, vec![2.0, 4.0, 6.0, 8.0]);

    // a field that is a pure plane has nothing left after ramp removal
    let flat = field.remove_ramp().unwrap();
    for v in &flat.los {
        assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-6);
    }
    assert_eq!(field.flip_los_sign().los[3], -8.0);
}

#[test]
fn test_read_cube_from_disk() {
    let _ = env_logger::builder().is_test(true).try_init();

    // Skip test unless a time-series cube is provided
    let dir = match std::env::var("LEVSAR_TEST_CUBE_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            println!("LEVSAR_TEST_CUBE_DIR not set, skipping test");
            return;
        }
    };
    let cube_path = dir.join("TS.grd");
    let lon_path = dir.join("lon.grd");
    let lat_path = dir.join("lat.grd");
    if !cube_path.exists() || !lon_path.exists() || !lat_path.exists() {
        println!("Test data not found, skipping test");
        return;
    }

    let cube = InsarCubeReader::read(&cube_path, &lon_path, &lat_path, &CubeParams::default())
        .expect("Failed to read cube");
    println!("Cube: {} epochs, shape {:?}", cube.n_epochs(), cube.shape());
    assert!(cube.n_epochs() > 0);
    assert!(cube.epochs().windows(2).all(|w| w[0] <= w[1]));
}
