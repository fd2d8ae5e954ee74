use micrograph::core::projection::{
    average_projection, combine_frames, min_max_projection, weighted_complex_average,
};
use micrograph::{CombinationMethod, MicrographError, StackImage};
use ndarray::{s, Array3};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic pseudo-random stack (LCG) so tests need no extra crates
fn noisy_stack(frames: usize, height: usize, width: usize) -> StackImage {
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    Array3::from_shape_simple_fn((frames, height, width), || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) as f64 / (1u64 << 31) as f64) * 200.0 - 100.0
    })
}

#[test]
fn test_projections_keep_spatial_shape() {
    init_logging();

    for (frames, height, width) in [(1, 1, 1), (2, 3, 5), (10, 7, 4)] {
        let stack = noisy_stack(frames, height, width);
        for method in [
            CombinationMethod::Average,
            CombinationMethod::MinMax,
            CombinationMethod::WeightedComplex,
        ] {
            let result = combine_frames(&stack, method).unwrap();
            assert_eq!(result.dim(), (height, width), "{} on {:?}", method, stack.dim());
        }
    }
}

#[test]
fn test_average_matches_manual_sum() {
    init_logging();

    let stack = noisy_stack(5, 6, 6);
    let result = average_projection(&stack).unwrap();
    for ((r, c), &v) in result.indexed_iter() {
        let mut expected = 0.0;
        for k in 0..5 {
            expected += stack[[k, r, c]];
        }
        assert!((v - expected).abs() < 1e-9);
    }

    let mut constant = Array3::zeros((2, 3, 3));
    constant.slice_mut(s![0, .., ..]).fill(3.0);
    constant.slice_mut(s![1, .., ..]).fill(5.0);
    assert!(average_projection(&constant).unwrap().iter().all(|&v| v == 8.0));
}

#[test]
fn test_min_max_and_weighted_are_non_negative() {
    init_logging();

    let stack = noisy_stack(7, 9, 9);
    assert!(min_max_projection(&stack).unwrap().iter().all(|&v| v >= 0.0));
    assert!(weighted_complex_average(&stack).unwrap().iter().all(|&v| v >= 0.0));
}

#[test]
fn test_weighted_single_frame_equals_abs() {
    init_logging();

    let stack = noisy_stack(1, 4, 4);
    let result = weighted_complex_average(&stack).unwrap();
    for ((r, c), &v) in result.indexed_iter() {
        assert_eq!(v, stack[[0, r, c]].abs());
    }
}

#[test]
fn test_weighted_suppresses_static_background() {
    init_logging();

    // Static background plus a blinking emitter at one pixel
    let frames = 10;
    let mut stack = Array3::from_elem((frames, 5, 5), 40.0);
    for k in 0..frames {
        let phase = k as f64 * 2.0 * std::f64::consts::PI / frames as f64;
        stack[[k, 2, 2]] += 6.0 * phase.cos();
    }

    let result = weighted_complex_average(&stack).unwrap();
    assert!((result[[2, 2]] - 30.0).abs() < 1e-9);
    assert!(result[[0, 0]] < 1e-9);
}

#[test]
fn test_empty_stack() {
    init_logging();

    let stack = StackImage::zeros((0, 2, 2));
    assert!(matches!(average_projection(&stack), Err(MicrographError::EmptyStack)));
    assert!(matches!(min_max_projection(&stack), Err(MicrographError::EmptyStack)));
    assert!(matches!(weighted_complex_average(&stack), Err(MicrographError::EmptyStack)));
}
