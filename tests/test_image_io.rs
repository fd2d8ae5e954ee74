use micrograph::io::{load_single, load_stack, save_png};
use micrograph::{MicrographError, Pipeline};
use image::{GrayImage, Luma, Rgb, RgbImage};
use ndarray::Array2;
use std::fs::File;
use tiff::encoder::{colortype, TiffEncoder};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write_stack(path: &std::path::Path, frames: usize, width: u32, height: u32) {
    let mut file = File::create(path).expect("Failed to create TIFF");
    let mut encoder = TiffEncoder::new(&mut file).expect("Failed to create TIFF encoder");
    for k in 0..frames {
        let data: Vec<u16> = (0..width * height).map(|i| (k as u32 * 1000 + i) as u16).collect();
        encoder
            .write_image::<colortype::Gray16>(width, height, &data)
            .expect("Failed to write TIFF page");
    }
}

#[test]
fn test_read_multi_page_stack() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.tif");
    write_stack(&path, 3, 5, 4);

    let stack = load_stack(&path).unwrap();
    assert_eq!(stack.dim(), (3, 4, 5));
    assert_eq!(stack[[0, 0, 0]], 0.0);
    assert_eq!(stack[[2, 1, 3]], 2008.0);
}

#[test]
fn test_single_page_tiff_is_not_a_stack() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("single.tif");
    write_stack(&path, 1, 5, 4);

    assert!(matches!(load_stack(&path), Err(MicrographError::UnexpectedShape(_))));
}

#[test]
fn test_read_grayscale_png() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.png");
    GrayImage::from_fn(6, 3, |x, y| Luma([(x * 10 + y) as u8])).save(&path).unwrap();

    let image = load_single(&path).unwrap();
    assert_eq!(image.dim(), (3, 6));
    assert_eq!(image[[2, 5]], 52.0);
}

#[test]
fn test_read_grayscale_jpeg() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.jpg");
    GrayImage::from_pixel(16, 8, Luma([120])).save(&path).unwrap();

    let image = load_single(&path).unwrap();
    assert_eq!(image.dim(), (8, 16));
    // Lossy, but a flat field survives within a few gray levels
    assert!(image.iter().all(|&v| (v - 120.0).abs() <= 3.0));
}

#[test]
fn test_color_png_is_unexpected_shape() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("color.png");
    RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])).save(&path).unwrap();

    assert!(matches!(load_single(&path), Err(MicrographError::UnexpectedShape(_))));
}

#[test]
fn test_missing_files() {
    init_logging();

    assert!(matches!(load_stack("/nonexistent/a.tif"), Err(MicrographError::DecodeError(_))));
    assert!(matches!(load_single("/nonexistent/a.png"), Err(MicrographError::DecodeError(_))));
}

#[test]
fn test_saved_result_reads_back_stretched() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("result.png");
    let result = Array2::from_shape_fn((4, 8), |(r, c)| (r * 8 + c) as f64 * 0.1 - 1.0);
    save_png(&result, &path).unwrap();

    let restored = load_single(&path).unwrap();
    assert_eq!(restored.dim(), (4, 8));
    assert_eq!(restored[[0, 0]], 0.0);
    assert_eq!(restored[[3, 7]], 255.0);
}

#[test]
fn test_pipeline_loads_and_keeps_previous_on_failure() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.tif");
    write_stack(&path, 4, 6, 6);

    let mut pipeline = Pipeline::new();
    assert_eq!(pipeline.load_stack(&path).unwrap().dim(), (4, 6, 6));

    let missing = dir.path().join("missing.tif");
    assert!(pipeline.load_stack(&missing).is_err());
    assert_eq!(pipeline.frame_count().unwrap(), 4);
}
