use crate::core::fourier::normalize_unit_range;
use crate::types::{MicrographError, MicrographResult, SingleImage};
use image::{GrayImage, ImageFormat};
use std::path::Path;

/// Stretch an image linearly onto [0, 1]; a flat image maps to zeros
pub fn normalize_for_display(image: &SingleImage) -> SingleImage {
    normalize_unit_range(image)
}

/// Min-max scale an image to 8-bit gray levels
pub fn to_gray8(image: &SingleImage) -> MicrographResult<GrayImage> {
    let (height, width) = image.dim();
    let pixels: Vec<u8> = normalize_for_display(image)
        .iter()
        .map(|v| (v * 255.0).round() as u8)
        .collect();

    GrayImage::from_raw(width as u32, height as u32, pixels).ok_or_else(|| {
        MicrographError::EncodeError(format!("cannot build a {}x{} gray image", height, width))
    })
}

/// Save any result array as a grayscale PNG, stretched to the full 8-bit range
pub fn save_png<P: AsRef<Path>>(image: &SingleImage, path: P) -> MicrographResult<()> {
    let path = path.as_ref();
    log::info!("Saving {}x{} image to {}", image.nrows(), image.ncols(), path.display());

    to_gray8(image)?
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| MicrographError::EncodeError(format!("{}: {}", path.display(), e)))
}
