use crate::types::{MicrographError, MicrographResult, Sample, SingleImage, StackImage};
use image::DynamicImage;
use ndarray::{Array2, Array3};
use num_traits::AsPrimitive;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;

/// Reader for microscope acquisitions on disk
pub struct ImageReader {
    path: PathBuf,
}

impl ImageReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode a multi-page grayscale TIFF into a (frame, row, col) stack.
    ///
    /// A single-page file decodes to a 2D image and is rejected as
    /// `UnexpectedShape`; all pages must share the same dimensions.
    pub fn read_stack(&self) -> MicrographResult<StackImage> {
        log::info!("Reading TIFF stack: {}", self.path.display());

        let file = File::open(&self.path).map_err(|e| self.decode_error(e))?;
        let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| self.decode_error(e))?;

        let mut frames: Vec<Vec<Sample>> = Vec::new();
        let mut frame_shape: Option<(usize, usize)> = None;

        loop {
            let index = frames.len();
            let (width, height) = decoder.dimensions().map_err(|e| self.decode_error(e))?;
            let shape = (height as usize, width as usize);

            let color = decoder.colortype().map_err(|e| self.decode_error(e))?;
            if !matches!(color, ColorType::Gray(_)) {
                return Err(MicrographError::UnexpectedShape(format!(
                    "page {} of {} is {:?}, expected single-channel grayscale",
                    index,
                    self.path.display(),
                    color
                )));
            }

            match frame_shape {
                None => frame_shape = Some(shape),
                Some(expected) if expected != shape => {
                    return Err(MicrographError::UnexpectedShape(format!(
                        "page {} is {}x{} but page 0 is {}x{}",
                        index, shape.0, shape.1, expected.0, expected.1
                    )));
                }
                Some(_) => {}
            }

            let decoded = decoder.read_image().map_err(|e| self.decode_error(e))?;
            frames.push(decoding_to_samples(decoded)?);
            log::debug!("Decoded page {} ({}x{})", index, shape.0, shape.1);

            if !decoder.more_images() {
                break;
            }
            decoder.next_image().map_err(|e| self.decode_error(e))?;
        }

        let (height, width) = frame_shape.unwrap_or((0, 0));
        if frames.len() < 2 {
            return Err(MicrographError::UnexpectedShape(format!(
                "{} holds a single {}x{} page, expected a 3D (frame, row, col) stack",
                self.path.display(),
                height,
                width
            )));
        }

        let count = frames.len();
        let data: Vec<Sample> = frames.into_iter().flatten().collect();
        let stack = Array3::from_shape_vec((count, height, width), data).map_err(|e| {
            MicrographError::UnexpectedShape(format!("sample count does not match page size: {}", e))
        })?;

        log::info!("Loaded stack of {} frames, {}x{}", count, height, width);
        Ok(stack)
    }

    /// Decode a single-channel image (PNG, JPEG, or the first page of a TIFF) into (row, col)
    pub fn read_single(&self) -> MicrographResult<SingleImage> {
        log::info!("Reading image: {}", self.path.display());

        let decoded = image::open(&self.path).map_err(|e| self.decode_error(e))?;
        let (width, height) = (decoded.width() as usize, decoded.height() as usize);

        let samples = match decoded {
            DynamicImage::ImageLuma8(buffer) => samples_to_f64(buffer.into_raw()),
            DynamicImage::ImageLuma16(buffer) => samples_to_f64(buffer.into_raw()),
            other => {
                let color = other.color();
                return Err(MicrographError::UnexpectedShape(format!(
                    "{} is {:?} with {} channels, expected a 2D grayscale image",
                    self.path.display(),
                    color,
                    color.channel_count()
                )));
            }
        };

        let image = Array2::from_shape_vec((height, width), samples).map_err(|e| {
            MicrographError::UnexpectedShape(format!("sample count does not match image size: {}", e))
        })?;

        log::info!("Loaded {}x{} image", height, width);
        Ok(image)
    }

    fn decode_error<E: std::fmt::Display>(&self, err: E) -> MicrographError {
        MicrographError::DecodeError(format!("{}: {}", self.path.display(), err))
    }
}

/// Convenience wrapper for [`ImageReader::read_stack`]
pub fn load_stack<P: AsRef<Path>>(path: P) -> MicrographResult<StackImage> {
    ImageReader::new(path).read_stack()
}

/// Convenience wrapper for [`ImageReader::read_single`]
pub fn load_single<P: AsRef<Path>>(path: P) -> MicrographResult<SingleImage> {
    ImageReader::new(path).read_single()
}

fn samples_to_f64<T: AsPrimitive<Sample>>(values: Vec<T>) -> Vec<Sample> {
    values.into_iter().map(|v| v.as_()).collect()
}

fn decoding_to_samples(decoded: DecodingResult) -> MicrographResult<Vec<Sample>> {
    #[allow(unreachable_patterns)]
    let samples = match decoded {
        DecodingResult::U8(v) => samples_to_f64(v),
        DecodingResult::U16(v) => samples_to_f64(v),
        DecodingResult::U32(v) => samples_to_f64(v),
        DecodingResult::U64(v) => samples_to_f64(v),
        DecodingResult::I8(v) => samples_to_f64(v),
        DecodingResult::I16(v) => samples_to_f64(v),
        DecodingResult::I32(v) => samples_to_f64(v),
        DecodingResult::I64(v) => samples_to_f64(v),
        DecodingResult::F32(v) => samples_to_f64(v),
        DecodingResult::F64(v) => v,
        _ => {
            return Err(MicrographError::DecodeError(
                "unsupported TIFF sample format".to_string(),
            ))
        }
    };
    Ok(samples)
}
