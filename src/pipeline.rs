//! Processing session that binds the loaded inputs to the core operations

use crate::core::demodulation::{DemodulationResult, FourierDemodulator};
use crate::core::{fourier, projection};
use crate::io::ImageReader;
use crate::types::{
    CombinationMethod, DemodulationParams, FilterDesign, MicrographError, MicrographResult,
    SingleImage, StackImage,
};
use ndarray::Axis;
use std::path::Path;

/// Holds at most one stack and one single image, bound independently.
///
/// Every operation validates its inputs when called and returns new arrays;
/// bound data is never modified.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stack: Option<StackImage>,
    image: Option<SingleImage>,
    design: FilterDesign,
}

impl Pipeline {
    /// Create an empty pipeline using the recursive filter design
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter_design(design: FilterDesign) -> Self {
        Self {
            design,
            ..Self::default()
        }
    }

    pub fn filter_design(&self) -> FilterDesign {
        self.design
    }

    pub fn set_filter_design(&mut self, design: FilterDesign) {
        log::debug!("Filter design set to {:?}", design);
        self.design = design;
    }

    /// Bind a (frame, row, col) stack, replacing any previous one
    pub fn bind_stack(&mut self, stack: StackImage) {
        let (frames, height, width) = stack.dim();
        log::info!("Bound stack of {} frames, {}x{}", frames, height, width);
        self.stack = Some(stack);
    }

    /// Bind a (row, col) image, replacing any previous one
    pub fn bind_image(&mut self, image: SingleImage) {
        log::info!("Bound {}x{} image", image.nrows(), image.ncols());
        self.image = Some(image);
    }

    /// Decode a TIFF stack from disk and bind it; the previous stack survives a failed load
    pub fn load_stack<P: AsRef<Path>>(&mut self, path: P) -> MicrographResult<&StackImage> {
        let stack = ImageReader::new(path).read_stack()?;
        Ok(self.stack.insert(stack))
    }

    /// Decode a single image from disk and bind it; the previous image survives a failed load
    pub fn load_image<P: AsRef<Path>>(&mut self, path: P) -> MicrographResult<&SingleImage> {
        let image = ImageReader::new(path).read_single()?;
        Ok(self.image.insert(image))
    }

    pub fn stack(&self) -> Option<&StackImage> {
        self.stack.as_ref()
    }

    pub fn image(&self) -> Option<&SingleImage> {
        self.image.as_ref()
    }

    pub fn unbind_stack(&mut self) -> Option<StackImage> {
        self.stack.take()
    }

    pub fn unbind_image(&mut self) -> Option<SingleImage> {
        self.image.take()
    }

    fn bound_stack(&self) -> MicrographResult<&StackImage> {
        self.stack.as_ref().ok_or(MicrographError::NoInputBound("stack"))
    }

    fn bound_image(&self) -> MicrographResult<&SingleImage> {
        self.image.as_ref().ok_or(MicrographError::NoInputBound("single image"))
    }

    /// Number of frames in the bound stack
    pub fn frame_count(&self) -> MicrographResult<usize> {
        Ok(self.bound_stack()?.len_of(Axis(0)))
    }

    /// Copy of one frame of the bound stack, for previewing
    pub fn frame(&self, index: usize) -> MicrographResult<SingleImage> {
        let stack = self.bound_stack()?;
        let frames = stack.len_of(Axis(0));
        if index >= frames {
            return Err(MicrographError::FrameOutOfRange { index, frames });
        }
        Ok(stack.index_axis(Axis(0), index).to_owned())
    }

    /// Reduce the bound stack with one of the frame combination methods
    pub fn combine_frames(&self, method: CombinationMethod) -> MicrographResult<SingleImage> {
        projection::combine_frames(self.bound_stack()?, method)
    }

    /// Demodulate the bound image with the pipeline's filter design
    pub fn demodulate(&self, period: usize, order: usize) -> MicrographResult<DemodulationResult> {
        self.demodulate_with(&DemodulationParams {
            period,
            order,
            design: self.design,
        })
    }

    /// Demodulate the bound image with explicit parameters
    pub fn demodulate_with(&self, params: &DemodulationParams) -> MicrographResult<DemodulationResult> {
        let image = self.bound_image()?;
        FourierDemodulator::with_params(params.clone()).demodulate(image)
    }

    /// Normalized magnitude spectrum of the bound image
    pub fn image_spectrum(&self) -> MicrographResult<SingleImage> {
        fourier::magnitude_spectrum(self.bound_image()?)
    }
}
