use crate::types::{
    CombinationMethod, ComplexSample, MicrographError, MicrographResult, Sample, SingleImage,
    StackImage,
};
use ndarray::{ArrayView1, Axis, Zip};
use std::f64::consts::PI;

/// Reduce a stack to a single image with the selected method
pub fn combine_frames(stack: &StackImage, method: CombinationMethod) -> MicrographResult<SingleImage> {
    let (frames, height, width) = stack.dim();
    log::info!(
        "Combining {} frames of {}x{} with {}",
        frames, height, width, method
    );

    let combined = match method {
        CombinationMethod::Average => average_projection(stack)?,
        CombinationMethod::MinMax => min_max_projection(stack)?,
        CombinationMethod::WeightedComplex => weighted_complex_average(stack)?,
    };

    log::info!("Frame combination completed");
    Ok(combined)
}

/// Per-pixel sum over the frame axis.
///
/// Note this is a plain sum, the result is not divided by the frame count.
pub fn average_projection(stack: &StackImage) -> MicrographResult<SingleImage> {
    check_frames(stack)?;
    Ok(reduce_frames(stack, |lane| lane.sum()))
}

/// Per-pixel difference between the brightest and the darkest frame
pub fn min_max_projection(stack: &StackImage) -> MicrographResult<SingleImage> {
    check_frames(stack)?;
    Ok(reduce_frames(stack, |lane| {
        let (min, max) = lane.iter().fold(
            (Sample::INFINITY, Sample::NEG_INFINITY),
            |(min, max), &v| (min.min(v), max.max(v)),
        );
        max - min
    }))
}

/// Magnitude of the sum of frames weighted by `exp(i·k·2π/C)`
pub fn weighted_complex_average(stack: &StackImage) -> MicrographResult<SingleImage> {
    check_frames(stack)?;
    let weights = complex_weights(stack.len_of(Axis(0)));
    log::debug!("Generated {} complex weights", weights.len());

    Ok(reduce_frames(stack, |lane| {
        lane.iter()
            .zip(weights.iter())
            .map(|(&value, &weight)| weight * value)
            .sum::<ComplexSample>()
            .norm()
    }))
}

/// C-th roots of unity, one full rotation spread over the frames
pub fn complex_weights(frames: usize) -> Vec<ComplexSample> {
    (0..frames)
        .map(|k| ComplexSample::from_polar(1.0, k as Sample * 2.0 * PI / frames as Sample))
        .collect()
}

fn check_frames(stack: &StackImage) -> MicrographResult<()> {
    if stack.len_of(Axis(0)) == 0 {
        return Err(MicrographError::EmptyStack);
    }
    Ok(())
}

/// Apply `f` to every pixel's frame lane, producing an (H, W) image
#[cfg(feature = "parallel")]
fn reduce_frames<F>(stack: &StackImage, f: F) -> SingleImage
where
    F: Fn(ArrayView1<Sample>) -> Sample + Sync + Send,
{
    Zip::from(stack.lanes(Axis(0))).par_map_collect(|lane| f(lane))
}

#[cfg(not(feature = "parallel"))]
fn reduce_frames<F>(stack: &StackImage, f: F) -> SingleImage
where
    F: Fn(ArrayView1<Sample>) -> Sample + Sync + Send,
{
    Zip::from(stack.lanes(Axis(0))).map_collect(|lane| f(lane))
}
