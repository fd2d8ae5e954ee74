//! 2D Fourier transforms, spectrum shifting and lane helpers shared by the
//! frequency-domain filter and the spectrum display

use crate::types::{ComplexSample, MicrographError, MicrographResult, Sample, SingleImage};
use ndarray::{Array2, ArrayViewMut1, Axis, Zip};
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Forward 2D FFT of a real image (unnormalized, DC at index [0, 0])
pub fn fft2(image: &SingleImage) -> Array2<ComplexSample> {
    let mut data = image.mapv(|v| ComplexSample::new(v, 0.0));
    transform_2d(&mut data, false);
    data
}

/// Inverse 2D FFT, scaled by 1/(rows·cols) so that `ifft2(fft2(x)) == x`
pub fn ifft2(spectrum: &Array2<ComplexSample>) -> Array2<ComplexSample> {
    let mut data = spectrum.to_owned();
    transform_2d(&mut data, true);
    let scale = 1.0 / data.len().max(1) as Sample;
    data.mapv_inplace(|c| c * scale);
    data
}

fn transform_2d(data: &mut Array2<ComplexSample>, inverse: bool) {
    let (rows, cols) = data.dim();
    if rows == 0 || cols == 0 {
        return;
    }

    let mut planner = FftPlanner::<Sample>::new();
    let (row_fft, col_fft) = if inverse {
        (planner.plan_fft_inverse(cols), planner.plan_fft_inverse(rows))
    } else {
        (planner.plan_fft_forward(cols), planner.plan_fft_forward(rows))
    };

    fft_lanes(data, Axis(1), &row_fft);
    fft_lanes(data, Axis(0), &col_fft);
}

fn fft_lanes(data: &mut Array2<ComplexSample>, axis: Axis, fft: &Arc<dyn Fft<Sample>>) {
    for_each_lane(data, axis, |mut lane| {
        let mut buffer = lane.to_vec();
        fft.process(&mut buffer);
        lane.iter_mut().zip(buffer).for_each(|(dst, src)| *dst = src);
    });
}

/// Run `f` on every 1D lane of `data` along `axis`
#[cfg(feature = "parallel")]
pub(crate) fn for_each_lane<T, F>(data: &mut Array2<T>, axis: Axis, f: F)
where
    T: Send,
    F: Fn(ArrayViewMut1<T>) + Sync + Send,
{
    Zip::from(data.lanes_mut(axis)).par_for_each(|lane| f(lane));
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn for_each_lane<T, F>(data: &mut Array2<T>, axis: Axis, f: F)
where
    T: Send,
    F: Fn(ArrayViewMut1<T>) + Sync + Send,
{
    Zip::from(data.lanes_mut(axis)).for_each(|lane| f(lane));
}

/// Move the zero-frequency bin to the geometric center
pub fn fftshift<T: Clone>(data: &Array2<T>) -> Array2<T> {
    let (rows, cols) = data.dim();
    roll(data, rows / 2, cols / 2)
}

/// Inverse of [`fftshift`], also for odd dimensions
pub fn ifftshift<T: Clone>(data: &Array2<T>) -> Array2<T> {
    let (rows, cols) = data.dim();
    roll(data, rows - rows / 2, cols - cols / 2)
}

/// Circular shift: element [i, j] moves to [(i + by_rows) % rows, (j + by_cols) % cols]
fn roll<T: Clone>(data: &Array2<T>, by_rows: usize, by_cols: usize) -> Array2<T> {
    let (rows, cols) = data.dim();
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        data[[(i + rows - by_rows % rows) % rows, (j + cols - by_cols % cols) % cols]].clone()
    })
}

/// Frequency (cycles/sample) of every bin after [`fftshift`], spanning [-0.5, 0.5)
pub fn shifted_frequencies(n: usize) -> Vec<Sample> {
    let half = (n / 2) as isize;
    (0..n as isize)
        .map(|k| (k - half) as Sample / n as Sample)
        .collect()
}

/// Centered log-magnitude spectrum scaled to [0, 1], ready for display
pub fn magnitude_spectrum(image: &SingleImage) -> MicrographResult<SingleImage> {
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return Err(MicrographError::InvalidShape { rows, cols });
    }
    log::debug!("Computing magnitude spectrum of {}x{} image", rows, cols);

    let spectrum = fftshift(&fft2(image));
    let log_magnitude = spectrum.mapv(|c| c.norm().ln_1p());
    Ok(normalize_unit_range(&log_magnitude))
}

/// Linearly rescale to [0, 1]; a flat image maps to all zeros
pub fn normalize_unit_range(image: &SingleImage) -> SingleImage {
    let (min, max) = image
        .iter()
        .filter(|v| v.is_finite())
        .fold((Sample::INFINITY, Sample::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return Array2::zeros(image.dim());
    }
    image.mapv(|v| if v.is_finite() { (v - min) / range } else { 0.0 })
}
