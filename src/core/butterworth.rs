use crate::core::fourier::{self, for_each_lane};
use crate::types::{
    ComplexSample, FilterDesign, FilterKind, FrequencyResponse, MicrographError,
    MicrographResult, Sample, SingleImage,
};
use ndarray::{Array2, Axis, Zip};
use std::f64::consts::PI;

/// Highest normalized cutoff, the Nyquist frequency in cycles/sample
pub const NYQUIST: Sample = 0.5;

/// Largest deviation from unit pass-band gain accepted without a warning
pub const PASSBAND_TOLERANCE: Sample = 1e-3;

/// Sampling rate used for the bilinear transform (cutoffs are normalized to Nyquist = 1)
const BILINEAR_FS: Sample = 2.0;

/// 2D Butterworth filter in one of the two supported realizations.
///
/// `SpatialRecursive` designs a 1D digital filter `(b, a)` and runs it
/// forward and backward along the row axis, then the column axis.
/// `FrequencyMask` multiplies the centered spectrum by a row-axis
/// Butterworth profile that is constant across columns.
#[derive(Debug, Clone)]
pub struct ButterworthFilter {
    cutoff: Sample,
    order: usize,
    kind: FilterKind,
    design: FilterDesign,
    b: Vec<Sample>,
    a: Vec<Sample>,
}

impl ButterworthFilter {
    /// Create a filter; `cutoff` is in cycles/sample and must lie in (0, 0.5]
    pub fn new(
        cutoff: Sample,
        order: usize,
        kind: FilterKind,
        design: FilterDesign,
    ) -> MicrographResult<Self> {
        if !cutoff.is_finite() || cutoff <= 0.0 || cutoff > NYQUIST {
            return Err(MicrographError::InvalidCutoff(cutoff));
        }
        if order < 1 {
            return Err(MicrographError::InvalidOrder(order));
        }

        let (b, a) = design_coefficients(cutoff, order, kind);
        log::debug!(
            "Designed order {} {} Butterworth at {:.4} cycles/sample: b={:?} a={:?}",
            order, kind, cutoff, b, a
        );

        let filter = Self {
            cutoff,
            order,
            kind,
            design,
            b,
            a,
        };

        if design == FilterDesign::SpatialRecursive && cutoff < NYQUIST {
            let gain = filter.passband_gain();
            if (gain - 1.0).abs() > PASSBAND_TOLERANCE {
                log::warn!(
                    "Order {} {} at {:.6} cycles/sample has pass-band gain {:.3e}; coefficients lost precision",
                    order, kind, cutoff, gain
                );
            }
        }

        Ok(filter)
    }

    pub fn low_pass(cutoff: Sample, order: usize, design: FilterDesign) -> MicrographResult<Self> {
        Self::new(cutoff, order, FilterKind::LowPass, design)
    }

    pub fn high_pass(cutoff: Sample, order: usize, design: FilterDesign) -> MicrographResult<Self> {
        Self::new(cutoff, order, FilterKind::HighPass, design)
    }

    pub fn cutoff(&self) -> Sample {
        self.cutoff
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn design(&self) -> FilterDesign {
        self.design
    }

    /// Digital transfer function `(b, a)` of the recursive design, `a[0] == 1`
    pub fn coefficients(&self) -> (&[Sample], &[Sample]) {
        (&self.b, &self.a)
    }

    /// Power gain along one axis at frequency `f` (cycles/sample).
    ///
    /// For the recursive design this is the squared magnitude of `(b, a)`,
    /// i.e. the response of the forward-backward pass.
    pub fn zero_phase_gain(&self, f: Sample) -> Sample {
        match self.design {
            FilterDesign::SpatialRecursive => {
                let z = ComplexSample::from_polar(1.0, -2.0 * PI * f);
                let num = evaluate_polynomial(&self.b, z);
                let den = evaluate_polynomial(&self.a, z);
                (num / den).norm_sqr()
            }
            FilterDesign::FrequencyMask => self.mask_gain(f),
        }
    }

    /// Power gain at the pass-band reference: DC for low-pass, Nyquist for high-pass.
    ///
    /// Very low cutoffs at high orders push the recursive coefficients past
    /// double precision and this drifts away from 1.
    pub fn passband_gain(&self) -> Sample {
        match self.kind {
            FilterKind::LowPass => self.zero_phase_gain(0.0),
            FilterKind::HighPass => self.zero_phase_gain(NYQUIST),
        }
    }

    fn mask_gain(&self, f: Sample) -> Sample {
        let low = 1.0 / (1.0 + (f.abs() / self.cutoff).powi(2 * self.order as i32));
        match self.kind {
            FilterKind::LowPass => low,
            FilterKind::HighPass => 1.0 - low,
        }
    }

    /// Response over a `rows x cols` grid in shifted coordinates (DC at the center).
    ///
    /// The mask design only varies along rows. The recursive design is
    /// separable, so its 2D response is the outer product of the per-axis gains.
    pub fn frequency_response(&self, rows: usize, cols: usize) -> MicrographResult<FrequencyResponse> {
        if rows == 0 || cols == 0 {
            return Err(MicrographError::InvalidShape { rows, cols });
        }

        let row_gain: Vec<Sample> = fourier::shifted_frequencies(rows)
            .into_iter()
            .map(|f| self.zero_phase_gain(f))
            .collect();

        let response = match self.design {
            FilterDesign::FrequencyMask => Array2::from_shape_fn((rows, cols), |(r, _)| row_gain[r]),
            FilterDesign::SpatialRecursive => {
                let col_gain: Vec<Sample> = fourier::shifted_frequencies(cols)
                    .into_iter()
                    .map(|f| self.zero_phase_gain(f))
                    .collect();
                Array2::from_shape_fn((rows, cols), |(r, c)| row_gain[r] * col_gain[c])
            }
        };
        Ok(response)
    }

    /// Filter an image, returning a new array of the same shape
    pub fn apply(&self, image: &SingleImage) -> MicrographResult<SingleImage> {
        let (rows, cols) = image.dim();
        if rows == 0 || cols == 0 {
            return Err(MicrographError::InvalidShape { rows, cols });
        }
        log::debug!(
            "Applying {} Butterworth ({:?}) to {}x{} image",
            self.kind, self.design, rows, cols
        );

        match self.design {
            FilterDesign::SpatialRecursive => Ok(self.apply_recursive(image)),
            FilterDesign::FrequencyMask => self.apply_mask(image),
        }
    }

    fn apply_recursive(&self, image: &SingleImage) -> SingleImage {
        let mut filtered = image.to_owned();
        for axis in [Axis(0), Axis(1)] {
            for_each_lane(&mut filtered, axis, |mut lane| {
                let smoothed = self.filtfilt(&lane.to_vec());
                lane.iter_mut().zip(smoothed).for_each(|(dst, src)| *dst = src);
            });
        }
        filtered
    }

    fn apply_mask(&self, image: &SingleImage) -> MicrographResult<SingleImage> {
        let (rows, cols) = image.dim();
        let mask = self.frequency_response(rows, cols)?;

        let mut spectrum = fourier::fftshift(&fourier::fft2(image));
        Zip::from(&mut spectrum).and(&mask).for_each(|bin, &gain| *bin *= gain);
        let restored = fourier::ifft2(&fourier::ifftshift(&spectrum));

        Ok(restored.mapv(|c| c.re))
    }

    /// Zero-phase forward-backward filtering of one signal.
    ///
    /// The signal is extended at both ends by odd reflection of up to
    /// `3 * taps` samples and both passes start from the steady-state
    /// response to the edge value.
    pub fn filtfilt(&self, x: &[Sample]) -> Vec<Sample> {
        let n = x.len();
        if n == 0 {
            return Vec::new();
        }

        let taps = self.b.len().max(self.a.len());
        let edge = (3 * taps).min(n - 1);

        let mut extended = Vec::with_capacity(n + 2 * edge);
        extended.extend((0..edge).map(|i| 2.0 * x[0] - x[edge - i]));
        extended.extend_from_slice(x);
        extended.extend((0..edge).map(|i| 2.0 * x[n - 1] - x[n - 2 - i]));

        let zi = steady_state(&self.b, &self.a);

        let scaled: Vec<Sample> = zi.iter().map(|z| z * extended[0]).collect();
        let mut y = lfilter(&self.b, &self.a, &extended, &scaled);

        y.reverse();
        let scaled: Vec<Sample> = zi.iter().map(|z| z * y[0]).collect();
        let mut y = lfilter(&self.b, &self.a, &y, &scaled);
        y.reverse();

        y[edge..edge + n].to_vec()
    }
}

/// Digital Butterworth `(b, a)` through the analog prototype and the
/// pre-warped bilinear transform
fn design_coefficients(cutoff: Sample, order: usize, kind: FilterKind) -> (Vec<Sample>, Vec<Sample>) {
    // A cutoff at Nyquist degenerates: low-pass passes everything, high-pass nothing
    if cutoff >= NYQUIST {
        return match kind {
            FilterKind::LowPass => (vec![1.0], vec![1.0]),
            FilterKind::HighPass => (vec![0.0], vec![1.0]),
        };
    }

    let wn = cutoff / NYQUIST;
    let warped = 2.0 * BILINEAR_FS * (PI * wn / BILINEAR_FS).tan();

    // Analog prototype: poles evenly spaced on the left half of the unit circle
    let n = order as Sample;
    let prototype: Vec<ComplexSample> = (0..order)
        .map(|i| {
            let m = -n + 1.0 + 2.0 * i as Sample;
            -ComplexSample::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect();

    let (zeros, poles, gain): (Vec<ComplexSample>, Vec<ComplexSample>, Sample) = match kind {
        FilterKind::LowPass => (
            Vec::new(),
            prototype.iter().map(|&p| p * warped).collect(),
            warped.powi(order as i32),
        ),
        FilterKind::HighPass => {
            let denom: ComplexSample = prototype.iter().map(|&p| -p).product();
            (
                vec![ComplexSample::new(0.0, 0.0); order],
                prototype.iter().map(|&p| warped / p).collect(),
                (ComplexSample::new(1.0, 0.0) / denom).re,
            )
        }
    };

    // Bilinear transform
    let fs2 = 2.0 * BILINEAR_FS;
    let mut digital_zeros: Vec<ComplexSample> = zeros.iter().map(|&z| (fs2 + z) / (fs2 - z)).collect();
    let digital_poles: Vec<ComplexSample> = poles.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();
    digital_zeros.resize(poles.len(), ComplexSample::new(-1.0, 0.0));

    let num: ComplexSample = zeros.iter().map(|&z| fs2 - z).product();
    let den: ComplexSample = poles.iter().map(|&p| fs2 - p).product();
    let digital_gain = gain * (num / den).re;

    let b = polynomial_from_roots(&digital_zeros)
        .into_iter()
        .map(|c| digital_gain * c.re)
        .collect();
    let a = polynomial_from_roots(&digital_poles)
        .into_iter()
        .map(|c| c.re)
        .collect();
    (b, a)
}

/// Monic polynomial coefficients (highest power first) with the given roots
fn polynomial_from_roots(roots: &[ComplexSample]) -> Vec<ComplexSample> {
    let mut coeffs = vec![ComplexSample::new(1.0, 0.0)];
    for &root in roots {
        let mut next = coeffs.clone();
        next.push(ComplexSample::new(0.0, 0.0));
        for i in 1..next.len() {
            next[i] -= root * coeffs[i - 1];
        }
        coeffs = next;
    }
    coeffs
}

/// Evaluate `c[0] + c[1]·z + c[2]·z² + ...`
fn evaluate_polynomial(coeffs: &[Sample], z: ComplexSample) -> ComplexSample {
    coeffs
        .iter()
        .rev()
        .fold(ComplexSample::new(0.0, 0.0), |acc, &c| acc * z + c)
}

/// Direct form II transposed IIR filter with initial state `zi`
fn lfilter(b: &[Sample], a: &[Sample], x: &[Sample], zi: &[Sample]) -> Vec<Sample> {
    let taps = b.len().max(a.len());
    let a0 = a[0];
    let coeff = |c: &[Sample], i: usize| c.get(i).copied().unwrap_or(0.0) / a0;

    let mut state = zi.to_vec();
    state.resize(taps - 1, 0.0);

    x.iter()
        .map(|&sample| {
            let y = coeff(b, 0) * sample + state.first().copied().unwrap_or(0.0);
            for i in 0..taps.saturating_sub(1) {
                let carry = if i + 1 < taps - 1 { state[i + 1] } else { 0.0 };
                state[i] = coeff(b, i + 1) * sample + carry - coeff(a, i + 1) * y;
            }
            y
        })
        .collect()
}

/// Filter state giving a unit-step steady state, solved from `(I - Aᵀ) zi = B`
fn steady_state(b: &[Sample], a: &[Sample]) -> Vec<Sample> {
    let taps = b.len().max(a.len());
    if taps < 2 {
        return Vec::new();
    }
    let a0 = a[0];
    let coeff = |c: &[Sample], i: usize| c.get(i).copied().unwrap_or(0.0) / a0;
    let size = taps - 1;

    let mut matrix = vec![vec![0.0; size]; size];
    let mut rhs = vec![0.0; size];
    for i in 0..size {
        matrix[i][i] = 1.0;
        matrix[i][0] += coeff(a, i + 1);
        if i + 1 < size {
            matrix[i][i + 1] = -1.0;
        }
        rhs[i] = coeff(b, i + 1) - coeff(a, i + 1) * coeff(b, 0);
    }

    solve_linear(matrix, rhs)
}

/// Gaussian elimination with partial pivoting
fn solve_linear(mut matrix: Vec<Vec<Sample>>, mut rhs: Vec<Sample>) -> Vec<Sample> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| matrix[i][col].abs().total_cmp(&matrix[j][col].abs()))
            .unwrap_or(col);
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);

        let diag = matrix[col][col];
        if diag == 0.0 {
            continue;
        }
        for row in col + 1..n {
            let factor = matrix[row][col] / diag;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: Sample = (row + 1..n).map(|k| matrix[row][k] * solution[k]).sum();
        let diag = matrix[row][row];
        solution[row] = if diag == 0.0 { 0.0 } else { (rhs[row] - tail) / diag };
    }
    solution
}
