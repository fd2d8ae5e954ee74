use crate::core::butterworth::{ButterworthFilter, NYQUIST};
use crate::types::{
    DemodulationParams, FilterDesign, MicrographError, MicrographResult, Sample, SingleImage,
};
use ndarray::{Array2, Zip};
use std::f64::consts::PI;

/// Ceiling for the carrier-derived cutoff.
///
/// A one-pixel period puts `1/T` beyond Nyquist; the cutoff is pinned here
/// instead. A two-pixel period lands exactly on Nyquist and is passed through.
pub const MAX_CARRIER_CUTOFF: Sample = 0.45;

/// Intermediate products of the demodulator, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemodulationStage {
    HighPass,
    AMix,
    BMix,
    ALowPass,
    BLowPass,
    Final,
}

impl DemodulationStage {
    pub const ALL: [DemodulationStage; 6] = [
        DemodulationStage::HighPass,
        DemodulationStage::AMix,
        DemodulationStage::BMix,
        DemodulationStage::ALowPass,
        DemodulationStage::BLowPass,
        DemodulationStage::Final,
    ];
}

impl std::fmt::Display for DemodulationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DemodulationStage::HighPass => write!(f, "High-pass filtered"),
            DemodulationStage::AMix => write!(f, "A mix (cosine)"),
            DemodulationStage::BMix => write!(f, "B mix (sine)"),
            DemodulationStage::ALowPass => write!(f, "A low-pass"),
            DemodulationStage::BLowPass => write!(f, "B low-pass"),
            DemodulationStage::Final => write!(f, "Demodulated"),
        }
    }
}

/// All six artifacts of one demodulation run
#[derive(Debug, Clone)]
pub struct DemodulationResult {
    pub high_pass: SingleImage,
    pub a_mix: SingleImage,
    pub b_mix: SingleImage,
    pub a_low_pass: SingleImage,
    pub b_low_pass: SingleImage,
    pub final_image: SingleImage,
}

impl DemodulationResult {
    pub fn stage(&self, stage: DemodulationStage) -> &SingleImage {
        match stage {
            DemodulationStage::HighPass => &self.high_pass,
            DemodulationStage::AMix => &self.a_mix,
            DemodulationStage::BMix => &self.b_mix,
            DemodulationStage::ALowPass => &self.a_low_pass,
            DemodulationStage::BLowPass => &self.b_low_pass,
            DemodulationStage::Final => &self.final_image,
        }
    }

    /// Stages paired with their arrays, in pipeline order
    pub fn iter(&self) -> impl Iterator<Item = (DemodulationStage, &SingleImage)> {
        DemodulationStage::ALL
            .into_iter()
            .map(move |stage| (stage, self.stage(stage)))
    }

    /// `(high_pass, a_mix, b_mix, a_low_pass, b_low_pass, final)`
    pub fn into_tuple(
        self,
    ) -> (SingleImage, SingleImage, SingleImage, SingleImage, SingleImage, SingleImage) {
        (
            self.high_pass,
            self.a_mix,
            self.b_mix,
            self.a_low_pass,
            self.b_low_pass,
            self.final_image,
        )
    }
}

/// Cutoff (cycles/sample) used for a carrier of `period` pixels on a `rows x cols` image
pub fn carrier_cutoff(period: usize, rows: usize, cols: usize) -> MicrographResult<Sample> {
    if period == 0 {
        return Err(MicrographError::InvalidCutoff(Sample::INFINITY));
    }
    if period > 2 * rows.max(cols) {
        return Err(MicrographError::InvalidCutoff(1.0 / period as Sample));
    }
    let cutoff = 1.0 / period as Sample;
    if cutoff > NYQUIST {
        log::warn!(
            "Carrier period {} is shorter than two pixels, cutoff pinned to {}",
            period, MAX_CARRIER_CUTOFF
        );
        return Ok(MAX_CARRIER_CUTOFF);
    }
    Ok(cutoff)
}

/// Quadrature demodulator for images carrying a row-axis carrier
#[derive(Debug, Clone)]
pub struct FourierDemodulator {
    params: DemodulationParams,
}

impl FourierDemodulator {
    pub fn new(period: usize, order: usize, design: FilterDesign) -> Self {
        Self {
            params: DemodulationParams {
                period,
                order,
                design,
            },
        }
    }

    pub fn with_params(params: DemodulationParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DemodulationParams {
        &self.params
    }

    /// Run high-pass, downshift, low-pass and magnitude stages on `image`.
    ///
    /// Every parameter is validated and both filters are designed before any
    /// array is touched.
    pub fn demodulate(&self, image: &SingleImage) -> MicrographResult<DemodulationResult> {
        let (rows, cols) = image.dim();
        let DemodulationParams {
            period,
            order,
            design,
        } = self.params;

        log::info!(
            "Demodulating {}x{} image: period={} order={} design={:?}",
            rows, cols, period, order, design
        );

        if rows == 0 || cols == 0 {
            return Err(MicrographError::InvalidShape { rows, cols });
        }
        if order < 1 {
            return Err(MicrographError::InvalidOrder(order));
        }
        let cutoff = carrier_cutoff(period, rows, cols)?;
        log::debug!("Carrier cutoff: {:.4} cycles/sample", cutoff);

        let high = ButterworthFilter::high_pass(cutoff, order, design)?;
        let low = ButterworthFilter::low_pass(cutoff, order, design)?;

        // 1) Remove the background below the carrier
        let high_pass = high.apply(image)?;

        // 2) Shift the carrier to baseband with row-indexed references
        let (cosine, sine): (Vec<Sample>, Vec<Sample>) = (0..rows)
            .map(|r| {
                let phase = 2.0 * PI * r as Sample / period as Sample;
                (phase.cos(), phase.sin())
            })
            .unzip();
        let a_mix = Array2::from_shape_fn((rows, cols), |(r, c)| high_pass[[r, c]] * cosine[r]);
        let b_mix = Array2::from_shape_fn((rows, cols), |(r, c)| high_pass[[r, c]] * sine[r]);
        log::debug!("Quadrature mixing done");

        // 3) Keep the baseband
        let (a_low_pass, b_low_pass) = low_pass_pair(&low, &a_mix, &b_mix)?;

        // 4) Magnitude of the in-phase/quadrature pair
        let final_image = Zip::from(&a_low_pass)
            .and(&b_low_pass)
            .map_collect(|&a, &b| (a * a + b * b).sqrt());

        log::info!("Demodulation completed");
        Ok(DemodulationResult {
            high_pass,
            a_mix,
            b_mix,
            a_low_pass,
            b_low_pass,
            final_image,
        })
    }
}

#[cfg(feature = "parallel")]
fn low_pass_pair(
    low: &ButterworthFilter,
    a_mix: &SingleImage,
    b_mix: &SingleImage,
) -> MicrographResult<(SingleImage, SingleImage)> {
    let (a, b) = rayon::join(|| low.apply(a_mix), || low.apply(b_mix));
    Ok((a?, b?))
}

#[cfg(not(feature = "parallel"))]
fn low_pass_pair(
    low: &ButterworthFilter,
    a_mix: &SingleImage,
    b_mix: &SingleImage,
) -> MicrographResult<(SingleImage, SingleImage)> {
    Ok((low.apply(a_mix)?, low.apply(b_mix)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn carrier_image(rows: usize, cols: usize, period: usize) -> SingleImage {
        Array2::from_shape_fn((rows, cols), |(r, _)| {
            2.0 + (2.0 * PI * r as Sample / period as Sample).cos()
        })
    }

    #[test]
    fn test_carrier_cutoff_bounds() {
        assert_eq!(carrier_cutoff(8, 16, 16).unwrap(), 0.125);
        assert_eq!(carrier_cutoff(32, 16, 4).unwrap(), 1.0 / 32.0);

        assert_eq!(carrier_cutoff(3, 16, 16).unwrap(), 1.0 / 3.0);
        assert_eq!(carrier_cutoff(2, 16, 16).unwrap(), NYQUIST);

        let cutoff = carrier_cutoff(1, 4, 4).unwrap();
        assert_eq!(cutoff, MAX_CARRIER_CUTOFF);
        assert!(cutoff > 0.0 && cutoff < 0.5);

        assert!(matches!(carrier_cutoff(0, 4, 4), Err(MicrographError::InvalidCutoff(_))));
        assert!(matches!(carrier_cutoff(33, 16, 4), Err(MicrographError::InvalidCutoff(_))));
    }

    #[test]
    fn test_mask_design_recovers_flat_envelope() {
        let image = carrier_image(64, 16, 8);
        let demodulator = FourierDemodulator::new(8, 4, FilterDesign::FrequencyMask);
        let result = demodulator.demodulate(&image).unwrap();

        // Carrier sits at the cutoff, so the high-pass keeps half of it and
        // the mixer halves it again
        for &v in result.final_image.iter() {
            assert_abs_diff_eq!(v, 0.25, epsilon = 2e-3);
        }
        // The constant background is gone after the high-pass
        assert_abs_diff_eq!(result.high_pass.mean().unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_all_stages_share_the_input_shape() {
        let image = carrier_image(20, 12, 5);
        for design in [FilterDesign::SpatialRecursive, FilterDesign::FrequencyMask] {
            let result = FourierDemodulator::new(5, 2, design).demodulate(&image).unwrap();
            for (stage, array) in result.iter() {
                assert_eq!(array.dim(), (20, 12), "stage {}", stage);
            }
            assert!(result.final_image.iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn test_mixes_follow_row_references() {
        let image = Array2::from_shape_fn((12, 3), |(r, c)| (r * 3 + c) as Sample);
        let result = FourierDemodulator::new(6, 1, FilterDesign::FrequencyMask)
            .demodulate(&image)
            .unwrap();
        for ((r, c), &hp) in result.high_pass.indexed_iter() {
            let phase = 2.0 * PI * r as Sample / 6.0;
            assert_abs_diff_eq!(result.a_mix[[r, c]], hp * phase.cos(), epsilon = 1e-12);
            assert_abs_diff_eq!(result.b_mix[[r, c]], hp * phase.sin(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_stage_lookup_matches_tuple_order() {
        let image = carrier_image(16, 4, 4);
        let result = FourierDemodulator::new(4, 2, FilterDesign::SpatialRecursive)
            .demodulate(&image)
            .unwrap();
        let copy = result.clone();
        let (hp, _, _, _, b_low, fin) = copy.into_tuple();
        assert_eq!(&hp, result.stage(DemodulationStage::HighPass));
        assert_eq!(&b_low, result.stage(DemodulationStage::BLowPass));
        assert_eq!(&fin, result.stage(DemodulationStage::Final));
    }

    #[test]
    fn test_invalid_parameters_fail_early() {
        let image = carrier_image(8, 8, 4);
        let design = FilterDesign::SpatialRecursive;
        assert!(matches!(
            FourierDemodulator::new(4, 0, design).demodulate(&image),
            Err(MicrographError::InvalidOrder(0))
        ));
        assert!(matches!(
            FourierDemodulator::new(0, 2, design).demodulate(&image),
            Err(MicrographError::InvalidCutoff(_))
        ));
        assert!(matches!(
            FourierDemodulator::new(17, 2, design).demodulate(&image),
            Err(MicrographError::InvalidCutoff(_))
        ));
        assert!(matches!(
            FourierDemodulator::new(4, 2, design).demodulate(&Array2::zeros((0, 8))),
            Err(MicrographError::InvalidShape { .. })
        ));
    }

    #[test]
    fn test_minimum_period_and_order() {
        let image = carrier_image(10, 10, 3);
        for design in [FilterDesign::SpatialRecursive, FilterDesign::FrequencyMask] {
            let result = FourierDemodulator::new(1, 1, design).demodulate(&image).unwrap();
            assert!(result.final_image.iter().all(|v| v.is_finite() && *v >= 0.0));
        }
    }

    #[test]
    fn test_two_pixel_period_filters_at_nyquist() {
        let image = carrier_image(12, 12, 2);
        let recursive = FourierDemodulator::new(2, 3, FilterDesign::SpatialRecursive)
            .demodulate(&image)
            .unwrap();
        assert!(recursive.high_pass.iter().all(|&v| v == 0.0));
        assert!(recursive.final_image.iter().all(|&v| v == 0.0));

        let mask = FourierDemodulator::new(2, 3, FilterDesign::FrequencyMask)
            .demodulate(&image)
            .unwrap();
        assert_eq!(mask.final_image.dim(), (12, 12));
        assert!(mask.final_image.iter().all(|v| v.is_finite() && *v >= 0.0));
    }
}
