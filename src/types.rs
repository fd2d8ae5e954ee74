use ndarray::{Array2, Array3};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// Real-valued sample type used throughout the pipeline
pub type Sample = f64;

/// Complex sample used by the weighted average and the FFT paths
pub type ComplexSample = Complex<Sample>;

/// Multi-frame acquisition (frame x row x col)
pub type StackImage = Array3<Sample>;

/// Single 2D image (row x col)
pub type SingleImage = Array2<Sample>;

/// Per-bin attenuation factors in shifted frequency coordinates (DC at the center)
pub type FrequencyResponse = Array2<Sample>;

/// Frame combination algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombinationMethod {
    /// Per-pixel sum over all frames
    Average,
    /// Per-pixel max minus min over all frames
    MinMax,
    /// Magnitude of the root-of-unity weighted sum
    WeightedComplex,
}

impl std::fmt::Display for CombinationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CombinationMethod::Average => write!(f, "Average Projection"),
            CombinationMethod::MinMax => write!(f, "Min-Max Projection"),
            CombinationMethod::WeightedComplex => write!(f, "Weighted Complex Average"),
        }
    }
}

impl std::str::FromStr for CombinationMethod {
    type Err = MicrographError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "average" | "averageprojection" | "sum" => Ok(CombinationMethod::Average),
            "minmax" | "maxmin" | "minmaxprojection" | "maxminprojection" => {
                Ok(CombinationMethod::MinMax)
            }
            "weightedcomplex" | "weightedcomplexaverage" | "complex" => {
                Ok(CombinationMethod::WeightedComplex)
            }
            _ => Err(MicrographError::UnknownMethod(s.to_string())),
        }
    }
}

/// Butterworth realization plugged into the demodulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterDesign {
    /// Zero-phase recursive filtering along rows, then columns
    #[default]
    SpatialRecursive,
    /// Multiplication by a row-axis frequency mask in the Fourier domain
    FrequencyMask,
}

/// Pass band of a Butterworth filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    LowPass,
    HighPass,
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterKind::LowPass => write!(f, "low-pass"),
            FilterKind::HighPass => write!(f, "high-pass"),
        }
    }
}

/// Demodulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemodulationParams {
    /// Carrier period in pixels along the row axis
    pub period: usize,
    /// Butterworth order
    pub order: usize,
    /// Filter realization
    pub design: FilterDesign,
}

impl Default for DemodulationParams {
    fn default() -> Self {
        Self {
            period: 16,
            order: 3,
            design: FilterDesign::SpatialRecursive,
        }
    }
}

/// Error types for microscope image processing
#[derive(Debug, thiserror::Error)]
pub enum MicrographError {
    #[error("Stack has no frames")]
    EmptyStack,

    #[error("Invalid cutoff frequency {0}: must lie in (0, 0.5]")]
    InvalidCutoff(f64),

    #[error("Invalid filter order {0}: must be at least 1")]
    InvalidOrder(usize),

    #[error("Invalid shape {rows}x{cols}: both dimensions must be non-zero")]
    InvalidShape { rows: usize, cols: usize },

    #[error("No {0} bound to the pipeline")]
    NoInputBound(&'static str),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Unexpected shape: {0}")]
    UnexpectedShape(String),

    #[error("Frame {index} out of range for a stack of {frames} frames")]
    FrameOutOfRange { index: usize, frames: usize },

    #[error("Encode error: {0}")]
    EncodeError(String),

    #[error("Unknown combination method: {0}")]
    UnknownMethod(String),
}

/// Result type for pipeline operations
pub type MicrographResult<T> = Result<T, MicrographError>;
