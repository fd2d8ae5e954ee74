//! Core image processing modules

pub mod projection;
pub mod fourier;
pub mod butterworth;
pub mod demodulation;

// Re-export main types
pub use projection::{combine_frames, average_projection, min_max_projection, weighted_complex_average};
pub use fourier::{magnitude_spectrum, normalize_unit_range};
pub use butterworth::ButterworthFilter;
pub use demodulation::{FourierDemodulator, DemodulationResult, DemodulationStage, carrier_cutoff};
