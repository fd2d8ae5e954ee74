//! micrograph: frame combination and Fourier demodulation for microscope images
//!
//! Stacks of frames of the same field of view are reduced to a single image
//! (sum, min-max or root-of-unity weighted magnitude), and images carrying a
//! spatial carrier are demodulated by high-pass filtering, quadrature mixing,
//! low-pass filtering and magnitude reconstruction.

pub mod types;
pub mod io;
pub mod core;
pub mod pipeline;

// Re-export main types and functions for easier access
pub use types::{
    CombinationMethod, DemodulationParams, FilterDesign, FilterKind, FrequencyResponse,
    MicrographError, MicrographResult, SingleImage, StackImage,
};

pub use crate::core::{ButterworthFilter, DemodulationResult, DemodulationStage, FourierDemodulator};
pub use io::ImageReader;
pub use pipeline::Pipeline;

#[cfg(feature = "python")]
mod python {
    use crate::io::ImageReader;
    use crate::pipeline::Pipeline;
    use crate::types::{CombinationMethod, FilterDesign, MicrographError};
    use numpy::{IntoPyArray, PyArray2, PyArray3, PyReadonlyArray2, PyReadonlyArray3};
    use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
    use pyo3::prelude::*;

    type PyImage<'py> = &'py PyArray2<f64>;

    fn to_py_err(err: MicrographError) -> PyErr {
        match err {
            MicrographError::NoInputBound(_) => PyRuntimeError::new_err(err.to_string()),
            MicrographError::DecodeError(_) | MicrographError::EncodeError(_) => {
                PyIOError::new_err(err.to_string())
            }
            _ => PyValueError::new_err(err.to_string()),
        }
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_class::<PyMicroscopeProcessor>()?;
        Ok(())
    }

    /// Python wrapper for Pipeline
    #[pyclass(name = "MicroscopeProcessor")]
    struct PyMicroscopeProcessor {
        inner: Pipeline,
    }

    #[pymethods]
    impl PyMicroscopeProcessor {
        #[new]
        #[pyo3(signature = (design = "spatial"))]
        fn new(design: &str) -> PyResult<Self> {
            let design = match design.to_lowercase().as_str() {
                "spatial" | "recursive" | "spatial_recursive" => FilterDesign::SpatialRecursive,
                "frequency" | "mask" | "frequency_mask" => FilterDesign::FrequencyMask,
                _ => {
                    return Err(PyValueError::new_err(format!(
                        "Invalid filter design: {}",
                        design
                    )))
                }
            };
            Ok(Self {
                inner: Pipeline::with_filter_design(design),
            })
        }

        fn add_stack_img(&mut self, stack: PyReadonlyArray3<f64>) {
            self.inner.bind_stack(stack.as_array().to_owned());
        }

        fn add_single_img(&mut self, img: PyReadonlyArray2<f64>) {
            self.inner.bind_image(img.as_array().to_owned());
        }

        fn average_projection<'py>(&self, py: Python<'py>) -> PyResult<PyImage<'py>> {
            self.combine(py, CombinationMethod::Average)
        }

        fn max_min_projection<'py>(&self, py: Python<'py>) -> PyResult<PyImage<'py>> {
            self.combine(py, CombinationMethod::MinMax)
        }

        fn weighted_complex_average<'py>(&self, py: Python<'py>) -> PyResult<PyImage<'py>> {
            self.combine(py, CombinationMethod::WeightedComplex)
        }

        /// Returns (high_pass, a_mix, b_mix, a_low_pass, b_low_pass, result)
        #[allow(clippy::type_complexity)]
        fn fourier_based_demodulation<'py>(
            &self,
            py: Python<'py>,
            period: usize,
            order: usize,
        ) -> PyResult<(
            PyImage<'py>,
            PyImage<'py>,
            PyImage<'py>,
            PyImage<'py>,
            PyImage<'py>,
            PyImage<'py>,
        )> {
            let result = self.inner.demodulate(period, order).map_err(to_py_err)?;
            let (hp, a_mix, b_mix, a_low, b_low, fin) = result.into_tuple();
            Ok((
                hp.into_pyarray(py),
                a_mix.into_pyarray(py),
                b_mix.into_pyarray(py),
                a_low.into_pyarray(py),
                b_low.into_pyarray(py),
                fin.into_pyarray(py),
            ))
        }

        fn magnitude_spectrum<'py>(&self, py: Python<'py>) -> PyResult<PyImage<'py>> {
            let spectrum = self.inner.image_spectrum().map_err(to_py_err)?;
            Ok(spectrum.into_pyarray(py))
        }

        #[staticmethod]
        fn load_tif(py: Python<'_>, path: String) -> PyResult<&PyArray3<f64>> {
            let stack = ImageReader::new(path).read_stack().map_err(to_py_err)?;
            Ok(stack.into_pyarray(py))
        }

        #[staticmethod]
        fn load_png(py: Python<'_>, path: String) -> PyResult<&PyArray2<f64>> {
            let image = ImageReader::new(path).read_single().map_err(to_py_err)?;
            Ok(image.into_pyarray(py))
        }
    }

    impl PyMicroscopeProcessor {
        fn combine<'py>(&self, py: Python<'py>, method: CombinationMethod) -> PyResult<PyImage<'py>> {
            let result = self.inner.combine_frames(method).map_err(to_py_err)?;
            Ok(result.into_pyarray(py))
        }
    }
}
