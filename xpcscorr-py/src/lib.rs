//! Python bindings for the xpcscorr dense g2 correlators.
//!
//! Each class wraps one backend and correlates frame stacks of shape
//! `(nframes, height, width)` in the configured dtype into a `float64`
//! array of shape `(bins, nframes - 1)`.

use numpy::ndarray::Array2;
use numpy::{
    Element, IntoPyArray, PyArray2, PyReadonlyArray2, PyReadonlyArray3, PyUntypedArrayMethods,
};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use xpcscorr::{
    AnyCorrelator, Backend, BinMask, CorrError, Correlator, CorrelatorConfig, ErrorKind,
    ExtraOptions, FrameStack, Pixel, PixelType,
};

/// Convert a CorrError to a Python exception.
fn to_py_err(err: CorrError) -> PyErr {
    match err.kind() {
        ErrorKind::Configuration => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

/// Integer label arrays accepted as `qmask`.
#[derive(FromPyObject)]
enum MaskArray<'py> {
    I64(PyReadonlyArray2<'py, i64>),
    I32(PyReadonlyArray2<'py, i32>),
    U32(PyReadonlyArray2<'py, u32>),
    U16(PyReadonlyArray2<'py, u16>),
    U8(PyReadonlyArray2<'py, u8>),
}

/// Frame stacks accepted by `correlate`.
#[derive(FromPyObject)]
enum FrameArray<'py> {
    U8(PyReadonlyArray3<'py, u8>),
    U16(PyReadonlyArray3<'py, u16>),
    U32(PyReadonlyArray3<'py, u32>),
    I32(PyReadonlyArray3<'py, i32>),
    F32(PyReadonlyArray3<'py, f32>),
    F64(PyReadonlyArray3<'py, f64>),
}

fn signed_labels<T: Element + Copy + Into<i64>>(
    qmask: &PyReadonlyArray2<'_, T>,
) -> PyResult<((usize, usize), Vec<i64>)> {
    let shape = qmask.shape();
    let labels = qmask.as_slice()?.iter().map(|&v| Into::<i64>::into(v)).collect();
    Ok(((shape[0], shape[1]), labels))
}

/// Parse a dtype given as a name, a `numpy.dtype` or a numpy scalar type.
///
/// `None` selects float32.
fn parse_dtype(dtype: Option<&Bound<'_, PyAny>>) -> PyResult<PixelType> {
    let Some(dtype) = dtype else {
        return Ok(PixelType::F32);
    };
    let name: String = if let Ok(name) = dtype.extract::<String>() {
        name
    } else if let Ok(name) = dtype.getattr("name") {
        name.extract()?
    } else {
        dtype.getattr("__name__")?.extract()?
    };
    PixelType::from_name(&name).ok_or_else(|| {
        PyValueError::new_err(format!(
            "unsupported dtype '{name}' (expected uint8, uint16, uint32, int32, float32 or float64)"
        ))
    })
}

/// Parse the `extra_options` dict into backend options.
fn parse_extra_options(extra_options: Option<&Bound<'_, PyDict>>) -> PyResult<ExtraOptions> {
    let mut options = ExtraOptions::default();
    let Some(dict) = extra_options else {
        return Ok(options);
    };
    for (key, value) in dict.iter() {
        let key: String = key.extract()?;
        match key.as_str() {
            "save_fft_plans" => options.save_fft_plans = value.extract()?,
            "reuse_buffers" => options.reuse_buffers = value.extract()?,
            "pixel_chunk" => options.pixel_chunk = value.extract()?,
            other => {
                return Err(PyValueError::new_err(format!(
                    "unknown extra option '{other}'"
                )))
            }
        }
    }
    Ok(options)
}

/// Backend-independent state shared by the Python classes.
struct Core {
    inner: AnyCorrelator,
    shape: (usize, usize),
    nframes: usize,
    dtype: PixelType,
}

impl Core {
    fn new(
        backend: Backend,
        shape: (usize, usize),
        nframes: usize,
        qmask: MaskArray<'_>,
        dtype: Option<&Bound<'_, PyAny>>,
        profile: bool,
        extra_options: Option<&Bound<'_, PyDict>>,
    ) -> PyResult<Self> {
        let (mask_shape, labels) = match &qmask {
            MaskArray::I64(arr) => signed_labels(arr)?,
            MaskArray::I32(arr) => signed_labels(arr)?,
            MaskArray::U32(arr) => signed_labels(arr)?,
            MaskArray::U16(arr) => signed_labels(arr)?,
            MaskArray::U8(arr) => signed_labels(arr)?,
        };
        if mask_shape != shape {
            return Err(PyValueError::new_err(format!(
                "qmask shape ({}, {}) does not match frame shape ({}, {})",
                mask_shape.0, mask_shape.1, shape.0, shape.1
            )));
        }
        let mask = BinMask::from_signed(&labels, shape.0, shape.1).map_err(to_py_err)?;
        let dtype = parse_dtype(dtype)?;
        let config = CorrelatorConfig::new(mask, dtype)
            .with_profile(profile)
            .with_options(parse_extra_options(extra_options)?);
        let inner =
            AnyCorrelator::new(backend, shape.0, shape.1, nframes, config).map_err(to_py_err)?;
        Ok(Self {
            inner,
            shape,
            nframes,
            dtype,
        })
    }

    fn correlate<'py>(
        &self,
        py: Python<'py>,
        frames: FrameArray<'py>,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        match frames {
            FrameArray::U8(arr) => self.correlate_typed(py, arr),
            FrameArray::U16(arr) => self.correlate_typed(py, arr),
            FrameArray::U32(arr) => self.correlate_typed(py, arr),
            FrameArray::I32(arr) => self.correlate_typed(py, arr),
            FrameArray::F32(arr) => self.correlate_typed(py, arr),
            FrameArray::F64(arr) => self.correlate_typed(py, arr),
        }
    }

    fn correlate_typed<'py, T: Pixel + Element>(
        &self,
        py: Python<'py>,
        frames: PyReadonlyArray3<'py, T>,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let dims = frames.shape();
        let (nframes, height, width) = (dims[0], dims[1], dims[2]);
        let data = frames.as_slice()?;
        let stack = FrameStack::new(data, nframes, height, width).map_err(to_py_err)?;
        let result = self.inner.correlate(stack).map_err(to_py_err)?;
        let (bins, lags) = (result.bins(), result.lags());
        let arr = Array2::from_shape_vec((bins, lags), result.into_vec())
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        Ok(arr.into_pyarray(py))
    }

    fn last_profile(&self) -> Option<(f64, f64, f64)> {
        self.inner.last_profile().map(|report| {
            (
                report.upload.as_secs_f64(),
                report.compute.as_secs_f64(),
                report.readback.as_secs_f64(),
            )
        })
    }

    fn repr(&self, class: &str) -> String {
        format!(
            "{class}(shape=({}, {}), nframes={}, dtype={}, bins={})",
            self.shape.0,
            self.shape.1,
            self.nframes,
            self.dtype,
            self.inner.num_bins()
        )
    }
}

/// Direct reference correlator.
#[pyclass]
pub struct DenseCorrelator {
    core: Core,
}

#[pymethods]
impl DenseCorrelator {
    /// Create a direct correlator.
    ///
    /// Args:
    ///     shape: Frame shape (height, width)
    ///     nframes: Number of frames per stack
    ///     qmask: 2D integer array of bin labels, 0 excludes a pixel
    ///     dtype: Frame dtype, a name or numpy dtype (default: "float32")
    ///     profile: Record stage timings (default: False)
    ///     extra_options: Dict of backend options (default: None)
    #[new]
    #[pyo3(signature = (shape, nframes, qmask, dtype=None, profile=false, extra_options=None))]
    fn new(
        shape: (usize, usize),
        nframes: usize,
        qmask: MaskArray<'_>,
        dtype: Option<&Bound<'_, PyAny>>,
        profile: bool,
        extra_options: Option<&Bound<'_, PyDict>>,
    ) -> PyResult<Self> {
        let core = Core::new(
            Backend::Direct,
            shape,
            nframes,
            qmask,
            dtype,
            profile,
            extra_options,
        )?;
        Ok(Self { core })
    }

    /// Correlate a stack of shape (nframes, height, width) in the configured dtype.
    ///
    /// Returns:
    ///     float64 array of shape (bins, nframes - 1)
    fn correlate<'py>(
        &self,
        py: Python<'py>,
        frames: FrameArray<'py>,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        self.core.correlate(py, frames)
    }

    /// (upload, compute, readback) seconds of the last call, if profiling.
    fn last_profile(&self) -> Option<(f64, f64, f64)> {
        self.core.last_profile()
    }

    fn __repr__(&self) -> String {
        self.core.repr("DenseCorrelator")
    }
}

/// Data-parallel dense correlator.
#[pyclass]
pub struct DeviceCorrelator {
    core: Core,
}

#[pymethods]
impl DeviceCorrelator {
    /// Create a data-parallel correlator.
    ///
    /// Args:
    ///     shape: Frame shape (height, width)
    ///     nframes: Number of frames per stack
    ///     qmask: 2D integer array of bin labels, 0 excludes a pixel
    ///     dtype: Frame dtype, a name or numpy dtype (default: "float32")
    ///     profile: Record stage timings (default: False)
    ///     extra_options: Dict of backend options, e.g. {"reuse_buffers": True}
    #[new]
    #[pyo3(signature = (shape, nframes, qmask, dtype=None, profile=false, extra_options=None))]
    fn new(
        shape: (usize, usize),
        nframes: usize,
        qmask: MaskArray<'_>,
        dtype: Option<&Bound<'_, PyAny>>,
        profile: bool,
        extra_options: Option<&Bound<'_, PyDict>>,
    ) -> PyResult<Self> {
        let core = Core::new(
            Backend::Device,
            shape,
            nframes,
            qmask,
            dtype,
            profile,
            extra_options,
        )?;
        Ok(Self { core })
    }

    /// Correlate a stack of shape (nframes, height, width) in the configured dtype.
    fn correlate<'py>(
        &self,
        py: Python<'py>,
        frames: FrameArray<'py>,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        self.core.correlate(py, frames)
    }

    /// (upload, compute, readback) seconds of the last call, if profiling.
    fn last_profile(&self) -> Option<(f64, f64, f64)> {
        self.core.last_profile()
    }

    fn __repr__(&self) -> String {
        self.core.repr("DeviceCorrelator")
    }
}

/// FFT-based correlator.
#[pyclass(name = "FFTCorrelator")]
pub struct FftCorrelator {
    core: Core,
}

#[pymethods]
impl FftCorrelator {
    /// Create an FFT correlator.
    ///
    /// Args:
    ///     shape: Frame shape (height, width)
    ///     nframes: Number of frames per stack
    ///     qmask: 2D integer array of bin labels, 0 excludes a pixel
    ///     dtype: Frame dtype, a name or numpy dtype (default: "float32")
    ///     profile: Record stage timings (default: False)
    ///     extra_options: Dict of backend options, e.g. {"save_fft_plans": True}
    #[new]
    #[pyo3(signature = (shape, nframes, qmask, dtype=None, profile=false, extra_options=None))]
    fn new(
        shape: (usize, usize),
        nframes: usize,
        qmask: MaskArray<'_>,
        dtype: Option<&Bound<'_, PyAny>>,
        profile: bool,
        extra_options: Option<&Bound<'_, PyDict>>,
    ) -> PyResult<Self> {
        let core = Core::new(
            Backend::Fft,
            shape,
            nframes,
            qmask,
            dtype,
            profile,
            extra_options,
        )?;
        Ok(Self { core })
    }

    /// Correlate a stack of shape (nframes, height, width) in the configured dtype.
    fn correlate<'py>(
        &self,
        py: Python<'py>,
        frames: FrameArray<'py>,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        self.core.correlate(py, frames)
    }

    /// (upload, compute, readback) seconds of the last call, if profiling.
    fn last_profile(&self) -> Option<(f64, f64, f64)> {
        self.core.last_profile()
    }

    fn __repr__(&self) -> String {
        self.core.repr("FFTCorrelator")
    }
}

/// Return True if the FFT backend was compiled in.
#[pyfunction]
fn fft_available() -> bool {
    Backend::Fft.is_available()
}

/// Python module for XPCS dense correlation.
#[pymodule]
fn _xpcscorr(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<DenseCorrelator>()?;
    m.add_class::<DeviceCorrelator>()?;
    m.add_class::<FftCorrelator>()?;
    m.add_function(wrap_pyfunction!(fft_available, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
