//! Dense one-time correlators.
//!
//! Three interchangeable implementations compute the same bin x lag g2
//! matrix:
//!
//! - [`DenseCorrelator`]: direct frame-major reference implementation.
//! - [`ParallelDenseCorrelator`]: one rayon work unit per (bin, lag) over an
//!   upcast device buffer (feature `rayon`).
//! - [`FftCorrelator`]: zero-padded Wiener–Khinchin formulation on `rustfft`
//!   (feature `fft`).
//!
//! All of them use the raw g2 convention
//! `g2(τ) = <I(p,t) I(p,t+τ)>_{p,t} / <Ī(t) Ī(t+τ)>_t`, where `Ī(t)` is the bin
//! mean of frame `t` and both averages run over the `N - τ` valid origins.
//! No `-1` is subtracted: uncorrelated or constant data gives 1.

use crate::frames::{BinMask, FrameStack, Pixel, PixelSelection, PixelType};
use crate::plan::PlanSignature;
use crate::util::{CorrError, CorrResult};
use std::fmt;

mod direct;
mod matrix;
mod profile;

#[cfg(feature = "rayon")]
mod device;
#[cfg(feature = "fft")]
mod fft;

pub use direct::DenseCorrelator;
pub use matrix::CorrelationMatrix;
pub use profile::ProfileReport;

#[cfg(feature = "rayon")]
pub use device::ParallelDenseCorrelator;
#[cfg(feature = "fft")]
pub use fft::FftCorrelator;

/// Correlator implementation selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Direct reference correlator.
    Direct,
    /// Data-parallel dense correlator.
    Device,
    /// FFT-based correlator.
    Fft,
}

impl Backend {
    /// All backends, available or not.
    pub const ALL: [Backend; 3] = [Backend::Direct, Backend::Device, Backend::Fft];

    /// Returns true if this backend was compiled into the build.
    pub const fn is_available(self) -> bool {
        match self {
            Backend::Direct => true,
            Backend::Device => cfg!(feature = "rayon"),
            Backend::Fft => cfg!(feature = "fft"),
        }
    }

    /// Returns the lowercase backend name.
    pub fn name(self) -> &'static str {
        match self {
            Backend::Direct => "direct",
            Backend::Device => "device",
            Backend::Fft => "fft",
        }
    }

    /// Parses a lowercase backend name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    pub(crate) fn ensure_available(self) -> CorrResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(CorrError::BackendUnavailable { backend: self })
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the backends available in this build.
pub fn available_backends() -> Vec<Backend> {
    Backend::ALL
        .into_iter()
        .filter(|b| b.is_available())
        .collect()
}

/// Backend-specific tuning options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtraOptions {
    /// Keep FFT plans cached after a call (FFT backend).
    pub save_fft_plans: bool,
    /// Keep the upcast trace buffer allocated between calls (device backend).
    pub reuse_buffers: bool,
    /// Pixels per FFT work chunk.
    pub pixel_chunk: usize,
}

impl Default for ExtraOptions {
    fn default() -> Self {
        Self {
            save_fft_plans: false,
            reuse_buffers: false,
            pixel_chunk: 256,
        }
    }
}

/// Construction parameters shared by every correlator.
#[derive(Clone, Debug)]
pub struct CorrelatorConfig {
    /// Per-pixel bin labels.
    pub qmask: BinMask,
    /// Element type of the frames passed to `correlate`.
    pub dtype: PixelType,
    /// Record stage timings of each call.
    pub profile: bool,
    /// Backend-specific options.
    pub extra_options: ExtraOptions,
}

impl CorrelatorConfig {
    /// Creates a config with profiling off and default options.
    pub fn new(qmask: BinMask, dtype: PixelType) -> Self {
        Self {
            qmask,
            dtype,
            profile: false,
            extra_options: ExtraOptions::default(),
        }
    }

    /// Enables or disables profiling.
    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    /// Replaces the backend options.
    pub fn with_options(mut self, extra_options: ExtraOptions) -> Self {
        self.extra_options = extra_options;
        self
    }
}

/// Common contract of all correlator variants.
pub trait Correlator {
    /// Returns the implementation behind this correlator.
    fn backend(&self) -> Backend;

    /// Returns the number of bins (rows of the result).
    fn num_bins(&self) -> usize;

    /// Returns the frame count the correlator was built for.
    fn num_frames(&self) -> usize;

    /// Computes g2 for every bin and lag `1..N`.
    ///
    /// The stack must match the shape, frame count, and dtype given at
    /// construction.
    fn correlate<T: Pixel>(&self, frames: FrameStack<'_, T>) -> CorrResult<CorrelationMatrix>;

    /// Returns the stage timings of the last call when profiling is enabled.
    fn last_profile(&self) -> Option<ProfileReport>;
}

/// Validated geometry and pixel selections of a correlation problem.
#[derive(Clone, Debug)]
pub(crate) struct BinLayout {
    height: usize,
    width: usize,
    frames: usize,
    dtype: PixelType,
    selections: Vec<PixelSelection>,
}

impl BinLayout {
    pub(crate) fn new(
        height: usize,
        width: usize,
        frames: usize,
        config: &CorrelatorConfig,
    ) -> CorrResult<Self> {
        if height == 0 || width == 0 || frames == 0 {
            return Err(CorrError::InvalidDimensions {
                frames,
                height,
                width,
            });
        }
        if frames < 2 {
            return Err(CorrError::TooFewFrames { frames });
        }
        let (mask_height, mask_width) = config.qmask.shape();
        if (mask_height, mask_width) != (height, width) {
            return Err(CorrError::ShapeMismatch {
                expected_height: height,
                expected_width: width,
                height: mask_height,
                width: mask_width,
            });
        }
        if config.extra_options.pixel_chunk == 0 {
            return Err(CorrError::InvalidOption("pixel_chunk must be at least 1"));
        }
        let selections = config.qmask.selections()?;
        Ok(Self {
            height,
            width,
            frames,
            dtype: config.dtype,
            selections,
        })
    }

    pub(crate) fn frames(&self) -> usize {
        self.frames
    }

    pub(crate) fn num_bins(&self) -> usize {
        self.selections.len()
    }

    pub(crate) fn lags(&self) -> usize {
        self.frames - 1
    }

    pub(crate) fn selections(&self) -> &[PixelSelection] {
        &self.selections
    }

    pub(crate) fn selected_pixels(&self) -> usize {
        self.selections.iter().map(PixelSelection::len).sum()
    }

    pub(crate) fn signature(&self) -> PlanSignature {
        PlanSignature {
            height: self.height,
            width: self.width,
            frames: self.frames,
            dtype: self.dtype,
        }
    }

    /// Checks a frame stack against the construction parameters.
    pub(crate) fn check<T: Pixel>(&self, frames: &FrameStack<'_, T>) -> CorrResult<()> {
        if T::DTYPE != self.dtype {
            return Err(CorrError::DtypeMismatch {
                expected: self.dtype,
                got: T::DTYPE,
            });
        }
        if frames.shape() != (self.height, self.width) {
            return Err(CorrError::ShapeMismatch {
                expected_height: self.height,
                expected_width: self.width,
                height: frames.height(),
                width: frames.width(),
            });
        }
        if frames.frames() != self.frames {
            return Err(CorrError::FrameCountMismatch {
                expected: self.frames,
                got: frames.frames(),
            });
        }
        Ok(())
    }

    pub(crate) fn resource_error(&self, context: &'static str) -> CorrError {
        CorrError::Resource {
            context,
            height: self.height,
            width: self.width,
            frames: self.frames,
            bins: self.num_bins(),
        }
    }
}

/// Correlator chosen at runtime by [`Backend`].
pub enum AnyCorrelator {
    Direct(DenseCorrelator),
    #[cfg(feature = "rayon")]
    Device(ParallelDenseCorrelator),
    #[cfg(feature = "fft")]
    Fft(FftCorrelator),
}

impl AnyCorrelator {
    /// Builds the correlator for `backend`.
    ///
    /// Fails with `BackendUnavailable` when the backend is not compiled in.
    pub fn new(
        backend: Backend,
        height: usize,
        width: usize,
        frames: usize,
        config: CorrelatorConfig,
    ) -> CorrResult<Self> {
        backend.ensure_available()?;
        match backend {
            Backend::Direct => Ok(Self::Direct(DenseCorrelator::new(
                height, width, frames, config,
            )?)),
            #[cfg(feature = "rayon")]
            Backend::Device => Ok(Self::Device(ParallelDenseCorrelator::new(
                height, width, frames, config,
            )?)),
            #[cfg(feature = "fft")]
            Backend::Fft => Ok(Self::Fft(FftCorrelator::new(
                height, width, frames, config,
            )?)),
            #[allow(unreachable_patterns)]
            other => Err(CorrError::BackendUnavailable { backend: other }),
        }
    }
}

impl Correlator for AnyCorrelator {
    fn backend(&self) -> Backend {
        match self {
            Self::Direct(c) => c.backend(),
            #[cfg(feature = "rayon")]
            Self::Device(c) => c.backend(),
            #[cfg(feature = "fft")]
            Self::Fft(c) => c.backend(),
        }
    }

    fn num_bins(&self) -> usize {
        match self {
            Self::Direct(c) => c.num_bins(),
            #[cfg(feature = "rayon")]
            Self::Device(c) => c.num_bins(),
            #[cfg(feature = "fft")]
            Self::Fft(c) => c.num_bins(),
        }
    }

    fn num_frames(&self) -> usize {
        match self {
            Self::Direct(c) => c.num_frames(),
            #[cfg(feature = "rayon")]
            Self::Device(c) => c.num_frames(),
            #[cfg(feature = "fft")]
            Self::Fft(c) => c.num_frames(),
        }
    }

    fn correlate<T: Pixel>(&self, frames: FrameStack<'_, T>) -> CorrResult<CorrelationMatrix> {
        match self {
            Self::Direct(c) => c.correlate(frames),
            #[cfg(feature = "rayon")]
            Self::Device(c) => c.correlate(frames),
            #[cfg(feature = "fft")]
            Self::Fft(c) => c.correlate(frames),
        }
    }

    fn last_profile(&self) -> Option<ProfileReport> {
        match self {
            Self::Direct(c) => c.last_profile(),
            #[cfg(feature = "rayon")]
            Self::Device(c) => c.last_profile(),
            #[cfg(feature = "fft")]
            Self::Fft(c) => c.last_profile(),
        }
    }
}
