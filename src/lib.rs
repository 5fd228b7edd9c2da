//! xpcscorr computes dense one-time intensity autocorrelation functions
//! (g2) of XPCS frame stacks, binned by a per-pixel q mask.
//!
//! Three interchangeable correlators implement one [`Correlator`] contract:
//! a direct reference implementation, a data-parallel variant on rayon
//! (feature `rayon`), and an FFT formulation on rustfft (feature `fft`).
//! Both optional backends are enabled by default; query
//! [`Backend::is_available`] before selecting one at runtime.

pub mod correlator;
pub mod frames;
pub mod kernel;
pub mod lowlevel;
pub mod plan;
mod trace;
pub mod util;

#[cfg(feature = "image-io")]
pub use frames::io;

pub use correlator::{
    available_backends, AnyCorrelator, Backend, CorrelationMatrix, Correlator, CorrelatorConfig,
    DenseCorrelator, ExtraOptions, ProfileReport,
};
#[cfg(feature = "rayon")]
pub use correlator::ParallelDenseCorrelator;
#[cfg(feature = "fft")]
pub use correlator::FftCorrelator;
pub use frames::{BinMask, FrameStack, OwnedFrames, Pixel, PixelSelection, PixelType};
pub use plan::{PlanSignature, ResourceCache};
#[cfg(feature = "fft")]
pub use plan::{FftPlan, PlanCache};
pub use util::{CorrError, CorrResult, ErrorKind};
