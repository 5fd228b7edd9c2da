//! Low-level building blocks for custom correlation pipelines.
//!
//! These items expose the lag kernels and plan types used inside the
//! correlators. Most users should prefer the top-level correlator types.

pub use crate::kernel::scalar::LagDotScalar;
#[cfg(feature = "simd")]
pub use crate::kernel::simd::LagDotSimd;
pub use crate::kernel::LagKernel;
#[cfg(feature = "fft")]
pub use crate::plan::FftPlan;
pub use crate::plan::{PlanSignature, ResourceCache};
