//! Lag-product kernels.
//!
//! A lag kernel reduces one widened time trace to `Σ_t x[t] * x[t + lag]`.
//! The device correlator evaluates one kernel call per (pixel, lag) inside
//! each of its work units.

/// Kernel trait for single-trace lag products.
pub trait LagKernel {
    /// Returns `Σ_{t < len - lag} trace[t] * trace[t + lag]`, or 0 when
    /// `lag >= trace.len()`.
    fn lag_dot(trace: &[f64], lag: usize) -> f64;
}

pub mod scalar;

#[cfg(feature = "simd")]
pub mod simd;

#[cfg(feature = "rayon")]
pub mod rayon;

#[cfg(all(feature = "rayon", not(feature = "simd")))]
pub(crate) use scalar::LagDotScalar as LagDot;
#[cfg(all(feature = "rayon", feature = "simd"))]
pub(crate) use simd::LagDotSimd as LagDot;
