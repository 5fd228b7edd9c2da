//! SIMD-accelerated lag kernel using the `wide` crate.
//!
//! The product loop is vectorized to process 4 time samples at a time using
//! `f64x4`; the remainder is handled with a scalar tail.

use crate::kernel::LagKernel;
use wide::f64x4;

const LANES: usize = 4;

/// Load 4 f64 values into f64x4.
#[inline]
fn load_f64x4(slice: &[f64]) -> f64x4 {
    f64x4::from([slice[0], slice[1], slice[2], slice[3]])
}

/// Horizontal sum of f64x4.
#[inline]
fn hsum(v: f64x4) -> f64 {
    let arr = v.to_array();
    (arr[0] + arr[1]) + (arr[2] + arr[3])
}

/// SIMD lag-product kernel.
pub struct LagDotSimd;

impl LagKernel for LagDotSimd {
    fn lag_dot(trace: &[f64], lag: usize) -> f64 {
        if lag >= trace.len() {
            return 0.0;
        }
        let len = trace.len() - lag;
        let head = &trace[..len];
        let tail = &trace[lag..];
        let simd_end = len / LANES * LANES;

        let mut acc = f64x4::ZERO;
        let mut i = 0;
        while i < simd_end {
            acc = acc + load_f64x4(&head[i..]) * load_f64x4(&tail[i..]);
            i += LANES;
        }

        let mut sum = hsum(acc);
        for j in simd_end..len {
            sum += head[j] * tail[j];
        }
        sum
    }
}
