//! Scalar reference kernels.

use crate::kernel::LagKernel;

/// Scalar lag-product kernel.
pub struct LagDotScalar;

impl LagKernel for LagDotScalar {
    #[inline]
    fn lag_dot(trace: &[f64], lag: usize) -> f64 {
        if lag >= trace.len() {
            return 0.0;
        }
        let len = trace.len() - lag;
        trace[..len]
            .iter()
            .zip(&trace[lag..])
            .map(|(a, b)| a * b)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::LagDotScalar;
    use crate::kernel::LagKernel;

    #[test]
    fn lag_dot_matches_bruteforce() {
        let trace: Vec<f64> = (0..9).map(|t| (t as f64 * 0.7).sin() + 2.0).collect();
        for lag in 0..trace.len() {
            let mut expected = 0.0f64;
            for t in 0..trace.len() - lag {
                expected += trace[t] * trace[t + lag];
            }
            let got = LagDotScalar::lag_dot(&trace, lag);
            assert!((got - expected).abs() < 1e-12, "lag {lag}");
        }
    }

    #[test]
    fn lag_past_trace_is_zero() {
        assert_eq!(LagDotScalar::lag_dot(&[1.0, 2.0], 2), 0.0);
        assert_eq!(LagDotScalar::lag_dot(&[], 0), 0.0);
    }
}
