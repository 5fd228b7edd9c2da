//! Numeric helpers shared by the correlators.

/// Applies the raw g2 normalization to accumulated sums for one lag.
///
/// `num` is the sum of `I(p,t) * I(p,t+lag)` over the bin's `npix` pixels and
/// the `overlap` valid time origins; `den` is the sum of `mean(t) * mean(t+lag)`
/// over the same origins. Returns 0 when the denominator vanishes.
#[inline]
pub(crate) fn normalize_lag(num: f64, den: f64, npix: usize, overlap: usize) -> f64 {
    let overlap = overlap as f64;
    let num = num / npix as f64 / overlap;
    let den = den / overlap;
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Zero-padded transform length for an `frames`-long trace.
///
/// The linear autocorrelation of `n` samples spans `2n - 1` lags, so any
/// length at least that large keeps circular wraparound out of lags `0..n`.
pub(crate) fn padded_len(frames: usize) -> Option<usize> {
    frames
        .checked_mul(2)
        .and_then(|v| v.checked_sub(1))
        .and_then(usize::checked_next_power_of_two)
}

/// Zeroes lags of an FFT autocorrelation curve that are below transform roundoff.
///
/// `curve[0]` is the zero-lag energy, which bounds every other lag, and
/// transform error scales with it. Entries within
/// `16 * len * EPSILON` of that energy are set to exactly 0.
pub(crate) fn flush_roundoff(curve: &mut [f64]) {
    let len = curve.len() as f64;
    let Some((energy, lags)) = curve.split_first_mut() else {
        return;
    };
    let threshold = energy.abs() * len * f64::EPSILON * 16.0;
    for value in lags.iter_mut() {
        if value.abs() <= threshold {
            *value = 0.0;
        }
    }
}

/// Number of elements in a `frames x height x width` stack.
pub(crate) fn stack_len(frames: usize, height: usize, width: usize) -> Option<usize> {
    height.checked_mul(width)?.checked_mul(frames)
}
