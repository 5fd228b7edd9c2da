//! Rayon-parallel kernels for the device correlator (feature-gated).
//!
//! Device memory is a pixel-major `f64` buffer: the trace of the `i`-th
//! selected pixel occupies `traces[i * frames..(i + 1) * frames]`, and the
//! pixels of bin `b` are rows `offsets[b]..offsets[b + 1]`. Every function
//! here fans out over independent lanes and joins before returning.

use crate::frames::{FrameStack, Pixel};
use crate::kernel::LagKernel;
use rayon::prelude::*;

/// Upcasts the traces of `pixel_index` into `traces`, one row per pixel.
pub(crate) fn upload_traces_par<T: Pixel>(
    frames: FrameStack<'_, T>,
    pixel_index: &[usize],
    traces: &mut [f64],
) {
    let n = frames.frames();
    traces
        .par_chunks_mut(n)
        .zip(pixel_index.par_iter())
        .for_each(|(row, &idx)| frames.fill_trace(idx, row));
}

/// Computes the per-frame mean trace of every bin into `means`.
pub(crate) fn bin_means_par(traces: &[f64], offsets: &[usize], frames: usize, means: &mut [f64]) {
    means
        .par_chunks_mut(frames)
        .enumerate()
        .for_each(|(bin, mean)| {
            let rows = &traces[offsets[bin] * frames..offsets[bin + 1] * frames];
            let inv = 1.0 / (offsets[bin + 1] - offsets[bin]) as f64;
            mean.fill(0.0);
            for row in rows.chunks_exact(frames) {
                for (m, v) in mean.iter_mut().zip(row) {
                    *m += v;
                }
            }
            for m in mean.iter_mut() {
                *m *= inv;
            }
        });
}

/// Evaluates one work unit per (bin, lag) and returns `(num, den)` sums.
///
/// Units are returned in bin-major, lag-minor order. Each unit reduces its
/// pixels sequentially, so the output does not depend on scheduling.
pub(crate) fn lag_units_par<K: LagKernel>(
    traces: &[f64],
    means: &[f64],
    offsets: &[usize],
    frames: usize,
) -> Vec<(f64, f64)> {
    let lags = frames - 1;
    let bins = offsets.len() - 1;
    (0..bins * lags)
        .into_par_iter()
        .map(|unit| {
            let bin = unit / lags;
            let lag = unit % lags + 1;
            let rows = &traces[offsets[bin] * frames..offsets[bin + 1] * frames];
            let num: f64 = rows
                .chunks_exact(frames)
                .map(|row| K::lag_dot(row, lag))
                .sum();
            let den = K::lag_dot(&means[bin * frames..(bin + 1) * frames], lag);
            (num, den)
        })
        .collect()
}
