//! Direct dense correlator.
//!
//! Walks frame pairs `(t, t + τ)` and sums pixel products over each bin's
//! selection. Costs `O(N² · P)` per bin and serves as the numerical
//! reference for the parallel and FFT variants.

use crate::correlator::profile::Profiler;
use crate::correlator::{
    Backend, BinLayout, CorrelationMatrix, Correlator, CorrelatorConfig, ProfileReport,
};
use crate::frames::{FrameStack, Pixel, PixelSelection};
use crate::trace::trace_span;
use crate::util::math::normalize_lag;
use crate::util::CorrResult;

/// Single-threaded reference correlator.
pub struct DenseCorrelator {
    layout: BinLayout,
    profiler: Profiler,
}

impl DenseCorrelator {
    /// Creates a correlator for `frames` frames of `height x width`.
    ///
    /// The mask is validated eagerly: every label in `1..=num_bins` must
    /// select at least one pixel.
    pub fn new(
        height: usize,
        width: usize,
        frames: usize,
        config: CorrelatorConfig,
    ) -> CorrResult<Self> {
        let layout = BinLayout::new(height, width, frames, &config)?;
        Ok(Self {
            layout,
            profiler: Profiler::new(Backend::Direct, config.profile),
        })
    }
}

/// Mean intensity of the selection in every frame.
pub(crate) fn bin_mean_trace<T: Pixel>(planes: &[&[T]], selection: &PixelSelection) -> Vec<f64> {
    let inv = 1.0 / selection.len() as f64;
    planes
        .iter()
        .map(|plane| {
            let sum: f64 = selection.indices().iter().map(|&idx| plane[idx].to_f64()).sum();
            sum * inv
        })
        .collect()
}

fn lag_sums<T: Pixel>(
    planes: &[&[T]],
    selection: &PixelSelection,
    mean: &[f64],
    lag: usize,
) -> (f64, f64) {
    let origins = planes.len() - lag;
    let mut num = 0.0f64;
    let mut den = 0.0f64;
    for t in 0..origins {
        let a = planes[t];
        let b = planes[t + lag];
        for &idx in selection.indices() {
            num += a[idx].to_f64() * b[idx].to_f64();
        }
        den += mean[t] * mean[t + lag];
    }
    (num, den)
}

impl Correlator for DenseCorrelator {
    fn backend(&self) -> Backend {
        Backend::Direct
    }

    fn num_bins(&self) -> usize {
        self.layout.num_bins()
    }

    fn num_frames(&self) -> usize {
        self.layout.frames()
    }

    fn correlate<T: Pixel>(&self, frames: FrameStack<'_, T>) -> CorrResult<CorrelationMatrix> {
        self.layout.check(&frames)?;
        let _span = trace_span!(
            "correlate",
            backend = "direct",
            bins = self.layout.num_bins(),
            frames = self.layout.frames()
        )
        .entered();

        let mut clock = self.profiler.start();
        let planes: Vec<&[T]> = frames.iter_frames().collect();
        let means: Vec<Vec<f64>> = self
            .layout
            .selections()
            .iter()
            .map(|sel| bin_mean_trace(&planes, sel))
            .collect();
        clock.lap();

        let n = self.layout.frames();
        let lags = self.layout.lags();
        let mut sums = Vec::with_capacity(self.layout.num_bins() * lags);
        for (sel, mean) in self.layout.selections().iter().zip(&means) {
            for lag in 1..n {
                sums.push(lag_sums(&planes, sel, mean, lag));
            }
        }
        clock.lap();

        let mut data = Vec::with_capacity(sums.len());
        for (sel, row) in self.layout.selections().iter().zip(sums.chunks_exact(lags)) {
            for (col, &(num, den)) in row.iter().enumerate() {
                let lag = col + 1;
                data.push(normalize_lag(num, den, sel.len(), n - lag));
            }
        }
        clock.lap();
        self.profiler.finish(clock);

        Ok(CorrelationMatrix::from_vec(self.layout.num_bins(), lags, data))
    }

    fn last_profile(&self) -> Option<ProfileReport> {
        self.profiler.last()
    }
}
