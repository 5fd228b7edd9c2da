//! FFT-based dense correlator.
//!
//! Each pixel trace is zero-padded to a power of two of at least `2N - 1`
//! samples, transformed, multiplied by its own conjugate and transformed
//! back; the first `N` real samples are the linear autocorrelation sums.
//! Pixel curves are summed per bin and normalized exactly like the direct
//! correlator, with the bin-mean denominator computed by the same plan.

use crate::correlator::direct::bin_mean_trace;
use crate::correlator::profile::Profiler;
use crate::correlator::{
    Backend, BinLayout, CorrelationMatrix, Correlator, CorrelatorConfig, ProfileReport,
};
use crate::frames::{FrameStack, Pixel};
use crate::plan::{FftPlan, PlanCache};
use crate::trace::{trace_event, trace_span};
use crate::util::math::{flush_roundoff, normalize_lag};
use crate::util::CorrResult;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::sync::Arc;

/// Wiener–Khinchin correlator with cached transform plans.
pub struct FftCorrelator {
    layout: BinLayout,
    pixel_chunk: usize,
    plans: Arc<PlanCache>,
    owns_cache: bool,
    profiler: Profiler,
}

impl FftCorrelator {
    /// Creates a correlator with its own plan cache.
    ///
    /// `extra_options.save_fft_plans` decides whether the plan outlives each
    /// call; a retained plan is freed when the correlator is dropped.
    pub fn new(
        height: usize,
        width: usize,
        frames: usize,
        config: CorrelatorConfig,
    ) -> CorrResult<Self> {
        let plans = Arc::new(PlanCache::new(config.extra_options.save_fft_plans));
        Self::build(height, width, frames, config, plans, true)
    }

    /// Creates a correlator that shares `plans` with other correlators.
    ///
    /// The cache's own persistence policy applies and the caller owns its
    /// teardown.
    pub fn with_plan_cache(
        height: usize,
        width: usize,
        frames: usize,
        config: CorrelatorConfig,
        plans: Arc<PlanCache>,
    ) -> CorrResult<Self> {
        Self::build(height, width, frames, config, plans, false)
    }

    fn build(
        height: usize,
        width: usize,
        frames: usize,
        config: CorrelatorConfig,
        plans: Arc<PlanCache>,
        owns_cache: bool,
    ) -> CorrResult<Self> {
        Backend::Fft.ensure_available()?;
        let layout = BinLayout::new(height, width, frames, &config)?;
        Ok(Self {
            layout,
            pixel_chunk: config.extra_options.pixel_chunk,
            plans,
            owns_cache,
            profiler: Profiler::new(Backend::Fft, config.profile),
        })
    }

    /// Returns the plan cache used by this correlator.
    pub fn plan_cache(&self) -> &Arc<PlanCache> {
        &self.plans
    }

    /// Frees the cached plan for this correlator's signature.
    pub fn release_plans(&self) {
        self.plans.purge(&self.layout.signature());
    }

    fn acquire_plan(&self) -> CorrResult<Arc<FftPlan>> {
        let signature = self.layout.signature();
        self.plans.acquire(signature, || {
            FftPlan::build(&signature).ok_or_else(|| self.layout.resource_error("fft plan length"))
        })
    }

    /// Numerator and denominator curves of every bin, flushed of roundoff.
    fn bin_curves<T: Pixel>(
        &self,
        plan: &FftPlan,
        frames: FrameStack<'_, T>,
        means: &[Vec<f64>],
    ) -> CorrResult<Vec<(Vec<f64>, Vec<f64>)>> {
        let mut work = plan
            .checkout()
            .ok_or_else(|| self.layout.resource_error("fft scratch buffer"))?;
        let mut curves = Vec::with_capacity(means.len());
        for (sel, mean) in self.layout.selections().iter().zip(means) {
            let mut num = self.pixel_autocorr(plan, frames, sel.indices())?;
            let mut den = vec![0.0f64; plan.frames()];
            plan.accumulate_autocorr(mean.iter().copied(), &mut work, &mut den);
            flush_roundoff(&mut num);
            flush_roundoff(&mut den);
            curves.push((num, den));
        }
        plan.checkin(work);
        Ok(curves)
    }

    /// Sums the autocorrelation of every trace in `indices`.
    ///
    /// Chunks are reduced in chunk order whether or not they ran in parallel.
    fn pixel_autocorr<T: Pixel>(
        &self,
        plan: &FftPlan,
        frames: FrameStack<'_, T>,
        indices: &[usize],
    ) -> CorrResult<Vec<f64>> {
        let n = plan.frames();
        let plane = frames.pixels_per_frame();
        let data = frames.as_slice();
        let layout = &self.layout;
        let chunk_sum = |chunk: &[usize]| -> CorrResult<Vec<f64>> {
            let mut work = plan
                .checkout()
                .ok_or_else(|| layout.resource_error("fft scratch buffer"))?;
            let mut acc = vec![0.0f64; n];
            for &idx in chunk {
                let trace = (0..n).map(|t| data[t * plane + idx].to_f64());
                plan.accumulate_autocorr(trace, &mut work, &mut acc);
            }
            plan.checkin(work);
            Ok(acc)
        };

        #[cfg(feature = "rayon")]
        let partials: Vec<Vec<f64>> = indices
            .par_chunks(self.pixel_chunk)
            .map(chunk_sum)
            .collect::<CorrResult<_>>()?;
        #[cfg(not(feature = "rayon"))]
        let partials: Vec<Vec<f64>> = indices
            .chunks(self.pixel_chunk)
            .map(chunk_sum)
            .collect::<CorrResult<_>>()?;

        let mut total = vec![0.0f64; n];
        for partial in partials {
            for (t, v) in total.iter_mut().zip(partial) {
                *t += v;
            }
        }
        Ok(total)
    }
}

impl Correlator for FftCorrelator {
    fn backend(&self) -> Backend {
        Backend::Fft
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
            backend = "fft",
            bins = self.layout.num_bins(),
            frames = self.layout.frames()
        )
        .entered();

        let signature = self.layout.signature();
        let plan = self.acquire_plan()?;
        trace_event!("fft_plan", fft_len = plan.fft_len());

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
        let curves = self.bin_curves(&plan, frames, &means);
        drop(plan);
        self.plans.release(&signature);
        let curves = curves?;
        clock.lap();

        let lags = self.layout.lags();
        let mut data = Vec::with_capacity(self.layout.num_bins() * lags);
        for (sel, (num, den)) in self.layout.selections().iter().zip(&curves) {
            for lag in 1..n {
                data.push(normalize_lag(num[lag], den[lag], sel.len(), n - lag));
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

impl Drop for FftCorrelator {
    fn drop(&mut self) {
        if self.owns_cache {
            self.release_plans();
        }
    }
}
