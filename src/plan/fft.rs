//! Zero-padded autocorrelation plans built on `rustfft`.

use crate::plan::PlanSignature;
use crate::util::math::padded_len;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Forward/inverse transform pair for one trace length.
pub struct FftPlan {
    frames: usize,
    fft_len: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    scratch_len: usize,
    pool: Mutex<Vec<FftScratch>>,
}

/// Per-worker transform buffers, pooled by the plan between uses.
pub(crate) struct FftScratch {
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl FftPlan {
    /// Plans transforms for traces of `signature.frames` samples.
    ///
    /// Returns `None` when the padded length is not representable.
    pub fn build(signature: &PlanSignature) -> Option<Self> {
        let frames = signature.frames;
        let fft_len = padded_len(frames)?;
        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Some(Self {
            frames,
            fft_len,
            forward,
            inverse,
            scratch_len,
            pool: Mutex::new(Vec::new()),
        })
    }

    /// Returns the trace length the plan was built for.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Returns the zero-padded transform length.
    pub fn fft_len(&self) -> usize {
        self.fft_len
    }

    /// Takes an idle scratch set from the pool, allocating one if it is empty.
    ///
    /// Returns `None` when the allocation fails.
    pub(crate) fn checkout(&self) -> Option<FftScratch> {
        if let Some(work) = self.lock_pool().pop() {
            return Some(work);
        }
        Some(FftScratch {
            buffer: zeroed(self.fft_len)?,
            scratch: zeroed(self.scratch_len)?,
        })
    }

    /// Returns a scratch set to the pool.
    pub(crate) fn checkin(&self, work: FftScratch) {
        self.lock_pool().push(work);
    }

    /// Returns the number of pooled scratch sets.
    pub(crate) fn idle_scratch(&self) -> usize {
        self.lock_pool().len()
    }

    fn lock_pool(&self) -> MutexGuard<'_, Vec<FftScratch>> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds the linear autocorrelation of `trace` to `acc`.
    ///
    /// `acc[lag]` receives `Σ_{t < frames - lag} trace[t] * trace[t + lag]` for
    /// `lag in 0..frames`.
    pub(crate) fn accumulate_autocorr(
        &self,
        trace: impl ExactSizeIterator<Item = f64>,
        work: &mut FftScratch,
        acc: &mut [f64],
    ) {
        debug_assert_eq!(trace.len(), self.frames);
        debug_assert_eq!(acc.len(), self.frames);

        let buf = &mut work.buffer;
        for (slot, value) in buf.iter_mut().zip(trace) {
            *slot = Complex { re: value, im: 0.0 };
        }
        for slot in &mut buf[self.frames..] {
            *slot = Complex { re: 0.0, im: 0.0 };
        }

        self.forward.process_with_scratch(buf, &mut work.scratch);
        for v in buf.iter_mut() {
            *v = Complex {
                re: v.norm_sqr(),
                im: 0.0,
            };
        }
        self.inverse.process_with_scratch(buf, &mut work.scratch);

        let scale = 1.0 / self.fft_len as f64;
        for (out, v) in acc.iter_mut().zip(buf.iter()) {
            *out += v.re * scale;
        }
    }
}

fn zeroed(len: usize) -> Option<Vec<Complex<f64>>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).ok()?;
    buf.resize(len, Complex { re: 0.0, im: 0.0 });
    Some(buf)
}
