//! Data-parallel dense correlator.
//!
//! A call runs in three stages: upload (upcast the selected traces into a
//! pixel-major `f64` device buffer and reduce bin means), dispatch (one rayon
//! work unit per (bin, lag)), and readback (normalize units into the
//! matrix). The device buffer comes from a [`ResourceCache`] so callers that
//! opt into `reuse_buffers` keep it allocated between calls.

use crate::correlator::profile::Profiler;
use crate::correlator::{
    Backend, BinLayout, CorrelationMatrix, Correlator, CorrelatorConfig, ProfileReport,
};
use crate::frames::{FrameStack, Pixel};
use crate::kernel::rayon::{bin_means_par, lag_units_par, upload_traces_par};
use crate::kernel::LagDot;
use crate::plan::ResourceCache;
use crate::trace::{trace_event, trace_span};
use crate::util::math::normalize_lag;
use crate::util::CorrResult;
use std::sync::{Mutex, PoisonError};

/// Upcast traces and bin means for one signature.
pub(crate) struct DeviceBuffers {
    traces: Vec<f64>,
    means: Vec<f64>,
}

impl DeviceBuffers {
    fn allocate(layout: &BinLayout) -> CorrResult<Self> {
        let frames = layout.frames();
        let trace_len = layout
            .selected_pixels()
            .checked_mul(frames)
            .ok_or_else(|| layout.resource_error("device trace buffer size"))?;
        let mean_len = layout.num_bins() * frames;
        Ok(Self {
            traces: zeroed(trace_len).ok_or_else(|| layout.resource_error("device trace buffer"))?,
            means: zeroed(mean_len).ok_or_else(|| layout.resource_error("device mean buffer"))?,
        })
    }
}

fn zeroed(len: usize) -> Option<Vec<f64>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).ok()?;
    buf.resize(len, 0.0);
    Some(buf)
}

/// Dense correlator that distributes (bin, lag) units over the rayon pool.
pub struct ParallelDenseCorrelator {
    layout: BinLayout,
    pixel_index: Vec<usize>,
    offsets: Vec<usize>,
    buffers: ResourceCache<Mutex<DeviceBuffers>>,
    profiler: Profiler,
}

impl ParallelDenseCorrelator {
    /// Creates a correlator for `frames` frames of `height x width`.
    ///
    /// With `extra_options.reuse_buffers` the device buffer survives between
    /// calls; otherwise it is allocated and freed inside each call.
    pub fn new(
        height: usize,
        width: usize,
        frames: usize,
        config: CorrelatorConfig,
    ) -> CorrResult<Self> {
        Backend::Device.ensure_available()?;
        let layout = BinLayout::new(height, width, frames, &config)?;
        let mut pixel_index = Vec::with_capacity(layout.selected_pixels());
        let mut offsets = Vec::with_capacity(layout.num_bins() + 1);
        offsets.push(0);
        for sel in layout.selections() {
            pixel_index.extend_from_slice(sel.indices());
            offsets.push(pixel_index.len());
        }
        Ok(Self {
            layout,
            pixel_index,
            offsets,
            buffers: ResourceCache::new(config.extra_options.reuse_buffers),
            profiler: Profiler::new(Backend::Device, config.profile),
        })
    }

    /// Returns true if a device buffer is currently allocated.
    pub fn has_cached_buffers(&self) -> bool {
        self.buffers.contains(&self.layout.signature())
    }

    /// Frees a retained device buffer.
    pub fn release_buffers(&self) {
        self.buffers.purge(&self.layout.signature());
    }

    fn run<T: Pixel>(&self, frames: FrameStack<'_, T>, bufs: &mut DeviceBuffers) -> CorrelationMatrix {
        let n = self.layout.frames();
        let lags = self.layout.lags();
        let mut clock = self.profiler.start();

        upload_traces_par(frames, &self.pixel_index, &mut bufs.traces);
        bin_means_par(&bufs.traces, &self.offsets, n, &mut bufs.means);
        clock.lap();

        let units = lag_units_par::<LagDot>(&bufs.traces, &bufs.means, &self.offsets, n);
        clock.lap();

        let mut data = Vec::with_capacity(units.len());
        for (sel, row) in self.layout.selections().iter().zip(units.chunks_exact(lags)) {
            for (col, &(num, den)) in row.iter().enumerate() {
                data.push(normalize_lag(num, den, sel.len(), n - (col + 1)));
            }
        }
        clock.lap();
        self.profiler.finish(clock);

        CorrelationMatrix::from_vec(self.layout.num_bins(), lags, data)
    }
}

impl Correlator for ParallelDenseCorrelator {
    fn backend(&self) -> Backend {
        Backend::Device
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
            backend = "device",
            bins = self.layout.num_bins(),
            frames = self.layout.frames(),
            units = self.layout.num_bins() * self.layout.lags()
        )
        .entered();

        let signature = self.layout.signature();
        let slot = self.buffers.acquire(signature, || {
            DeviceBuffers::allocate(&self.layout).map(Mutex::new)
        })?;
        let matrix = {
            let mut bufs = slot.lock().unwrap_or_else(PoisonError::into_inner);
            self.run(frames, &mut bufs)
        };
        self.buffers.release(&signature);
        trace_event!("device_buffers", retained = self.buffers.contains(&signature));
        Ok(matrix)
    }

    fn last_profile(&self) -> Option<ProfileReport> {
        self.profiler.last()
    }
}
