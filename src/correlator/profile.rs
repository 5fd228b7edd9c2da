//! Stage timing for correlate calls.

use crate::correlator::Backend;
use crate::trace::trace_event;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Wall-clock durations of the stages of one correlate call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProfileReport {
    /// Backend that produced the report.
    pub backend: Backend,
    /// Gathering traces and bin means into working buffers.
    pub upload: Duration,
    /// Lag accumulation or transforms.
    pub compute: Duration,
    /// Normalization and assembly of the result matrix.
    pub readback: Duration,
}

impl ProfileReport {
    /// Returns the sum of all stages.
    pub fn total(&self) -> Duration {
        self.upload + self.compute + self.readback
    }
}

/// Records stage boundaries when profiling is enabled.
pub(crate) struct Profiler {
    backend: Backend,
    enabled: bool,
    last: Mutex<Option<ProfileReport>>,
}

/// In-flight measurement of one call.
pub(crate) struct StageClock {
    enabled: bool,
    mark: Instant,
    stages: [Duration; 3],
    next: usize,
}

impl StageClock {
    /// Closes the current stage and starts the next one.
    pub(crate) fn lap(&mut self) {
        if !self.enabled || self.next >= self.stages.len() {
            return;
        }
        let now = Instant::now();
        self.stages[self.next] = now - self.mark;
        self.mark = now;
        self.next += 1;
    }
}

impl Profiler {
    pub(crate) fn new(backend: Backend, enabled: bool) -> Self {
        Self {
            backend,
            enabled,
            last: Mutex::new(None),
        }
    }

    pub(crate) fn start(&self) -> StageClock {
        StageClock {
            enabled: self.enabled,
            mark: Instant::now(),
            stages: [Duration::ZERO; 3],
            next: 0,
        }
    }

    /// Stores the measurement of a finished call and emits it as an event.
    pub(crate) fn finish(&self, clock: StageClock) {
        if !self.enabled {
            return;
        }
        let report = ProfileReport {
            backend: self.backend,
            upload: clock.stages[0],
            compute: clock.stages[1],
            readback: clock.stages[2],
        };
        trace_event!(
            "correlate_profile",
            backend = self.backend.name(),
            upload_ms = report.upload.as_secs_f64() * 1e3,
            compute_ms = report.compute.as_secs_f64() * 1e3,
            readback_ms = report.readback.as_secs_f64() * 1e3
        );
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(report);
    }

    pub(crate) fn last(&self) -> Option<ProfileReport> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::Profiler;
    use crate::correlator::Backend;

    #[test]
    fn disabled_profiler_records_nothing() {
        let profiler = Profiler::new(Backend::Direct, false);
        let mut clock = profiler.start();
        clock.lap();
        profiler.finish(clock);
        assert!(profiler.last().is_none());
    }

    #[test]
    fn enabled_profiler_keeps_last_report() {
        let profiler = Profiler::new(Backend::Direct, true);
        let mut clock = profiler.start();
        clock.lap();
        clock.lap();
        clock.lap();
        clock.lap();
        profiler.finish(clock);
        let report = profiler.last().unwrap();
        assert_eq!(report.backend, Backend::Direct);
        assert_eq!(report.total(), report.upload + report.compute + report.readback);
    }
}
