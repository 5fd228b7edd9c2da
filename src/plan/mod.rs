//! Reusable transform plans and device buffers.
//!
//! Resources are keyed by a [`PlanSignature`] so a cached entry is only ever
//! reused for calls with the same frame shape, frame count, and dtype. The
//! cache map sits behind a `Mutex`; only insertion and removal take the lock,
//! the numeric kernels run on the returned `Arc` outside of it.

#[cfg(feature = "fft")]
mod fft;

#[cfg(feature = "fft")]
pub use fft::FftPlan;

use crate::frames::PixelType;
use crate::trace::trace_debug;
use crate::util::CorrResult;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identity of a correlation problem for caching purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlanSignature {
    /// Frame height in pixels.
    pub height: usize,
    /// Frame width in pixels.
    pub width: usize,
    /// Number of frames.
    pub frames: usize,
    /// Element type of the frames.
    pub dtype: PixelType,
}

/// Keyed cache of shared resources with an explicit acquire/release lifecycle.
pub struct ResourceCache<R> {
    persist: bool,
    entries: Mutex<HashMap<PlanSignature, Arc<R>>>,
}

/// Cache of FFT plans.
#[cfg(feature = "fft")]
pub type PlanCache = ResourceCache<FftPlan>;

impl<R> ResourceCache<R> {
    /// Creates an empty cache.
    ///
    /// With `persist` set, released entries stay cached for later calls;
    /// otherwise `release` frees them.
    pub fn new(persist: bool) -> Self {
        Self {
            persist,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if released entries are retained.
    pub fn persistent(&self) -> bool {
        self.persist
    }

    /// Returns the cached resource for `signature`, building it on a miss.
    ///
    /// `build` runs under the cache lock, so concurrent acquirers of the same
    /// signature observe a single construction.
    pub fn acquire<F>(&self, signature: PlanSignature, build: F) -> CorrResult<Arc<R>>
    where
        F: FnOnce() -> CorrResult<R>,
    {
        let mut entries = self.lock();
        if let Some(existing) = entries.get(&signature) {
            trace_debug!("cache_hit", frames = signature.frames);
            return Ok(Arc::clone(existing));
        }
        trace_debug!("cache_miss", frames = signature.frames);
        let resource = Arc::new(build()?);
        entries.insert(signature, Arc::clone(&resource));
        Ok(resource)
    }

    /// Ends a use of `signature`: retains the entry if persistent, frees it otherwise.
    pub fn release(&self, signature: &PlanSignature) {
        if !self.persist {
            self.purge(signature);
        }
    }

    /// Removes the entry for `signature` regardless of the persistence policy.
    pub fn purge(&self, signature: &PlanSignature) -> bool {
        self.lock().remove(signature).is_some()
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Returns true if an entry for `signature` is cached.
    pub fn contains(&self, signature: &PlanSignature) -> bool {
        self.lock().contains_key(signature)
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PlanSignature, Arc<R>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R> Default for ResourceCache<R> {
    fn default() -> Self {
        Self::new(false)
    }
}
