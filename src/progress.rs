//! Run progress accounting
//!
//! Two counters: segments, advancing on every segment completion (repairs,
//! no-ops and unrepairable segments alike), and uploads, which exists only
//! once the first repair is scheduled. Rendering is left to the log; the
//! counters are the contract.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Upload counter state, created on the first scheduled repair
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    /// Repairs scheduled so far
    pub scheduled: u64,
    /// Repair attempts that terminated (success or final failure)
    pub finished: u64,
}

/// Shared progress counters for one run
#[derive(Debug)]
pub struct Progress {
    segments_total: u64,
    segments_done: AtomicU64,
    // Lazy: a check of a healthy posting has no upload phase at all.
    // The mutex guards single instantiation and both fields.
    uploads: Mutex<Option<UploadProgress>>,
}

impl Progress {
    /// Create counters for a run over `segments_total` segments
    pub fn new(segments_total: u64) -> Self {
        Self {
            segments_total,
            segments_done: AtomicU64::new(0),
            uploads: Mutex::new(None),
        }
    }

    /// Total segments in the run
    pub fn segments_total(&self) -> u64 {
        self.segments_total
    }

    /// Segments completed so far
    pub fn segments_done(&self) -> u64 {
        self.segments_done.load(Ordering::Relaxed)
    }

    /// Record one completed segment
    pub fn segment_done(&self) {
        let done = self.segments_done.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("checked {}/{} segments", done, self.segments_total);
    }

    /// Record a newly scheduled repair, materializing the upload counter on
    /// first use
    pub fn upload_scheduled(&self) {
        let mut uploads = self.uploads.lock().expect("progress mutex poisoned");
        let state = uploads.get_or_insert_with(UploadProgress::default);
        state.scheduled += 1;
    }

    /// Record a terminated repair attempt
    pub fn upload_finished(&self) {
        let mut uploads = self.uploads.lock().expect("progress mutex poisoned");
        if let Some(state) = uploads.as_mut() {
            state.finished += 1;
            debug!("uploaded {}/{} articles", state.finished, state.scheduled);
        }
    }

    /// Upload counter state; `None` when no repair was ever scheduled
    pub fn uploads(&self) -> Option<UploadProgress> {
        *self.uploads.lock().expect("progress mutex poisoned")
    }
}
