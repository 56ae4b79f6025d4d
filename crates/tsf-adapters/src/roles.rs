//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Adapter lifecycle, filtering and composite collections."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Role capabilities layered on [`Adapter`].
use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::adapter::Adapter;
use crate::measurement::Measurement;

/// Produces measurements from an external source.
pub trait InputAdapter: Adapter {
    /// Sources this adapter produces; `None` means unrestricted.
    fn output_source_ids(&self) -> Option<Vec<String>> {
        None
    }
}

/// Consumes measurements and produces derived ones.
pub trait ActionAdapter: Adapter {
    /// Accept a batch routed to this adapter.
    fn queue_measurements_for_processing(&self, measurements: &[Measurement]);

    /// Seconds of data waiting to be published, for adapters that buffer.
    fn unpublished_samples(&self) -> Option<u32> {
        None
    }

    /// Allowed lag in seconds for concentrating adapters.
    fn lag_time(&self) -> Option<f64> {
        None
    }

    /// Sources this adapter wants; `None` means unrestricted.
    fn input_source_ids(&self) -> Option<Vec<String>> {
        None
    }

    /// Sources this adapter produces; `None` means unrestricted.
    fn output_source_ids(&self) -> Option<Vec<String>> {
        None
    }
}

/// Consumes measurements and hands them to an external sink.
pub trait OutputAdapter: Adapter {
    /// Accept a batch routed to this adapter.
    fn queue_measurements_for_processing(&self, measurements: &[Measurement]);

    /// Measurements waiting in the adapter's queue.
    fn unprocessed_measurements(&self) -> usize;

    /// Drop up to `count` of the oldest queued measurements, returning how many went.
    fn remove_measurements(&self, count: usize) -> usize;

    /// Sources this adapter wants; `None` means unrestricted.
    fn input_source_ids(&self) -> Option<Vec<String>> {
        None
    }
}

/// Hand a batch to whichever consuming role `adapter` plays. Returns `false`
/// when it consumes nothing (an input adapter, for instance).
pub fn queue_for_processing(adapter: &dyn Adapter, measurements: &[Measurement]) -> bool {
    if let Some(action) = adapter.as_action() {
        action.queue_measurements_for_processing(measurements);
    } else if let Some(output) = adapter.as_output() {
        output.queue_measurements_for_processing(measurements);
    } else if let Some(collection) = adapter.as_collection() {
        collection.queue_measurements_for_processing(measurements);
    } else {
        return false;
    }
    true
}

/// FIFO buffer for output adapters.
#[derive(Debug, Default)]
pub struct MeasurementQueue {
    items: Mutex<VecDeque<Measurement>>,
}

impl MeasurementQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch.
    pub fn push_all(&self, measurements: &[Measurement]) {
        self.items.lock().extend(measurements.iter().cloned());
    }

    /// Take up to `max` items from the front.
    pub fn drain(&self, max: usize) -> Vec<Measurement> {
        let mut items = self.items.lock();
        let count = max.min(items.len());
        items.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Remove `min(count, len)` oldest items.
    pub fn remove_oldest(&self, count: usize) -> usize {
        let mut items = self.items.lock();
        let count = count.min(items.len());
        items.drain(..count);
        count
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }
}
