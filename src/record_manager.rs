//! Buffers records created by a [`crate::recordable::Recordable`] until the
//! file writer is ready to drain them.
//!
//! The buffer grows by an over-allocation policy rather than exactly to
//! size on every push: fewer reallocations at the cost of occasionally
//! holding a bit more memory than strictly needed.

use crate::model::{Record, RecordType, StreamId};
use std::collections::{HashMap, VecDeque};

/// Minimum bytes a buffer grows by on any single reallocation, even for a
/// tiny record, so many small records don't each trigger their own resize.
const MIN_EXTRA_BYTES: usize = 256;
/// Fraction of the current record's size added as headroom on growth.
const OVER_ALLOC_FRACTION: f64 = 0.25;

/// Computes how many bytes a buffer of `current_size` should grow by to
/// hold a new record of `incoming_size`, once it no longer fits.
pub fn grow_by(current_size: usize, incoming_size: usize) -> usize {
    let needed = incoming_size.saturating_sub(current_size);
    let headroom = ((current_size as f64) * OVER_ALLOC_FRACTION) as usize;
    needed.max(MIN_EXTRA_BYTES).max(headroom)
}

/// FIFO queue of records awaiting background compression/write, plus
/// per-stream timestamp-monotonicity tracking.
pub struct RecordManager {
    queue: VecDeque<Record>,
    last_timestamp: HashMap<StreamId, f64>,
    queued_bytes: usize,
}

impl RecordManager {
    pub fn new() -> Self {
        RecordManager {
            queue: VecDeque::new(),
            last_timestamp: HashMap::new(),
            queued_bytes: 0,
        }
    }

    /// Copies `payload` into a new `Record` and enqueues it immediately
    /// (the record manager never holds a borrow past this call). Logs
    /// (does not error on) a timestamp regression for the stream, since a
    /// slightly-out-of-order record is a recoverable quality issue, not a
    /// fatal one — the writer's k-way merge still sorts it correctly across
    /// streams, only this stream's internal order is affected.
    pub fn create_record(
        &mut self,
        stream_id: StreamId,
        timestamp: f64,
        record_type: RecordType,
        format_version: u32,
        payload: Vec<u8>,
    ) {
        if let Some(&last) = self.last_timestamp.get(&stream_id) {
            if timestamp < last {
                tracing::warn!(
                    stream = %stream_id,
                    timestamp,
                    last,
                    "record timestamp regressed for stream"
                );
            }
        }
        self.last_timestamp.insert(stream_id, timestamp);
        self.queued_bytes += payload.len();
        self.queue.push_back(Record::new(stream_id, timestamp, record_type, format_version, payload));
    }

    /// Drains every record with `timestamp <= up_to_timestamp`, in FIFO
    /// order, handing them off to the writer's background queue.
    pub fn drain_up_to(&mut self, up_to_timestamp: f64) -> Vec<Record> {
        let mut drained = Vec::new();
        while let Some(front) = self.queue.front() {
            if front.timestamp > up_to_timestamp {
                break;
            }
            let record = self.queue.pop_front().expect("front just checked Some");
            self.queued_bytes -= record.payload.len();
            drained.push(record);
        }
        drained
    }

    pub fn drain_all(&mut self) -> Vec<Record> {
        self.queued_bytes = 0;
        self.queue.drain(..).collect()
    }

    pub fn queued_record_count(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_byte_size(&self) -> usize {
        self.queued_bytes
    }
}

impl Default for RecordManager {
    fn default() -> Self {
        RecordManager::new()
    }
}
