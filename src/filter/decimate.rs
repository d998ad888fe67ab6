//! Drops or thins out `Data` records to reduce a copy's size, grounded on
//! `vrs/utils/cli/DefaultDecimator.{h,cpp}`. Two independent modes:
//! per-stream minimum interval, and fixed-width time buckets keeping only
//! the record closest to each bucket's center per stream. Neither mode
//! applies to `Configuration`/`State`/`Tag` records.

use crate::model::{RecordType, StreamId};
use std::collections::HashMap;

/// What a [`Decimator`] decided about one record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecimateAction {
    Keep,
    Drop,
    /// Bucket mode: the decision is deferred until the bucket closes (see
    /// [`Decimator::flush`]).
    Buffered,
}

pub trait Decimator {
    fn reset(&mut self);
    fn decimate(&mut self, stream_id: StreamId, timestamp: f64, record_type: RecordType) -> DecimateAction;
    /// Finalizes any buffered bucket, returning the `(stream, timestamp)`
    /// pairs it decided to keep.
    fn flush(&mut self) -> Vec<(StreamId, f64)>;
    /// How far out of order a kept record may land relative to its
    /// original position, because bucket decisions are deferred.
    fn grace_window(&self) -> f64;
}

pub struct DefaultDecimator {
    decimation_intervals: HashMap<StreamId, f64>,
    bucket_interval: f64,
    bucket_max_timestamp_delta: f64,
    decimate_cursors: HashMap<StreamId, f64>,
    bucket_start: Option<f64>,
    bucket_candidates: HashMap<StreamId, f64>,
    ready: Vec<(StreamId, f64)>,
}

impl DefaultDecimator {
    /// `bucket_interval` of `0.0` disables bucketing entirely, leaving only
    /// per-stream interval decimation active.
    pub fn new(decimation_intervals: HashMap<StreamId, f64>, bucket_interval: f64, bucket_max_timestamp_delta: f64) -> Self {
        DefaultDecimator {
            decimation_intervals,
            bucket_interval,
            bucket_max_timestamp_delta,
            decimate_cursors: HashMap::new(),
            bucket_start: None,
            bucket_candidates: HashMap::new(),
            ready: Vec::new(),
        }
    }

    fn submit_bucket(&mut self) {
        for (stream_id, timestamp) in self.bucket_candidates.drain() {
            self.ready.push((stream_id, timestamp));
        }
    }

    fn decimate_interval(&mut self, stream_id: StreamId, timestamp: f64) -> DecimateAction {
        if let Some(&interval) = self.decimation_intervals.get(&stream_id) {
            if interval > 0.0 {
                if let Some(&last) = self.decimate_cursors.get(&stream_id) {
                    if timestamp - last < interval {
                        return DecimateAction::Drop;
                    }
                }
                self.decimate_cursors.insert(stream_id, timestamp);
            }
        }
        DecimateAction::Keep
    }

    fn decimate_bucket(&mut self, stream_id: StreamId, timestamp: f64) -> DecimateAction {
        let bucket_index = (timestamp / self.bucket_interval).floor();
        let start = bucket_index * self.bucket_interval;
        match self.bucket_start {
            Some(current) if (current - start).abs() > f64::EPSILON => {
                self.submit_bucket();
                self.bucket_start = Some(start);
            }
            None => self.bucket_start = Some(start),
            _ => {}
        }
        let center = start + self.bucket_interval / 2.0;
        if (timestamp - center).abs() > self.bucket_max_timestamp_delta {
            return DecimateAction::Drop;
        }
        let is_better = match self.bucket_candidates.get(&stream_id) {
            Some(&existing) => (timestamp - center).abs() < (existing - center).abs(),
            None => true,
        };
        if is_better {
            self.bucket_candidates.insert(stream_id, timestamp);
        }
        DecimateAction::Buffered
    }
}

impl Decimator for DefaultDecimator {
    fn reset(&mut self) {
        self.decimate_cursors.clear();
        self.bucket_start = None;
        self.bucket_candidates.clear();
        self.ready.clear();
    }

    fn decimate(&mut self, stream_id: StreamId, timestamp: f64, record_type: RecordType) -> DecimateAction {
        if record_type != RecordType::Data {
            return DecimateAction::Keep;
        }
        if self.bucket_interval > 0.0 {
            self.decimate_bucket(stream_id, timestamp)
        } else {
            self.decimate_interval(stream_id, timestamp)
        }
    }

    fn flush(&mut self) -> Vec<(StreamId, f64)> {
        self.submit_bucket();
        std::mem::take(&mut self.ready)
    }

    fn grace_window(&self) -> f64 {
        if self.bucket_interval > 0.0 {
            self.bucket_interval + self.bucket_max_timestamp_delta
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordableTypeId;

    fn sid() -> StreamId {
        StreamId::new(RecordableTypeId(100), 0)
    }

    #[test]
    fn non_data_records_always_kept() {
        let mut d = DefaultDecimator::new(HashMap::new(), 0.0, 0.0);
        assert_eq!(d.decimate(sid(), 0.0, RecordType::Configuration), DecimateAction::Keep);
    }

    #[test]
    fn interval_mode_drops_records_too_close_together() {
        let mut intervals = HashMap::new();
        intervals.insert(sid(), 1.0);
        let mut d = DefaultDecimator::new(intervals, 0.0, 0.0);
        assert_eq!(d.decimate(sid(), 0.0, RecordType::Data), DecimateAction::Keep);
        assert_eq!(d.decimate(sid(), 0.5, RecordType::Data), DecimateAction::Drop);
        assert_eq!(d.decimate(sid(), 1.1, RecordType::Data), DecimateAction::Keep);
    }

    #[test]
    fn bucket_mode_keeps_the_closest_to_center() {
        let mut d = DefaultDecimator::new(HashMap::new(), 1.0, 0.5);
        assert_eq!(d.decimate(sid(), 0.3, RecordType::Data), DecimateAction::Buffered);
        assert_eq!(d.decimate(sid(), 0.52, RecordType::Data), DecimateAction::Buffered); // closer to center 0.5
        assert_eq!(d.decimate(sid(), 1.5, RecordType::Data), DecimateAction::Buffered); // new bucket, flushes old
        let ready = d.flush();
        assert_eq!(ready.len(), 2); // one from bucket [0,1), one from bucket [1,2)
        let kept_in_first_bucket = ready.iter().find(|(_, ts)| *ts < 1.0).unwrap();
        assert!((kept_in_first_bucket.1 - 0.52).abs() < 1e-9);
    }

    #[test]
    fn grace_window_reflects_bucket_size_when_bucketing() {
        let d = DefaultDecimator::new(HashMap::new(), 1.0, 0.2);
        assert!((d.grace_window() - 1.2).abs() < 1e-9);
        let d2 = DefaultDecimator::new(HashMap::new(), 0.0, 0.2);
        assert_eq!(d2.grace_window(), 0.0);
    }
}
