//! Time/stream filtering, decimation, and filtered copy/merge operations.
//!
//! Grounded on `sample_code/FilterCopySamples.cpp` and
//! `vrs/utils/FilterCopyHelpers.cpp`: a reader wrapped with a time range and
//! a stream include/exclude selector, fed through an optional
//! [`decimate::Decimator`], and written out through a [`StreamFilter`] via a
//! throttled writer.

pub mod decimate;
pub mod selector;

use crate::error::FilterError;
use crate::event_logger::{self, OperationContext};
use crate::file_reader::RecordFileReader;
use crate::file_writer::RecordFileWriter;
use crate::helpers::throttler::Throttler;
use crate::model::{Record, RecordType, RecordableTypeId, StreamId};
use selector::SelectorTerm;
use std::collections::HashSet;
use std::time::Duration;

/// An inclusive/half-open time window a record's timestamp must fall in to
/// pass the filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl TimeRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        TimeRange { min, max }
    }

    pub fn around(center: f64, radius: f64) -> Self {
        TimeRange { min: Some(center - radius), max: Some(center + radius) }
    }

    pub fn contains(&self, timestamp: f64) -> bool {
        self.min.map(|m| timestamp >= m).unwrap_or(true) && self.max.map(|m| timestamp <= m).unwrap_or(true)
    }
}

/// Stream (and record-kind) include/exclude predicate built from
/// `+selector`/`-selector` tokens. An exclude always wins over an include;
/// an empty include set means "everything not excluded passes".
#[derive(Debug, Clone, Default)]
pub struct StreamSelector {
    include_streams: HashSet<StreamId>,
    include_types: HashSet<RecordableTypeId>,
    include_kinds: HashSet<RecordType>,
    exclude_streams: HashSet<StreamId>,
    exclude_types: HashSet<RecordableTypeId>,
    exclude_kinds: HashSet<RecordType>,
}

impl StreamSelector {
    pub fn new() -> Self {
        StreamSelector::default()
    }

    pub fn parse_tokens(tokens: &[&str]) -> Result<Self, FilterError> {
        let mut selector = StreamSelector::new();
        for token in tokens {
            let (include, term) = selector::parse_selector(token)?;
            selector.add(include, term);
        }
        Ok(selector)
    }

    fn add(&mut self, include: bool, term: SelectorTerm) {
        match (include, term) {
            (true, SelectorTerm::Stream(s)) => {
                self.include_streams.insert(s);
            }
            (true, SelectorTerm::Type(t)) => {
                self.include_types.insert(t);
            }
            (true, SelectorTerm::Kind(k)) => {
                self.include_kinds.insert(k);
            }
            (false, SelectorTerm::Stream(s)) => {
                self.exclude_streams.insert(s);
            }
            (false, SelectorTerm::Type(t)) => {
                self.exclude_types.insert(t);
            }
            (false, SelectorTerm::Kind(k)) => {
                self.exclude_kinds.insert(k);
            }
        }
    }

    pub fn allows(&self, stream_id: StreamId, record_type: RecordType) -> bool {
        if self.exclude_streams.contains(&stream_id)
            || self.exclude_types.contains(&stream_id.type_id)
            || self.exclude_kinds.contains(&record_type)
        {
            return false;
        }
        let has_stream_includes = !self.include_streams.is_empty() || !self.include_types.is_empty();
        if has_stream_includes
            && !self.include_streams.contains(&stream_id)
            && !self.include_types.contains(&stream_id.type_id)
        {
            return false;
        }
        if !self.include_kinds.is_empty() && !self.include_kinds.contains(&record_type) {
            return false;
        }
        true
    }
}

/// Wraps a [`RecordFileReader`] with a time range and stream selector,
/// exposing the subset of global positions that pass both.
pub struct FilteredFileReader {
    reader: RecordFileReader,
    time_range: TimeRange,
    selector: StreamSelector,
}

impl FilteredFileReader {
    pub fn new(reader: RecordFileReader) -> Self {
        FilteredFileReader { reader, time_range: TimeRange::default(), selector: StreamSelector::default() }
    }

    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = range;
        self
    }

    pub fn with_selector(mut self, selector: StreamSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn reader(&mut self) -> &mut RecordFileReader {
        &mut self.reader
    }

    /// Global positions that pass the time range and stream selector, in
    /// file order.
    pub fn filtered_positions(&self) -> Vec<usize> {
        (0..self.reader.record_count())
            .filter(|&pos| {
                let timestamp = self.reader.entry_timestamp(pos).unwrap_or(f64::NAN);
                match (self.reader.entry_stream_id(pos), self.reader.entry_record_type(pos)) {
                    (Some(sid), Some(record_type)) => {
                        self.time_range.contains(timestamp) && self.selector.allows(sid, record_type)
                    }
                    _ => false,
                }
            })
            .collect()
    }
}

/// Implemented by a per-record transform applied during a filtered copy.
/// `Copier` (the default) passes payloads through verbatim.
pub trait StreamFilter {
    fn filter_record(&mut self, record: &Record) -> Option<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Copier;

impl StreamFilter for Copier {
    fn filter_record(&mut self, record: &Record) -> Option<Vec<u8>> {
        Some(record.payload.clone())
    }
}

/// Wraps a [`RecordFileWriter`], logging enqueue failures at an
/// exponential backoff via [`Throttler`] instead of once per record.
pub struct ThrottledWriter {
    writer: RecordFileWriter,
    throttler: Throttler,
}

impl ThrottledWriter {
    pub fn new(writer: RecordFileWriter) -> Self {
        ThrottledWriter { writer, throttler: Throttler::new(20, Duration::from_secs(10)) }
    }

    pub fn write(&mut self, records: Vec<Record>) -> Result<(), FilterError> {
        if records.is_empty() {
            return Ok(());
        }
        match self.writer.write_records_async(records) {
            Ok(()) => Ok(()),
            Err(e) => {
                if self.throttler.report(line!(), (self as *const ThrottledWriter) as usize) {
                    event_logger::warning(
                        OperationContext::new("ThrottledWriter::write", concat!(file!(), ":", line!())),
                        e.to_string(),
                    );
                }
                Err(FilterError::from(e))
            }
        }
    }

    pub fn finalize(&mut self) -> Result<(), FilterError> {
        Ok(self.writer.finalize()?)
    }
}

/// Copies every record at `positions` from `reader` through `filter` to
/// `writer`, returning how many records were actually copied (a filter
/// returning `None` drops the record).
pub fn filter_copy<F: StreamFilter>(
    reader: &mut RecordFileReader,
    positions: &[usize],
    writer: &mut ThrottledWriter,
    mut filter: F,
) -> Result<usize, FilterError> {
    let mut batch = Vec::with_capacity(positions.len());
    let mut copied = 0;
    for &pos in positions {
        let record = reader.read_record(pos)?;
        if let Some(payload) = filter.filter_record(&record) {
            batch.push(Record::new(record.stream_id, record.timestamp, record.record_type, record.format_version, payload));
            copied += 1;
        }
    }
    writer.write(batch)?;
    Ok(copied)
}

/// Copies records from several filtered readers into one output file,
/// ordered by timestamp across all of them (a real k-way merge, not a
/// per-reader concatenation): each reader's filtered positions are sorted
/// into one global `(reader_index, position, timestamp)` sequence before
/// anything is written, the same approach
/// [`crate::multi_file_reader::MultiRecordFileReader`] uses to build its
/// merged timeline. Equal timestamps keep the readers' relative order
/// (`readers[0]`'s record before `readers[1]`'s at the same instant).
pub fn filter_merge<F: StreamFilter + Clone>(
    readers: &mut [FilteredFileReader],
    writer: &mut ThrottledWriter,
    filter: F,
) -> Result<usize, FilterError> {
    let mut entries: Vec<(usize, usize, f64)> = Vec::new();
    for (reader_index, filtered) in readers.iter().enumerate() {
        for pos in filtered.filtered_positions() {
            let ts = filtered.reader.entry_timestamp(pos).unwrap_or(0.0);
            entries.push((reader_index, pos, ts));
        }
    }
    entries.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut batch = Vec::with_capacity(entries.len());
    let mut filter = filter;
    for (reader_index, pos, _) in entries {
        let record = readers[reader_index].reader.read_record(pos)?;
        if let Some(payload) = filter.filter_record(&record) {
            batch.push(Record::new(record.stream_id, record.timestamp, record.record_type, record.format_version, payload));
        }
    }
    let copied = batch.len();
    writer.write(batch)?;
    Ok(copied)
}
