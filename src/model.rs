//! Core record-stream identity and record types.
//!
//! A VRS file is a multiplexed sequence of [`Record`]s, each belonging to
//! exactly one [`StreamId`]. Streams are grouped by [`RecordableTypeId`], a
//! small registry of well-known device/sensor kinds, disambiguated by an
//! `instance_id` when a file contains more than one stream of the same kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a *kind* of recordable stream (camera, IMU, GPS, ...).
///
/// Values below 100 are reserved for core/generic types, values at or above
/// 100 are device-specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordableTypeId(pub u16);

impl RecordableTypeId {
    pub const UNDEFINED: RecordableTypeId = RecordableTypeId(0);
    pub const FORWARD_CAMERA_RECORDABLE_CLASS: RecordableTypeId = RecordableTypeId(214);
    pub const IMU_RECORDABLE_CLASS: RecordableTypeId = RecordableTypeId(1201);
    pub const GPS_RECORDABLE_CLASS: RecordableTypeId = RecordableTypeId(1202);

    pub fn is_core(&self) -> bool {
        self.0 < 100
    }
}

impl fmt::Display for RecordableTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stream within a file: a [`RecordableTypeId`] plus an instance number
/// disambiguating multiple streams of the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamId {
    pub type_id: RecordableTypeId,
    pub instance_id: u16,
}

impl StreamId {
    pub fn new(type_id: RecordableTypeId, instance_id: u16) -> Self {
        StreamId { type_id, instance_id }
    }

    /// Stable textual name used in tags and log messages, e.g. `"214-1"`.
    pub fn name(&self) -> String {
        format!("{}-{}", self.type_id.0, self.instance_id)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The four record kinds a stream may emit. Every stream begins with exactly
/// one `Configuration` record; `State` records snapshot mutable device
/// state; `Data` records carry the actual sensor payloads; `Tag` records
/// carry free-form metadata that isn't part of the regular data stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    Configuration,
    State,
    Data,
    Tag,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Configuration => "configuration",
            RecordType::State => "state",
            RecordType::Data => "data",
            RecordType::Tag => "tag",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single record: a timestamped, typed, versioned payload belonging to a
/// stream. The payload itself is the encoded `ContentBlock` sequence
/// produced by a `RecordFormat`; this struct only carries the envelope.
#[derive(Debug, Clone)]
pub struct Record {
    pub stream_id: StreamId,
    /// Recording timestamp, in seconds, on the file's shared time domain.
    pub timestamp: f64,
    pub record_type: RecordType,
    pub format_version: u32,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(
        stream_id: StreamId,
        timestamp: f64,
        record_type: RecordType,
        format_version: u32,
        payload: Vec<u8>,
    ) -> Self {
        Record {
            stream_id,
            timestamp,
            record_type,
            format_version,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_id_name_formats_type_and_instance() {
        let id = StreamId::new(RecordableTypeId::FORWARD_CAMERA_RECORDABLE_CLASS, 2);
        assert_eq!(id.name(), "214-2");
        assert_eq!(id.to_string(), "214-2");
    }

    #[test]
    fn stream_ids_order_by_type_then_instance() {
        let a = StreamId::new(RecordableTypeId(100), 5);
        let b = StreamId::new(RecordableTypeId(100), 6);
        let c = StreamId::new(RecordableTypeId(101), 0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn core_type_ids_are_below_100() {
        assert!(RecordableTypeId::UNDEFINED.is_core());
        assert!(!RecordableTypeId::FORWARD_CAMERA_RECORDABLE_CLASS.is_core());
    }
}
