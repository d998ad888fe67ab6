//! Free-form string tags attached to a file or a stream.
//!
//! Tags are the format's escape hatch for metadata that doesn't warrant a
//! dedicated `DataLayout` field: device serial numbers, calibration blobs,
//! the record-format/data-layout self-description strings themselves.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Well-known tag keys used by the format itself, analogous to the `RF:`/
/// `DL:` convention used to stash a stream's record format and data layout
/// descriptions as tags so a reader can recover them without a schema
/// registry.
pub struct TagConventions;

impl TagConventions {
    /// Prefix for a tag carrying a `RecordFormat` description, suffixed with
    /// `"{record_type}_{version}"`.
    pub const RECORD_FORMAT_PREFIX: &'static str = "RF:";
    /// Prefix for a tag carrying a `DataLayout` JSON description, suffixed
    /// the same way as [`Self::RECORD_FORMAT_PREFIX`].
    pub const DATA_LAYOUT_PREFIX: &'static str = "DL:";
    /// File-level tag carrying the name of the device/recorder that created
    /// the file.
    pub const DEVICE_NAME: &'static str = "device_name";
    /// File-level tag carrying a serialized creation timestamp.
    pub const CREATION_TIME: &'static str = "creation_time";
    /// File-level tag carrying the tool/version string that wrote the file.
    pub const WRITER_VERSION: &'static str = "writer_version";

    pub fn record_format_key(record_type: &str, version: u32) -> String {
        format!("{}{record_type}_{version}", Self::RECORD_FORMAT_PREFIX)
    }

    pub fn data_layout_key(record_type: &str, version: u32) -> String {
        format!("{}{record_type}_{version}", Self::DATA_LAYOUT_PREFIX)
    }
}

/// An ordered string-to-string tag map. Order is preserved on round-trip
/// through JSON so two writes of the same tags produce byte-identical
/// output, which matters for the file-level/stream-level tag blocks that
/// get hashed and diffed by tooling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagMap(IndexMap<String, String>);

impl TagMap {
    pub fn new() -> Self {
        TagMap(IndexMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` into `self`. Returns the list of keys whose values
    /// conflicted, with `self`'s value left untouched (first writer wins),
    /// so callers can decide how to report a collision.
    pub fn merge(&mut self, other: &TagMap) -> Vec<String> {
        let mut conflicts = Vec::new();
        for (k, v) in other.iter() {
            match self.0.get(k) {
                Some(existing) if existing != v => conflicts.push(k.clone()),
                Some(_) => {}
                None => {
                    self.0.insert(k.clone(), v.clone());
                }
            }
        }
        conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_format_key_matches_convention() {
        assert_eq!(
            TagConventions::record_format_key("data", 1),
            "RF:data_1"
        );
        assert_eq!(
            TagConventions::data_layout_key("configuration", 2),
            "DL:configuration_2"
        );
    }

    #[test]
    fn tag_map_preserves_insertion_order_through_json() {
        let mut tags = TagMap::new();
        tags.insert("b", "2");
        tags.insert("a", "1");
        let json = serde_json::to_string(&tags).unwrap();
        let roundtripped: TagMap = serde_json::from_str(&json).unwrap();
        let keys: Vec<_> = roundtripped.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn merge_reports_conflicts_and_keeps_first_writer() {
        let mut a = TagMap::new();
        a.insert("device_name", "cam0");
        let mut b = TagMap::new();
        b.insert("device_name", "cam1");
        b.insert("extra", "x");
        let conflicts = a.merge(&b);
        assert_eq!(conflicts, vec!["device_name".to_string()]);
        assert_eq!(a.get("device_name"), Some("cam0"));
        assert_eq!(a.get("extra"), Some("x"));
    }
}
