//! Reads several VRS files as one merged timeline, the way a multi-part
//! capture (one file per device, or one file per recording chunk) is meant
//! to be played back together.
//!
//! Two problems a single-file reader doesn't have: files may disagree on
//! session identity (caught as an error rather than silently merged), and
//! the same `StreamId` may appear in more than one file (resolved by
//! bumping the instance id of the later file's stream, with a reverse map
//! back to its original id).

use crate::error::{MultiFileError, ReaderError};
use crate::file_reader::RecordFileReader;
use crate::model::{Record, StreamId};
use crate::tags::TagMap;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Tags whose value must agree across every file in the set, when present.
const AGREEMENT_TAGS: [&str; 2] = ["capture_time_epoch", "session_id"];

pub struct MultiRecordFileReader {
    readers: Vec<RecordFileReader>,
    /// `remap[file_index][original_stream_id] = remapped_stream_id`
    remap: Vec<HashMap<StreamId, StreamId>>,
    /// `reverse[remapped_stream_id] = (file_index, original_stream_id)`
    reverse: HashMap<StreamId, (usize, StreamId)>,
    /// Global merge order: `(file_index, local_position)`, sorted by
    /// `(timestamp, file-arrival-order)`.
    merged: Vec<(usize, usize)>,
    tags: TagMap,
}

impl MultiRecordFileReader {
    pub fn open_files(paths: &[impl AsRef<Path>], auto_reconstruct_index: bool) -> Result<Self, MultiFileError> {
        let mut readers = Vec::with_capacity(paths.len());
        for path in paths {
            readers.push(RecordFileReader::open_file(path, auto_reconstruct_index)?);
        }
        Self::from_readers(readers)
    }

    pub fn from_readers(readers: Vec<RecordFileReader>) -> Result<Self, MultiFileError> {
        let tags = Self::check_tag_agreement(&readers)?;
        let (remap, reverse) = Self::resolve_stream_collisions(&readers);
        let merged = Self::build_merge_order(&readers);
        Ok(MultiRecordFileReader { readers, remap, reverse, merged, tags })
    }

    fn check_tag_agreement(readers: &[RecordFileReader]) -> Result<TagMap, MultiFileError> {
        let mut agreed = TagMap::default();
        for (i, reader) in readers.iter().enumerate() {
            for key in AGREEMENT_TAGS {
                if let Some(value) = reader.tags().get(key) {
                    match agreed.get(key) {
                        Some(existing) if existing != value => {
                            return Err(MultiFileError::TagCollision {
                                key: key.to_string(),
                                stream: format!("file[{i}]"),
                                first: existing.to_string(),
                                second: value.to_string(),
                            });
                        }
                        Some(_) => {}
                        None => {
                            agreed.insert(key.to_string(), value.to_string());
                        }
                    }
                }
            }
        }
        Ok(agreed)
    }

    fn resolve_stream_collisions(
        readers: &[RecordFileReader],
    ) -> (Vec<HashMap<StreamId, StreamId>>, HashMap<StreamId, (usize, StreamId)>) {
        let mut remap: Vec<HashMap<StreamId, StreamId>> = vec![HashMap::new(); readers.len()];
        let mut reverse: HashMap<StreamId, (usize, StreamId)> = HashMap::new();
        let mut used: HashSet<StreamId> = HashSet::new();

        for (file_index, reader) in readers.iter().enumerate() {
            let mut streams = reader.streams();
            streams.sort();
            for original in streams {
                let resolved = if used.contains(&original) {
                    let mut bumped = original;
                    loop {
                        bumped.instance_id = bumped.instance_id.wrapping_add(1);
                        if !used.contains(&bumped) {
                            break;
                        }
                    }
                    remap[file_index].insert(original, bumped);
                    bumped
                } else {
                    original
                };
                used.insert(resolved);
                reverse.insert(resolved, (file_index, original));
            }
        }
        (remap, reverse)
    }

    fn build_merge_order(readers: &[RecordFileReader]) -> Vec<(usize, usize)> {
        let mut entries: Vec<(usize, usize, f64)> = Vec::new();
        for (file_index, reader) in readers.iter().enumerate() {
            for pos in 0..reader.record_count() {
                let ts = reader.entry_timestamp(pos).unwrap_or(0.0);
                entries.push((file_index, pos, ts));
            }
        }
        // Stable sort: equal timestamps keep the (file_index, pos) arrival
        // order already present, giving FIFO-within-source-file semantics.
        entries.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));
        entries.into_iter().map(|(f, p, _)| (f, p)).collect()
    }

    pub fn record_count(&self) -> usize {
        self.merged.len()
    }

    pub fn tags(&self) -> &TagMap {
        &self.tags
    }

    pub fn streams(&self) -> Vec<StreamId> {
        self.reverse.keys().copied().collect()
    }

    /// Maps a remapped (merged-view) `StreamId` back to the file it came
    /// from and its id in that file's own namespace.
    pub fn original_stream(&self, merged_id: StreamId) -> Option<(usize, StreamId)> {
        self.reverse.get(&merged_id).copied()
    }

    pub fn read_record(&mut self, global_pos: usize) -> Result<Record, ReaderError> {
        let (file_index, local_pos) = *self
            .merged
            .get(global_pos)
            .ok_or(ReaderError::StreamNotFound(format!("position {global_pos}")))?;
        let mut record = self.readers[file_index].read_record(local_pos)?;
        if let Some(remapped) = self.remap[file_index].get(&record.stream_id) {
            record.stream_id = *remapped;
        }
        Ok(record)
    }

    pub fn is_degenerate_single_file(&self) -> bool {
        self.readers.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_writer::{RecordFileWriter, WriteOptions};
    use crate::model::{Record, RecordType, RecordableTypeId};
    use tempfile::tempdir;

    fn write_file(path: &std::path::Path, stream: StreamId, tag: Option<(&str, &str)>) {
        let mut writer = RecordFileWriter::create(path, WriteOptions::default()).unwrap();
        if let Some((k, v)) = tag {
            writer.set_tag(k, v);
        }
        writer
            .write_records_async(vec![Record::new(stream, 1.0, RecordType::Data, 1, vec![1, 2])])
            .unwrap();
        writer.finalize().unwrap();
    }

    #[test]
    fn merges_two_files_in_timestamp_order() {
        let dir = tempdir().unwrap();
        let p0 = dir.path().join("a.vrs");
        let p1 = dir.path().join("b.vrs");
        write_file(&p0, StreamId::new(RecordableTypeId(100), 0), None);
        write_file(&p1, StreamId::new(RecordableTypeId(100), 1), None);
        let multi = MultiRecordFileReader::open_files(&[&p0, &p1], false).unwrap();
        assert_eq!(multi.record_count(), 2);
    }

    #[test]
    fn colliding_stream_ids_get_remapped() {
        let dir = tempdir().unwrap();
        let p0 = dir.path().join("a.vrs");
        let p1 = dir.path().join("b.vrs");
        let sid = StreamId::new(RecordableTypeId(100), 0);
        write_file(&p0, sid, None);
        write_file(&p1, sid, None);
        let multi = MultiRecordFileReader::open_files(&[&p0, &p1], false).unwrap();
        assert_eq!(multi.streams().len(), 2);
    }

    #[test]
    fn disagreeing_session_tags_are_rejected() {
        let dir = tempdir().unwrap();
        let p0 = dir.path().join("a.vrs");
        let p1 = dir.path().join("b.vrs");
        write_file(&p0, StreamId::new(RecordableTypeId(100), 0), Some(("session_id", "s1")));
        write_file(&p1, StreamId::new(RecordableTypeId(100), 1), Some(("session_id", "s2")));
        let err = MultiRecordFileReader::open_files(&[&p0, &p1], false).unwrap_err();
        assert!(matches!(err, MultiFileError::TagCollision { .. }));
    }
}
