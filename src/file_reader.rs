//! `RecordFileReader`: opens a VRS file written by [`crate::file_writer`]
//! and provides index-based random access plus a sequential
//! `StreamPlayer` walk, falling back to a full sequential scan when the
//! index trailer is missing or damaged, the documented recovery path for
//! a truncated archive.

use crate::chunked_file::{ChunkedFile, DiskChunkedFile};
use crate::compression::{self, CompressionType};
use crate::content_block::{dispatch_record, RecordHeaderInfo, StreamPlayer};
use crate::error::ReaderError;
use crate::file_writer::{FileTrailer, IndexEntry, FILE_HEADER_SIZE, FILE_MAGIC, RECORD_HEADER_SIZE, RECORD_MAGIC};
use crate::model::{Record, RecordType, StreamId};
use crate::record_format::RecordFormat;
use crate::tags::TagMap;
use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashMap;
use std::path::Path;

struct FileHeader {
    index_offset: u64,
    index_size: u64,
}

fn read_file_header(file: &mut DiskChunkedFile) -> Result<FileHeader, ReaderError> {
    let mut buf = [0u8; FILE_HEADER_SIZE as usize];
    file.read_at(0, &mut buf)?;
    if &buf[0..4] != FILE_MAGIC {
        return Err(ReaderError::NotAVrsFile);
    }
    let format_version = LittleEndian::read_u32(&buf[4..8]);
    if format_version != 1 {
        return Err(ReaderError::UnsupportedFileVersion(format_version));
    }
    let index_offset = LittleEndian::read_u64(&buf[20..28]);
    let index_size = LittleEndian::read_u64(&buf[28..36]);
    Ok(FileHeader { index_offset, index_size })
}

fn decode_record_type(id: u8) -> RecordType {
    match id {
        0 => RecordType::Configuration,
        1 => RecordType::State,
        3 => RecordType::Tag,
        _ => RecordType::Data,
    }
}

/// Reads one record header at `offset`, returning the entry plus the
/// offset just past this record (where the next header begins).
fn scan_one(file: &mut DiskChunkedFile, offset: u64) -> Result<(IndexEntry, u64), ReaderError> {
    let mut header = [0u8; RECORD_HEADER_SIZE];
    file.read_at(offset, &mut header)?;
    let magic = LittleEndian::read_u32(&header[0..4]);
    if magic != RECORD_MAGIC {
        return Err(ReaderError::IndexUnavailable);
    }
    let stream_type = LittleEndian::read_u16(&header[4..6]);
    let stream_instance = LittleEndian::read_u16(&header[6..8]);
    let timestamp = LittleEndian::read_f64(&header[8..16]);
    let record_type = decode_record_type(header[16]);
    let format_version = LittleEndian::read_u32(&header[17..21]);
    let compressed_size = LittleEndian::read_u32(&header[26..30]);
    let entry = IndexEntry {
        stream_type,
        stream_instance,
        timestamp,
        record_type: record_type.as_str().to_string(),
        format_version,
        offset,
    };
    let next = offset + RECORD_HEADER_SIZE as u64 + compressed_size as u64;
    Ok((entry, next))
}

pub struct RecordFileReader {
    file: DiskChunkedFile,
    index: Vec<IndexEntry>,
    by_stream: HashMap<StreamId, Vec<usize>>,
    cache: HashMap<StreamId, (usize, Record)>,
    tags: TagMap,
}

impl RecordFileReader {
    pub fn open_file(path: impl AsRef<Path>, auto_reconstruct_index: bool) -> Result<Self, ReaderError> {
        let path = path.as_ref();
        let mut file = DiskChunkedFile::open_read(path)?;
        let header = read_file_header(&mut file)?;

        let trailer = if header.index_size > 0 {
            let mut buf = vec![0u8; header.index_size as usize];
            file.read_at(header.index_offset, &mut buf)?;
            serde_json::from_slice::<FileTrailer>(&buf).map_err(|_| ReaderError::IndexUnavailable)
        } else {
            Err(ReaderError::IndexUnavailable)
        };

        let (index, tags) = match trailer {
            Ok(trailer) => (trailer.index, trailer.tags),
            Err(_) if auto_reconstruct_index => (Self::scan_all(&mut file, header.index_offset)?, TagMap::default()),
            Err(e) => return Err(e),
        };

        let mut by_stream: HashMap<StreamId, Vec<usize>> = HashMap::new();
        for (pos, entry) in index.iter().enumerate() {
            let sid = StreamId::new(crate::model::RecordableTypeId(entry.stream_type), entry.stream_instance);
            by_stream.entry(sid).or_default().push(pos);
        }

        Ok(RecordFileReader { file, index, by_stream, cache: HashMap::new(), tags })
    }

    /// Sequentially walks the file from `first_offset` to end of file,
    /// re-deriving the index one record header at a time. Used when the
    /// trailer is missing (writer never finalized) or failed to parse.
    fn scan_all(file: &mut DiskChunkedFile, stop_at: u64) -> Result<Vec<IndexEntry>, ReaderError> {
        let mut offset = FILE_HEADER_SIZE;
        let end = if stop_at > 0 { stop_at } else { file.len() };
        let mut entries = Vec::new();
        while offset < end {
            match scan_one(file, offset) {
                Ok((entry, next)) => {
                    entries.push(entry);
                    offset = next;
                }
                Err(_) => break,
            }
        }
        Ok(entries)
    }

    pub fn record_count(&self) -> usize {
        self.index.len()
    }

    pub fn tags(&self) -> &TagMap {
        &self.tags
    }

    pub fn entry_timestamp(&self, pos: usize) -> Option<f64> {
        self.index.get(pos).map(|e| e.timestamp)
    }

    pub fn entry_stream_id(&self, pos: usize) -> Option<StreamId> {
        self.index
            .get(pos)
            .map(|e| StreamId::new(crate::model::RecordableTypeId(e.stream_type), e.stream_instance))
    }

    pub fn entry_record_type(&self, pos: usize) -> Option<RecordType> {
        self.index.get(pos).map(|e| match e.record_type.as_str() {
            "configuration" => RecordType::Configuration,
            "state" => RecordType::State,
            "tag" => RecordType::Tag,
            _ => RecordType::Data,
        })
    }

    pub fn streams(&self) -> Vec<StreamId> {
        self.by_stream.keys().copied().collect()
    }

    pub fn stream_record_count(&self, stream_id: StreamId) -> usize {
        self.by_stream.get(&stream_id).map(Vec::len).unwrap_or(0)
    }

    /// Global index positions belonging to `stream_id`, in file (and thus
    /// timestamp) order. Index `i` here is the stream-relative "frame
    /// index" [`crate::video_frame_handler::VideoFrameHandler`] tracks.
    pub fn stream_positions(&self, stream_id: StreamId) -> &[usize] {
        self.by_stream.get(&stream_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn read_at_index(&mut self, pos: usize) -> Result<Record, ReaderError> {
        let entry = self.index.get(pos).ok_or(ReaderError::IndexUnavailable)?.clone();
        let mut header = [0u8; RECORD_HEADER_SIZE];
        self.file.read_at(entry.offset, &mut header)?;
        let compression_type = match header[21] {
            1 => CompressionType::Lz4,
            2 => CompressionType::Zstd,
            _ => CompressionType::None,
        };
        let uncompressed_size = LittleEndian::read_u32(&header[22..26]) as usize;
        let compressed_size = LittleEndian::read_u32(&header[26..30]) as usize;
        let mut compressed = vec![0u8; compressed_size];
        self.file.read_at(entry.offset + RECORD_HEADER_SIZE as u64, &mut compressed)?;
        let payload = compression::decompress(&compressed, compression_type, uncompressed_size)?;
        let stream_id = StreamId::new(crate::model::RecordableTypeId(entry.stream_type), entry.stream_instance);
        let record_type = match entry.record_type.as_str() {
            "configuration" => RecordType::Configuration,
            "state" => RecordType::State,
            "tag" => RecordType::Tag,
            _ => RecordType::Data,
        };
        Ok(Record::new(stream_id, entry.timestamp, record_type, entry.format_version, payload))
    }

    /// Reads and decompresses the record at global index position `pos`.
    pub fn read_record(&mut self, pos: usize) -> Result<Record, ReaderError> {
        self.read_at_index(pos)
    }

    /// Returns the earliest record for `stream_id` with `timestamp >=
    /// target`, decompressed (the first record at or after the requested
    /// time). Caches the single most recently read record per stream, since
    /// scrubbing playback typically re-reads the same neighborhood
    /// repeatedly.
    pub fn get_record_by_time(&mut self, stream_id: StreamId, target: f64) -> Result<Option<Record>, ReaderError> {
        let positions = match self.by_stream.get(&stream_id) {
            Some(p) => p.clone(),
            None => return Ok(None),
        };
        let found = positions.partition_point(|&pos| self.index[pos].timestamp < target);
        if found == positions.len() {
            return Ok(None);
        }
        let pos = positions[found];

        if let Some((cached_pos, cached)) = self.cache.get(&stream_id) {
            if *cached_pos == pos {
                return Ok(Some(cached.clone()));
            }
        }

        let record = self.read_at_index(pos)?;
        self.cache.insert(stream_id, (pos, record.clone()));
        Ok(Some(record))
    }

    /// Walks every record in file order, dispatching content blocks to
    /// `player` via `format_for`, which resolves the `RecordFormat` for a
    /// given stream/record type/version pair (normally backed by tags read
    /// up front by the caller). `is_keyframe_for` answers whether a given
    /// record is a video keyframe; records of non-video streams can ignore
    /// the argument since `dispatch_record` only consults it for
    /// `ContentBlock::ImageVideo` blocks.
    pub fn for_each_record<P, F, K>(&mut self, player: &mut P, format_for: F, is_keyframe_for: K) -> Result<(), ReaderError>
    where
        P: StreamPlayer,
        F: Fn(StreamId, RecordType, u32) -> Option<RecordFormat>,
        K: Fn(&Record) -> bool,
    {
        let mut stream_sequences: std::collections::HashMap<StreamId, usize> = std::collections::HashMap::new();
        for pos in 0..self.index.len() {
            let record = self.read_at_index(pos)?;
            let stream_sequence = {
                let seq = stream_sequences.entry(record.stream_id).or_insert(0);
                let current = *seq;
                *seq += 1;
                current
            };
            let header_info = RecordHeaderInfo {
                stream_id: record.stream_id,
                timestamp: record.timestamp,
                record_type: record.record_type,
                format_version: record.format_version,
                uncompressed_size: record.payload.len(),
                stream_sequence,
            };
            if let Some(format) = format_for(record.stream_id, record.record_type, record.format_version) {
                let is_keyframe = is_keyframe_for(&record);
                dispatch_record(player, &header_info, &format, &record.payload, None, None, is_keyframe, &[])?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_writer::{RecordFileWriter, WriteOptions};
    use crate::model::RecordableTypeId;
    use tempfile::tempdir;

    fn sid(instance: u16) -> StreamId {
        StreamId::new(RecordableTypeId(100), instance)
    }

    #[test]
    fn reads_back_records_via_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("r.vrs");
        let mut writer = RecordFileWriter::create(&path, WriteOptions::default()).unwrap();
        writer
            .write_records_async(vec![
                Record::new(sid(0), 1.0, RecordType::Data, 1, vec![1, 2, 3]),
                Record::new(sid(0), 2.0, RecordType::Data, 1, vec![4, 5]),
            ])
            .unwrap();
        writer.finalize().unwrap();

        let mut reader = RecordFileReader::open_file(&path, false).unwrap();
        assert_eq!(reader.record_count(), 2);
        let r0 = reader.read_record(0).unwrap();
        assert_eq!(r0.payload, vec![1, 2, 3]);
        let r1 = reader.read_record(1).unwrap();
        assert_eq!(r1.payload, vec![4, 5]);
    }

    #[test]
    fn get_record_by_time_returns_earliest_at_or_after() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("r.vrs");
        let mut writer = RecordFileWriter::create(&path, WriteOptions::default()).unwrap();
        writer
            .write_records_async(vec![
                Record::new(sid(0), 1.0, RecordType::Data, 1, vec![1]),
                Record::new(sid(0), 3.0, RecordType::Data, 1, vec![3]),
            ])
            .unwrap();
        writer.finalize().unwrap();

        let mut reader = RecordFileReader::open_file(&path, false).unwrap();
        let rec = reader.get_record_by_time(sid(0), 0.5).unwrap().unwrap();
        assert_eq!(rec.payload, vec![1]);
        let rec = reader.get_record_by_time(sid(0), 1.0).unwrap().unwrap();
        assert_eq!(rec.payload, vec![1]);
        let rec = reader.get_record_by_time(sid(0), 2.5).unwrap().unwrap();
        assert_eq!(rec.payload, vec![3]);
        assert!(reader.get_record_by_time(sid(0), 3.5).unwrap().is_none());
    }

    #[test]
    fn auto_reconstructs_index_when_trailer_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("r.vrs");
        let mut writer = RecordFileWriter::create(&path, WriteOptions::default()).unwrap();
        writer
            .write_records_async(vec![Record::new(sid(0), 1.0, RecordType::Data, 1, vec![9, 9])])
            .unwrap();
        // Drop the writer without finalizing: no index trailer is written,
        // only the reserved (still-zeroed) header.
        writer.close_file_async().unwrap();
        writer.wait_for_file_closed().unwrap();
        // Emulate an unfinalized file by zeroing the header's index fields.
        {
            use std::io::{Seek, SeekFrom, Write};
            let mut f = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
            f.seek(SeekFrom::Start(20)).unwrap();
            f.write_all(&[0u8; 16]).unwrap();
        }
        let mut reader = RecordFileReader::open_file(&path, true).unwrap();
        assert_eq!(reader.record_count(), 1);
    }
}
