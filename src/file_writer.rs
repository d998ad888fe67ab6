//! `RecordFileWriter`: turns a stream of already-created [`Record`]s into a
//! VRS file on disk.
//!
//! Concurrency model (spec §5): producers call `create_record` synchronously
//! on a [`crate::record_manager::RecordManager`] (copy-only, never
//! suspends); `write_records_async` hands a drained batch to a bounded
//! worker pool that compresses records per-stream in parallel; a single
//! background thread k-way merges the compressed output back into
//! submission order and appends it to disk: one writer, one file, a
//! reserved header region, and a parallel compression stage ahead of the
//! merge via a `crossbeam_channel` pipeline so the writer thread is never
//! blocked waiting on the pool.

use crate::chunked_file::{ChunkedFile, DiskChunkedFile};
use crate::compression::{self, CompressionPreset, CompressionType};
use crate::error::WriterError;
use crate::model::{Record, RecordType, StreamId};
use crate::tags::TagMap;
use byteorder::{ByteOrder, LittleEndian};
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

pub const FILE_MAGIC: &[u8; 4] = b"VRS1";
pub const FILE_HEADER_SIZE: u64 = 44;
pub const RECORD_MAGIC: u32 = 0x5652_4331;
pub const RECORD_HEADER_SIZE: usize = 30;

/// Tunables for a `RecordFileWriter`.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub default_preset: CompressionPreset,
    pub worker_count: usize,
    /// Maximum size in bytes of any one chunk file on disk before the
    /// writer rolls over to `<path>_1`, `<path>_2`, ... `u64::MAX` (the
    /// default) means a single unbounded chunk.
    pub max_chunk_size: u64,
}

impl Default for WriteOptions {
    fn default() -> Self {
        let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        WriteOptions {
            default_preset: CompressionPreset::default(),
            worker_count: workers.min(4),
            max_chunk_size: u64::MAX,
        }
    }
}

impl WriteOptions {
    /// Caps the requested worker count to the smaller of what the caller
    /// asked for and what the machine actually offers.
    pub fn with_worker_count(mut self, requested: usize) -> Self {
        let available = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        self.worker_count = requested.min(available).max(1);
        self
    }

    pub fn with_max_chunk_size(mut self, max_chunk_size: u64) -> Self {
        self.max_chunk_size = max_chunk_size;
        self
    }
}

/// Everything written after the last record: file-level tags plus the
/// record index, serialized as one JSON blob.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileTrailer {
    pub tags: TagMap,
    pub index: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub stream_type: u16,
    pub stream_instance: u16,
    pub timestamp: f64,
    pub record_type: String,
    pub format_version: u32,
    pub offset: u64,
}

struct PendingRecord {
    batch_id: u64,
    seq: usize,
    preset: CompressionPreset,
    record: Record,
}

struct CompressedOut {
    seq: usize,
    stream_id: StreamId,
    timestamp: f64,
    record_type: RecordType,
    format_version: u32,
    compression_type: CompressionType,
    uncompressed_size: u32,
    payload: Vec<u8>,
}

enum MergeEvent {
    BatchStart { batch_id: u64, count: usize },
    Compressed(CompressedOut, u64),
    Finalize(Sender<Result<(), WriterError>>),
}

fn encode_record_header(out: &mut Vec<u8>, c: &CompressedOut) {
    let mut header = [0u8; RECORD_HEADER_SIZE];
    LittleEndian::write_u32(&mut header[0..4], RECORD_MAGIC);
    LittleEndian::write_u16(&mut header[4..6], c.stream_id.type_id.0);
    LittleEndian::write_u16(&mut header[6..8], c.stream_id.instance_id);
    LittleEndian::write_f64(&mut header[8..16], c.timestamp);
    header[16] = record_type_id(c.record_type);
    LittleEndian::write_u32(&mut header[17..21], c.format_version);
    header[21] = c.compression_type.id();
    LittleEndian::write_u32(&mut header[22..26], c.uncompressed_size);
    LittleEndian::write_u32(&mut header[26..30], c.payload.len() as u32);
    out.extend_from_slice(&header);
    out.extend_from_slice(&c.payload);
}

fn record_type_id(t: RecordType) -> u8 {
    match t {
        RecordType::Configuration => 0,
        RecordType::State => 1,
        RecordType::Data => 2,
        RecordType::Tag => 3,
    }
}

struct MergeState {
    file: DiskChunkedFile,
    index: Vec<IndexEntry>,
    pending_batches: HashMap<u64, Vec<Option<CompressedOut>>>,
    pending_counts: HashMap<u64, usize>,
    next_batch_to_flush: u64,
}

impl MergeState {
    fn handle_compressed(&mut self, batch_id: u64, item: CompressedOut) -> Result<(), WriterError> {
        let seq = item.seq;
        let slots = self
            .pending_batches
            .entry(batch_id)
            .or_insert_with(|| vec![None; *self.pending_counts.get(&batch_id).unwrap_or(&0)]);
        if seq >= slots.len() {
            slots.resize_with(seq + 1, || None);
        }
        slots[seq] = Some(item);
        self.flush_ready_batches()
    }

    fn flush_ready_batches(&mut self) -> Result<(), WriterError> {
        loop {
            let Some(&count) = self.pending_counts.get(&self.next_batch_to_flush) else {
                break;
            };
            let complete = self
                .pending_batches
                .get(&self.next_batch_to_flush)
                .map(|slots| slots.len() == count && slots.iter().all(Option::is_some))
                .unwrap_or(count == 0);
            if !complete {
                break;
            }
            let mut items: Vec<CompressedOut> = self
                .pending_batches
                .remove(&self.next_batch_to_flush)
                .unwrap_or_default()
                .into_iter()
                .flatten()
                .collect();
            self.pending_counts.remove(&self.next_batch_to_flush);
            items.sort_by(|a, b| {
                a.timestamp
                    .partial_cmp(&b.timestamp)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.seq.cmp(&b.seq))
            });
            for item in items {
                let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE + item.payload.len());
                let entry = IndexEntry {
                    stream_type: item.stream_id.type_id.0,
                    stream_instance: item.stream_id.instance_id,
                    timestamp: item.timestamp,
                    record_type: item.record_type.as_str().to_string(),
                    format_version: item.format_version,
                    offset: self.file.len(),
                };
                encode_record_header(&mut buf, &item);
                self.file.append(&buf)?;
                self.index.push(entry);
            }
            self.next_batch_to_flush += 1;
        }
        Ok(())
    }
}

fn write_file_header(file: &mut DiskChunkedFile, index_offset: u64, index_size: u64) -> Result<(), WriterError> {
    let mut header = [0u8; FILE_HEADER_SIZE as usize];
    header[0..4].copy_from_slice(FILE_MAGIC);
    LittleEndian::write_u32(&mut header[4..8], 1);
    LittleEndian::write_u32(&mut header[8..12], FILE_HEADER_SIZE as u32);
    LittleEndian::write_u64(&mut header[12..20], FILE_HEADER_SIZE);
    LittleEndian::write_u64(&mut header[20..28], index_offset);
    LittleEndian::write_u64(&mut header[28..36], index_size);
    LittleEndian::write_u64(&mut header[36..44], file.len());
    file.write_at(0, &header)?;
    Ok(())
}

/// Background-pipeline file writer. Dropping it without calling
/// [`Self::finalize`] leaves an unfinalized file on disk (no index
/// trailer); the reader's `auto_reconstruct_index` path is the documented
/// recovery for that case.
pub struct RecordFileWriter {
    path: PathBuf,
    work_tx: Option<Sender<PendingRecord>>,
    merge_tx: Sender<MergeEvent>,
    workers: Vec<JoinHandle<()>>,
    merge_handle: Option<JoinHandle<MergeState>>,
    next_batch: u64,
    queued_bytes: Arc<AtomicI64>,
    stream_presets: HashMap<StreamId, CompressionPreset>,
    default_preset: CompressionPreset,
    finalized: bool,
    tags: TagMap,
}

impl RecordFileWriter {
    pub fn create(path: impl AsRef<Path>, options: WriteOptions) -> Result<Self, WriterError> {
        let path = path.as_ref().to_path_buf();
        let mut file = DiskChunkedFile::create(&path, options.max_chunk_size)?;
        // Reserve the header region up front so the first record lands
        // right after it.
        file.append(&[0u8; FILE_HEADER_SIZE as usize])?;

        let (work_tx, work_rx) = crossbeam_channel::unbounded::<PendingRecord>();
        let (merge_tx, merge_rx) = crossbeam_channel::unbounded::<MergeEvent>();
        let queued_bytes = Arc::new(AtomicI64::new(0));

        let worker_count = options.worker_count.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let work_rx: Receiver<PendingRecord> = work_rx.clone();
            let merge_tx: Sender<MergeEvent> = merge_tx.clone();
            let queued_bytes = queued_bytes.clone();
            workers.push(std::thread::spawn(move || {
                while let Ok(pending) = work_rx.recv() {
                    let PendingRecord { batch_id, seq, preset, record } = pending;
                    let uncompressed_size = record.payload.len() as u32;
                    let (compression_type, payload) = compression::compress(&record.payload, preset)
                        .unwrap_or((CompressionType::None, record.payload.clone()));
                    queued_bytes.fetch_sub(uncompressed_size as i64, Ordering::SeqCst);
                    let out = CompressedOut {
                        seq,
                        stream_id: record.stream_id,
                        timestamp: record.timestamp,
                        record_type: record.record_type,
                        format_version: record.format_version,
                        compression_type,
                        uncompressed_size,
                        payload,
                    };
                    let _ = merge_tx.send(MergeEvent::Compressed(out, batch_id));
                }
            }));
        }

        let merge_handle = std::thread::spawn(move || {
            let mut state = MergeState {
                file,
                index: Vec::new(),
                pending_batches: HashMap::new(),
                pending_counts: HashMap::new(),
                next_batch_to_flush: 0,
            };
            for event in merge_rx.iter() {
                match event {
                    MergeEvent::BatchStart { batch_id, count } => {
                        state.pending_counts.insert(batch_id, count);
                        state.pending_batches.entry(batch_id).or_insert_with(|| vec![None; count]);
                        if let Err(e) = state.flush_ready_batches() {
                            tracing::warn!(error = %e, "failed flushing ready batches");
                        }
                    }
                    MergeEvent::Compressed(item, batch_id) => {
                        if let Err(e) = state.handle_compressed(batch_id, item) {
                            tracing::warn!(error = %e, "failed flushing compressed record");
                        }
                    }
                    MergeEvent::Finalize(reply) => {
                        let _ = reply.send(Ok(()));
                        break;
                    }
                }
            }
            state
        });

        Ok(RecordFileWriter {
            path,
            work_tx: Some(work_tx),
            merge_tx,
            workers,
            merge_handle: Some(merge_handle),
            next_batch: 0,
            queued_bytes,
            stream_presets: HashMap::new(),
            default_preset: options.default_preset,
            tags: TagMap::default(),
            finalized: false,
        })
    }

    pub fn set_stream_preset(&mut self, stream_id: StreamId, preset: CompressionPreset) {
        self.stream_presets.insert(stream_id, preset);
    }

    /// Sets a file-level tag (e.g. `capture_time_epoch`, `session_id`),
    /// written into the trailer at finalize.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn tags(&self) -> &TagMap {
        &self.tags
    }

    /// Hands a drained, FIFO-ordered batch of records to the background
    /// pipeline. Returns as soon as the batch has been enqueued; never
    /// waits for compression or disk I/O.
    pub fn write_records_async(&mut self, records: Vec<Record>) -> Result<(), WriterError> {
        if self.finalized {
            return Err(WriterError::AlreadyFinalized);
        }
        let batch_id = self.next_batch;
        self.next_batch += 1;
        let count = records.len();
        self.merge_tx
            .send(MergeEvent::BatchStart { batch_id, count })
            .map_err(|_| WriterError::WorkerDisconnected)?;
        let work_tx = self.work_tx.as_ref().ok_or(WriterError::WorkerDisconnected)?;
        for (seq, record) in records.into_iter().enumerate() {
            let preset = self
                .stream_presets
                .get(&record.stream_id)
                .copied()
                .unwrap_or(self.default_preset);
            self.queued_bytes.fetch_add(record.payload.len() as i64, Ordering::SeqCst);
            work_tx
                .send(PendingRecord { batch_id, seq, preset, record })
                .map_err(|_| WriterError::WorkerDisconnected)?;
        }
        Ok(())
    }

    /// Exposed for caller-side backpressure: approximate bytes sitting in
    /// the background pipeline (enqueued but not yet written to disk).
    pub fn get_background_thread_queue_byte_size(&self) -> i64 {
        self.queued_bytes.load(Ordering::SeqCst)
    }

    /// Starts the shutdown sequence without blocking: stops accepting new
    /// batches and lets in-flight work drain.
    pub fn close_file_async(&mut self) -> Result<(), WriterError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        self.work_tx.take(); // closes the channel once drained
        Ok(())
    }

    /// Blocks until every enqueued record has been compressed, merged, and
    /// written, then patches the file header and writes the index trailer.
    pub fn wait_for_file_closed(&mut self) -> Result<(), WriterError> {
        for worker in self.workers.drain(..) {
            worker.join().map_err(|_| WriterError::WorkerDisconnected)?;
        }
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.merge_tx
            .send(MergeEvent::Finalize(reply_tx))
            .map_err(|_| WriterError::WorkerDisconnected)?;
        reply_rx.recv().map_err(|_| WriterError::WorkerDisconnected)??;
        let mut state = self
            .merge_handle
            .take()
            .expect("finalize only runs once")
            .join()
            .map_err(|_| WriterError::WorkerDisconnected)?;

        let trailer = FileTrailer { tags: self.tags.clone(), index: std::mem::take(&mut state.index) };
        let trailer_json =
            serde_json::to_vec(&trailer).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let trailer_offset = state.file.len();
        state.file.append(&trailer_json)?;
        write_file_header(&mut state.file, trailer_offset, trailer_json.len() as u64)?;
        state.file.flush()?;
        Ok(())
    }

    /// Convenience: `close_file_async` followed by `wait_for_file_closed`.
    pub fn finalize(&mut self) -> Result<(), WriterError> {
        self.close_file_async()?;
        self.wait_for_file_closed()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
