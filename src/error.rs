//! Error types.
//!
//! Each subsystem gets its own `thiserror` enum instead of funneling
//! everything through one grab-bag type. [`VrsError`] composes them for
//! call sites that cross subsystem boundaries (the writer, the reader, the
//! CLI).
//!
//! [`ErrorDomain`] and [`errorcode_to_message`] additionally model the
//! partitioned numeric error-code space used for interop with callers that
//! want a stable integer rather than a Rust error type.

use std::sync::{Mutex, OnceLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkedFileError {
    #[error("no file open")]
    NotOpen,
    #[error("file already open")]
    AlreadyOpen,
    #[error("invalid offset {0}")]
    InvalidOffset(u64),
    #[error("not enough data: wanted {wanted}, got {got}")]
    NotEnoughData { wanted: usize, got: usize },
    #[error("chunked file is read-only")]
    ReadOnly,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("unknown compression preset id {0}")]
    UnknownPreset(u8),
    #[error("zstd error: {0}")]
    Zstd(String),
    #[error("lz4 error: {0}")]
    Lz4(String),
    #[error("declared uncompressed size {declared} does not match decompressed size {actual}")]
    SizeMismatch { declared: usize, actual: usize },
    #[error("compressed frame exceeded the {limit}-byte cap")]
    TooMuchData { limit: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DataLayoutError {
    #[error("unknown field '{0}' in data layout")]
    UnknownField(String),
    #[error("field '{name}' type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("fixed region too small: need {need} bytes, have {have}")]
    FixedRegionTooSmall { need: usize, have: usize },
    #[error("variable-length index entry {index} out of bounds (data length {len})")]
    VarIndexOutOfBounds { index: usize, len: usize },
    #[error("invalid data layout json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RecordFormatError {
    #[error("no record format registered for stream {stream} record type {record_type:?} version {version}")]
    NotFound {
        stream: String,
        record_type: String,
        version: u32,
    },
    #[error("content block {index} expects {expected} bytes, remaining {remaining}")]
    ContentBlockTooShort {
        index: usize,
        expected: usize,
        remaining: usize,
    },
    #[error(transparent)]
    DataLayout(#[from] DataLayoutError),
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("writer already finalized")]
    AlreadyFinalized,
    #[error("stream {0} was never declared with add_recordable")]
    UnknownStream(String),
    #[error("background worker panicked or disconnected")]
    WorkerDisconnected,
    #[error(transparent)]
    ChunkedFile(#[from] ChunkedFileError),
    #[error(transparent)]
    Compression(#[from] CompressionError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("not a vrs file: bad magic")]
    NotAVrsFile,
    #[error("unsupported file format version {0}")]
    UnsupportedFileVersion(u32),
    #[error("index could not be read and automatic reconstruction is disabled")]
    IndexUnavailable,
    #[error("stream {0} not found in file")]
    StreamNotFound(String),
    #[error(transparent)]
    ChunkedFile(#[from] ChunkedFileError),
    #[error(transparent)]
    Compression(#[from] CompressionError),
    #[error(transparent)]
    RecordFormat(#[from] RecordFormatError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum VideoFrameError {
    #[error("no keyframe seen yet for stream {0}")]
    NoKeyframeYet(String),
    #[error("missing frame replay requires a reader reference")]
    ReplayUnavailable,
    #[error("frame {frame_index} is not decodable out of sequence")]
    FrameOutOfSequence { frame_index: usize },
    #[error("no decoder registered for codec '{0}'")]
    UnknownCodec(String),
}

#[derive(Debug, Error)]
pub enum MultiFileError {
    #[error("conflicting tag '{key}' for stream {stream}: '{first}' vs '{second}'")]
    TagCollision {
        key: String,
        stream: String,
        first: String,
        second: String,
    },
    #[error("stream id collision across chunks for {0}, and merge-by-name is disabled")]
    StreamCollision(String),
    #[error(transparent)]
    Reader(#[from] ReaderError),
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid selector '{0}'")]
    InvalidSelector(String),
    #[error("selector references unknown stream '{0}'")]
    UnknownStream(String),
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error(transparent)]
    Writer(#[from] WriterError),
}

/// Top-level error type for call sites that cross subsystem boundaries.
#[derive(Debug, Error)]
pub enum VrsError {
    #[error(transparent)]
    ChunkedFile(#[from] ChunkedFileError),
    #[error(transparent)]
    Compression(#[from] CompressionError),
    #[error(transparent)]
    DataLayout(#[from] DataLayoutError),
    #[error(transparent)]
    RecordFormat(#[from] RecordFormatError),
    #[error(transparent)]
    Writer(#[from] WriterError),
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error(transparent)]
    VideoFrame(#[from] VideoFrameError),
    #[error(transparent)]
    MultiFile(#[from] MultiFileError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A numeric error-code namespace, partitioning platform errno values,
/// built-in VRS codes, and dynamically registered per-domain codes into
/// disjoint ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorDomain {
    Vrs,
    ZstdCompression,
    ZstdDecompression,
    Lz4Decompression,
    Custom(u32),
}

const DOMAIN_SIZE: i32 = 1000;
const BUILTIN_DOMAIN_START: i32 = 1;
const ZSTD_COMPRESSION_START: i32 = 1_000;
const ZSTD_DECOMPRESSION_START: i32 = 2_000;
const LZ4_DECOMPRESSION_START: i32 = 3_000;
const CUSTOM_DOMAINS_START: i32 = 10_000;

fn domain_start(domain: ErrorDomain) -> i32 {
    match domain {
        ErrorDomain::Vrs => BUILTIN_DOMAIN_START,
        ErrorDomain::ZstdCompression => ZSTD_COMPRESSION_START,
        ErrorDomain::ZstdDecompression => ZSTD_DECOMPRESSION_START,
        ErrorDomain::Lz4Decompression => LZ4_DECOMPRESSION_START,
        ErrorDomain::Custom(slot) => CUSTOM_DOMAINS_START + (slot as i32) * DOMAIN_SIZE,
    }
}

struct DomainRegistry {
    /// (domain_start, sub_code) -> allocated code, so repeated registrations
    /// of the same underlying error reuse the same numeric code.
    codes: std::collections::HashMap<(i32, i64), i32>,
    messages: std::collections::HashMap<i32, String>,
}

fn registry() -> &'static Mutex<DomainRegistry> {
    static REGISTRY: OnceLock<Mutex<DomainRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        Mutex::new(DomainRegistry {
            codes: std::collections::HashMap::new(),
            messages: std::collections::HashMap::new(),
        })
    })
}

/// Allocate (or look up) a stable numeric code for `sub_code` within
/// `domain`, recording `message` the first time it's seen.
pub fn domain_error_code(domain: ErrorDomain, sub_code: i64, message: &str) -> i32 {
    let start = domain_start(domain);
    let mut reg = registry().lock().expect("error registry poisoned");
    if let Some(&code) = reg.codes.get(&(start, sub_code)) {
        return code;
    }
    let used = reg
        .codes
        .keys()
        .filter(|(s, _)| *s == start)
        .count() as i32;
    if used >= DOMAIN_SIZE - 1 {
        // Domain exhausted: fold further errors onto the last slot in range.
        let overflow_code = start + DOMAIN_SIZE - 1;
        reg.messages
            .entry(overflow_code)
            .or_insert_with(|| format!("{:?} error: <too many domain errors to track>", domain));
        return overflow_code;
    }
    let code = start + used;
    reg.codes.insert((start, sub_code), code);
    reg.messages.insert(code, message.to_string());
    code
}

/// Render a previously-allocated error code back to a human message.
pub fn errorcode_to_message(code: i32) -> String {
    if code == 0 {
        return "Success".to_string();
    }
    let reg = registry().lock().expect("error registry poisoned");
    reg.messages
        .get(&code)
        .cloned()
        .unwrap_or_else(|| format!("<unknown error code '{code}'>"))
}
