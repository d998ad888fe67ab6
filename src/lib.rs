//! # vrs — Versatile Record System
//!
//! A multi-stream, self-describing sensor-recording container format and
//! the runtime library that writes and reads it.
//!
//! Format guarantees:
//! - All numeric fields are little-endian; never negotiated.
//! - Every record carries a fixed header (magic, stream id, timestamp,
//!   record type, compression, sizes); corrupt headers abort a sequential
//!   scan at that point rather than the whole file.
//! - A file's content layout (what a record's bytes mean) is declared by a
//!   per-stream [`record_format::RecordFormat`], recoverable from a file's
//!   own tags without an external schema registry.
//! - The trailer (file-level tags plus the record index) sits at the end
//!   of the file; the full record list is reconstructible by scanning
//!   forward from the header without it, the documented recovery path for
//!   an unfinalized file.
//! - Background compression runs on a bounded worker pool; writes are
//!   merged back into non-decreasing timestamp order before hitting disk.

pub mod chunked_file;
pub mod compression;
pub mod content_block;
pub mod datalayout;
pub mod error;
pub mod event_logger;
pub mod file_reader;
pub mod file_spec;
pub mod file_writer;
pub mod filter;
pub mod helpers;
pub mod model;
pub mod multi_file_reader;
pub mod record_format;
pub mod record_manager;
pub mod recordable;
pub mod registry;
pub mod tags;
pub mod video_frame_handler;

// Flat re-exports for the most common types.
pub use compression::{CompressionPreset, CompressionType};
pub use content_block::codec::Decoder;
pub use content_block::{dispatch_record, RecordHeaderInfo, StreamPlayer};
pub use datalayout::{DataLayout, JsonProfile};
pub use error::VrsError;
pub use event_logger::EventLogger;
pub use file_reader::RecordFileReader;
pub use file_spec::FileSpec;
pub use file_writer::{RecordFileWriter, WriteOptions};
pub use model::{Record, RecordType, RecordableTypeId, StreamId};
pub use multi_file_reader::MultiRecordFileReader;
pub use record_format::{ContentBlock, RecordFormat};
pub use record_manager::RecordManager;
pub use recordable::{DataSource, Recordable};
pub use tags::{TagConventions, TagMap};
pub use video_frame_handler::{VideoAwareStreamPlayer, VideoFrameHandler};
