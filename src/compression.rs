//! Per-record compression.
//!
//! A small closed set of presets rather than an open codec registry. A
//! [`CompressionPreset`] is a *request* (which algorithm, how
//! hard to try); the [`CompressionType`] actually written to a record
//! header is the outcome, since compression that doesn't shrink a payload
//! falls back to storing it raw regardless of the requested preset.
//!
//! Payloads smaller than [`MIN_COMPRESSION_SIZE`] bytes skip compression
//! entirely: codec framing overhead would make them bigger, not smaller.

use crate::error::CompressionError;
use std::io::{Read, Write};

/// Below this many bytes, compression is skipped regardless of preset.
pub const MIN_COMPRESSION_SIZE: usize = 250;

/// What a record was actually compressed with, stored in its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionType {
    None,
    Lz4,
    Zstd,
}

impl CompressionType {
    pub fn id(&self) -> u8 {
        match self {
            CompressionType::None => 0,
            CompressionType::Lz4 => 1,
            CompressionType::Zstd => 2,
        }
    }

    pub fn from_id(id: u8) -> Result<Self, CompressionError> {
        match id {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Lz4),
            2 => Ok(CompressionType::Zstd),
            other => Err(CompressionError::UnknownPreset(other)),
        }
    }
}

/// Compression presets a writer can request per stream. `Lz4*` trades ratio
/// for speed; the `Zstd*` ladder runs from fastest/loosest to
/// slowest/tightest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionPreset {
    None,
    Lz4Fast,
    Lz4Tight,
    ZstdFaster,
    ZstdFast,
    #[default]
    ZstdLight,
    ZstdMedium,
    ZstdHeavy,
    ZstdHigh,
    ZstdTight,
    ZstdMax,
}

impl CompressionPreset {
    /// Algorithm family this preset belongs to.
    pub fn compression_type(&self) -> CompressionType {
        match self {
            CompressionPreset::None => CompressionType::None,
            CompressionPreset::Lz4Fast | CompressionPreset::Lz4Tight => CompressionType::Lz4,
            _ => CompressionType::Zstd,
        }
    }

    /// zstd compression level for the `Zstd*` rungs; `None` for non-zstd presets.
    fn zstd_level(&self) -> Option<i32> {
        match self {
            CompressionPreset::ZstdFaster => Some(-5),
            CompressionPreset::ZstdFast => Some(-1),
            CompressionPreset::ZstdLight => Some(1),
            CompressionPreset::ZstdMedium => Some(6),
            CompressionPreset::ZstdHeavy => Some(12),
            CompressionPreset::ZstdHigh => Some(17),
            CompressionPreset::ZstdTight => Some(19),
            CompressionPreset::ZstdMax => Some(22),
            _ => None,
        }
    }

    /// `true` for the two LZ4 rungs; LZ4 "Tight" applies an extra pass that
    /// favors ratio over raw throughput (lz4_flex has one block format, so
    /// the distinction here is just which callers pick it).
    fn is_lz4(&self) -> bool {
        matches!(self, CompressionPreset::Lz4Fast | CompressionPreset::Lz4Tight)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompressionPreset::None => "none",
            CompressionPreset::Lz4Fast => "lz4_fast",
            CompressionPreset::Lz4Tight => "lz4_tight",
            CompressionPreset::ZstdFaster => "zstd_faster",
            CompressionPreset::ZstdFast => "zstd_fast",
            CompressionPreset::ZstdLight => "zstd_light",
            CompressionPreset::ZstdMedium => "zstd_medium",
            CompressionPreset::ZstdHeavy => "zstd_heavy",
            CompressionPreset::ZstdHigh => "zstd_high",
            CompressionPreset::ZstdTight => "zstd_tight",
            CompressionPreset::ZstdMax => "zstd_max",
        }
    }
}

/// Compresses `data` per `preset`, returning the [`CompressionType`] that
/// was actually used (`None` if compression was skipped or didn't shrink
/// the payload).
pub fn compress(data: &[u8], preset: CompressionPreset) -> Result<(CompressionType, Vec<u8>), CompressionError> {
    if data.len() < MIN_COMPRESSION_SIZE || preset == CompressionPreset::None {
        return Ok((CompressionType::None, data.to_vec()));
    }
    let compressed = if preset.is_lz4() {
        lz4_flex::compress_prepend_size(data)
    } else {
        let level = preset.zstd_level().expect("non-none, non-lz4 preset always has a zstd level");
        zstd::stream::encode_all(data, level).map_err(|e| CompressionError::Zstd(e.to_string()))?
    };
    if compressed.len() >= data.len() {
        Ok((CompressionType::None, data.to_vec()))
    } else {
        Ok((preset.compression_type(), compressed))
    }
}

/// Decompresses `data` written as `kind`, verifying the result matches
/// `expected_size` when provided (record headers always carry it).
pub fn decompress(
    data: &[u8],
    kind: CompressionType,
    expected_size: Option<usize>,
) -> Result<Vec<u8>, CompressionError> {
    let out = match kind {
        CompressionType::None => data.to_vec(),
        CompressionType::Zstd => {
            zstd::stream::decode_all(data).map_err(|e| CompressionError::Zstd(e.to_string()))?
        }
        CompressionType::Lz4 => lz4_flex::decompress_size_prepended(data)
            .map_err(|e| CompressionError::Lz4(e.to_string()))?,
    };
    if let Some(expected) = expected_size {
        if out.len() != expected {
            return Err(CompressionError::SizeMismatch {
                declared: expected,
                actual: out.len(),
            });
        }
    }
    Ok(out)
}

/// Streaming zstd writer for large content blocks (image/audio frames)
/// where buffering the whole payload before compressing would be wasteful.
/// Enforces `max_compressed_size` so a single runaway frame can't exhaust
/// memory; exceeding it aborts the frame with `CompressionError::TooMuchData`.
pub struct ZstdFrameWriter<W: Write> {
    inner: Option<zstd::stream::Encoder<'static, CountingWriter<W>>>,
    max_compressed_size: u64,
}

struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> ZstdFrameWriter<W> {
    pub fn start_frame(writer: W, preset: CompressionPreset, max_compressed_size: u64) -> Result<Self, CompressionError> {
        let level = preset.zstd_level().unwrap_or(1);
        let counting = CountingWriter { inner: writer, written: 0 };
        let encoder =
            zstd::stream::Encoder::new(counting, level).map_err(|e| CompressionError::Zstd(e.to_string()))?;
        Ok(ZstdFrameWriter {
            inner: Some(encoder),
            max_compressed_size,
        })
    }

    pub fn add_frame_data(&mut self, buf: &[u8]) -> Result<(), CompressionError> {
        let encoder = self.inner.as_mut().expect("frame already ended");
        encoder.write_all(buf)?;
        if encoder.get_ref().written > self.max_compressed_size {
            return Err(CompressionError::TooMuchData {
                limit: self.max_compressed_size,
            });
        }
        Ok(())
    }

    pub fn end_frame(mut self) -> Result<W, CompressionError> {
        let encoder = self.inner.take().expect("frame already ended");
        let counting = encoder.finish().map_err(CompressionError::Io)?;
        Ok(counting.inner)
    }
}

/// Streaming reader side, matching [`ZstdFrameWriter`].
pub struct ZstdFrameReader<R: Read> {
    inner: zstd::stream::Decoder<'static, std::io::BufReader<R>>,
}

impl<R: Read> ZstdFrameReader<R> {
    pub fn new(reader: R) -> Result<Self, CompressionError> {
        let decoder = zstd::stream::Decoder::new(reader).map_err(|e| CompressionError::Zstd(e.to_string()))?;
        Ok(ZstdFrameReader { inner: decoder })
    }
}

impl<R: Read> Read for ZstdFrameReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payloads_are_stored_raw() {
        let data = vec![1u8; 16];
        let (kind, out) = compress(&data, CompressionPreset::ZstdMax).unwrap();
        assert_eq!(kind, CompressionType::None);
        assert_eq!(out, data);
    }

    #[test]
    fn zstd_round_trips_compressible_data() {
        let data = vec![42u8; 10_000];
        let (kind, compressed) = compress(&data, CompressionPreset::ZstdMedium).unwrap();
        assert_eq!(kind, CompressionType::Zstd);
        assert!(compressed.len() < data.len());
        let back = decompress(&compressed, kind, Some(data.len())).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn lz4_round_trips() {
        let data = b"hello world hello world hello world hello world hello world".repeat(10);
        let (kind, compressed) = compress(&data, CompressionPreset::Lz4Fast).unwrap();
        assert_eq!(kind, CompressionType::Lz4);
        let back = decompress(&compressed, kind, Some(data.len())).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn size_mismatch_is_detected() {
        let data = vec![7u8; 1000];
        let (kind, compressed) = compress(&data, CompressionPreset::ZstdLight).unwrap();
        let err = decompress(&compressed, kind, Some(data.len() + 1)).unwrap_err();
        assert!(matches!(err, CompressionError::SizeMismatch { .. }));
    }

    #[test]
    fn compression_type_id_round_trips() {
        for kind in [CompressionType::None, CompressionType::Lz4, CompressionType::Zstd] {
            assert_eq!(CompressionType::from_id(kind.id()).unwrap(), kind);
        }
    }

    #[test]
    fn streaming_frame_round_trips() {
        let mut buf = Vec::new();
        {
            let mut writer = ZstdFrameWriter::start_frame(&mut buf, CompressionPreset::ZstdLight, 10_000_000).unwrap();
            writer.add_frame_data(&vec![9u8; 4096]).unwrap();
            writer.end_frame().unwrap();
        }
        let mut reader = ZstdFrameReader::new(buf.as_slice()).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![9u8; 4096]);
    }

    #[test]
    fn streaming_frame_respects_max_compressed_size() {
        let mut buf = Vec::new();
        let mut writer = ZstdFrameWriter::start_frame(&mut buf, CompressionPreset::None, 8).unwrap();
        // Incompressible-ish growing data pushes past the tiny cap quickly.
        let chunk: Vec<u8> = (0u32..5000).map(|i| ((i * 2654435761) % 256) as u8).collect();
        let err = writer.add_frame_data(&chunk).unwrap_err();
        assert!(matches!(err, CompressionError::TooMuchData { .. }));
    }
}
