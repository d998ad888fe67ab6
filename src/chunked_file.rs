//! Files that may be split across multiple chunks on disk, presented to the
//! rest of the crate as a single logical byte stream.
//!
//! A trait over a single owned `File` handle, so the writer and reader can
//! grow a file across a chunk boundary (mirroring VRS's own multi-chunk-file
//! support) without every caller re-implementing the offset bookkeeping.

use crate::error::ChunkedFileError;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Invoked when a write is about to cross into a new chunk, so callers can
/// record chunk boundaries (e.g. to flush a partial index) before the
/// physical file switch happens.
pub trait NewChunkHandler: Send {
    fn on_new_chunk(&mut self, chunk_index: usize, chunk_path: &Path);
}

/// A logical file made of one or more chunks, addressed by one flat offset
/// space spanning all chunks in order.
pub trait ChunkedFile {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), ChunkedFileError>;
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), ChunkedFileError>;
    fn append(&mut self, buf: &[u8]) -> Result<u64, ChunkedFileError>;
    fn len(&self) -> u64;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn flush(&mut self) -> Result<(), ChunkedFileError>;
}

/// Default single-chunk-per-file-on-disk implementation. Multi-chunk
/// growth is modeled by simply opening a new suffix (`path_1`, `path_2`,
/// ...) once `max_chunk_size` is exceeded; every chunk but the last is
/// exactly `max_chunk_size` bytes, so offset-to-chunk translation is a
/// plain division.
pub struct DiskChunkedFile {
    base_path: PathBuf,
    max_chunk_size: u64,
    chunks: Vec<File>,
    total_len: u64,
    read_only: bool,
    new_chunk_handler: Option<Box<dyn NewChunkHandler>>,
}

impl DiskChunkedFile {
    pub fn create(path: impl AsRef<Path>, max_chunk_size: u64) -> Result<Self, ChunkedFileError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(path.as_ref())?;
        Ok(DiskChunkedFile {
            base_path: path.as_ref().to_path_buf(),
            max_chunk_size,
            chunks: vec![file],
            total_len: 0,
            read_only: false,
            new_chunk_handler: None,
        })
    }

    /// Opens `path` for reading, then discovers and opens any companion
    /// chunk files (`path_1`, `path_2`, ...) written alongside it by a
    /// chunked writer. Every chunk but the last is the same size, so that
    /// first chunk's length recovers the `max_chunk_size` the writer used
    /// without it needing to be stored anywhere.
    pub fn open_read(path: impl AsRef<Path>) -> Result<Self, ChunkedFileError> {
        let base_path = path.as_ref().to_path_buf();
        let first = File::open(&base_path)?;
        let first_len = first.metadata()?.len();
        let mut chunks = vec![first];
        let mut chunk_lens = vec![first_len];

        let mut index = 1;
        loop {
            let mut candidate = base_path.clone().into_os_string();
            candidate.push(format!("_{index}"));
            match File::open(PathBuf::from(&candidate)) {
                Ok(file) => {
                    let len = file.metadata()?.len();
                    chunks.push(file);
                    chunk_lens.push(len);
                    index += 1;
                }
                Err(_) => break,
            }
        }

        let max_chunk_size = if chunks.len() > 1 { chunk_lens[0] } else { u64::MAX };
        let total_len = chunk_lens.iter().sum();

        Ok(DiskChunkedFile {
            base_path,
            max_chunk_size,
            chunks,
            total_len,
            read_only: true,
            new_chunk_handler: None,
        })
    }

    pub fn set_new_chunk_handler(&mut self, handler: Box<dyn NewChunkHandler>) {
        self.new_chunk_handler = Some(handler);
    }

    fn chunk_for_offset(&self, offset: u64) -> (usize, u64) {
        if self.max_chunk_size == u64::MAX {
            (0, offset)
        } else {
            (
                (offset / self.max_chunk_size) as usize,
                offset % self.max_chunk_size,
            )
        }
    }

    fn ensure_chunk(&mut self, index: usize) -> Result<(), ChunkedFileError> {
        while self.chunks.len() <= index {
            if self.read_only {
                return Err(ChunkedFileError::InvalidOffset(index as u64));
            }
            let chunk_path = self.chunk_path(self.chunks.len());
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .read(true)
                .truncate(true)
                .open(&chunk_path)?;
            self.chunks.push(file);
            if let Some(handler) = self.new_chunk_handler.as_mut() {
                handler.on_new_chunk(self.chunks.len() - 1, &chunk_path);
            }
        }
        Ok(())
    }

    fn chunk_path(&self, index: usize) -> PathBuf {
        if index == 0 {
            self.base_path.clone()
        } else {
            let mut p = self.base_path.clone().into_os_string();
            p.push(format!("_{index}"));
            PathBuf::from(p)
        }
    }
}

impl ChunkedFile for DiskChunkedFile {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), ChunkedFileError> {
        if offset + buf.len() as u64 > self.total_len {
            return Err(ChunkedFileError::NotEnoughData {
                wanted: buf.len(),
                got: self.total_len.saturating_sub(offset) as usize,
            });
        }
        let (chunk_index, chunk_offset) = self.chunk_for_offset(offset);
        let file = self
            .chunks
            .get_mut(chunk_index)
            .ok_or(ChunkedFileError::InvalidOffset(offset))?;
        file.seek(SeekFrom::Start(chunk_offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), ChunkedFileError> {
        if self.read_only {
            return Err(ChunkedFileError::ReadOnly);
        }
        let (chunk_index, chunk_offset) = self.chunk_for_offset(offset);
        self.ensure_chunk(chunk_index)?;
        let file = &mut self.chunks[chunk_index];
        file.seek(SeekFrom::Start(chunk_offset))?;
        file.write_all(buf)?;
        self.total_len = self.total_len.max(offset + buf.len() as u64);
        Ok(())
    }

    /// Appends `buf` as one unit, rolling over to a fresh chunk first if it
    /// wouldn't otherwise fit in what's left of the current chunk. Never
    /// splits `buf` itself across two chunk files.
    fn append(&mut self, buf: &[u8]) -> Result<u64, ChunkedFileError> {
        if self.max_chunk_size != u64::MAX {
            let (chunk_index, chunk_offset) = self.chunk_for_offset(self.total_len);
            if chunk_offset > 0 && chunk_offset + buf.len() as u64 > self.max_chunk_size {
                self.total_len = (chunk_index as u64 + 1) * self.max_chunk_size;
            }
        }
        let offset = self.total_len;
        self.write_at(offset, buf)?;
        Ok(offset)
    }

    fn len(&self) -> u64 {
        self.total_len
    }

    fn flush(&mut self) -> Result<(), ChunkedFileError> {
        if let Some(last) = self.chunks.last_mut() {
            last.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_and_read_round_trips_within_one_chunk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.vrs");
        let mut file = DiskChunkedFile::create(&path, 1024).unwrap();
        let off = file.append(b"hello").unwrap();
        assert_eq!(off, 0);
        let off2 = file.append(b" world").unwrap();
        assert_eq!(off2, 5);
        let mut buf = [0u8; 11];
        file.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn writes_crossing_chunk_boundary_spawn_new_chunk_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.vrs");
        let mut file = DiskChunkedFile::create(&path, 8).unwrap();
        file.append(b"12345678").unwrap();
        file.append(b"abcd").unwrap();
        assert!(dir.path().join("f.vrs_1").exists());
        let mut buf = [0u8; 4];
        file.read_at(8, &mut buf).unwrap();
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn reading_past_end_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.vrs");
        let mut file = DiskChunkedFile::create(&path, 1024).unwrap();
        file.append(b"hi").unwrap();
        let mut buf = [0u8; 10];
        let err = file.read_at(0, &mut buf).unwrap_err();
        assert!(matches!(err, ChunkedFileError::NotEnoughData { .. }));
    }

    #[test]
    fn append_that_would_not_fit_rolls_over_instead_of_splitting() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.vrs");
        let mut file = DiskChunkedFile::create(&path, 5).unwrap();
        file.append(b"abc").unwrap(); // fills offsets 0..3 of chunk 0
        let off = file.append(b"wxyz").unwrap(); // wouldn't fit in the 2 bytes left
        assert_eq!(off, 5); // rolled over to the start of chunk 1 rather than splitting
        assert!(dir.path().join("f.vrs_1").exists());
        let mut buf = [0u8; 4];
        file.read_at(5, &mut buf).unwrap();
        assert_eq!(&buf, b"wxyz");
    }

    #[test]
    fn open_read_discovers_every_companion_chunk_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.vrs");
        {
            let mut w = DiskChunkedFile::create(&path, 4).unwrap();
            w.append(b"aaaa").unwrap();
            w.append(b"bbbb").unwrap();
            w.append(b"cc").unwrap();
        }
        assert!(dir.path().join("f.vrs_1").exists());
        assert!(dir.path().join("f.vrs_2").exists());

        let mut reader = DiskChunkedFile::open_read(&path).unwrap();
        assert_eq!(reader.len(), 10);
        let mut buf = [0u8; 10];
        reader.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"aaaabbbbcc");
    }

    #[test]
    fn read_only_file_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.vrs");
        {
            let mut w = DiskChunkedFile::create(&path, 1024).unwrap();
            w.append(b"data").unwrap();
        }
        let mut r = DiskChunkedFile::open_read(&path).unwrap();
        let err = r.write_at(0, b"x").unwrap_err();
        assert!(matches!(err, ChunkedFileError::ReadOnly));
    }
}
