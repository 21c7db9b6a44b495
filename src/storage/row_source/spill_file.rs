// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::chunk::{
    chunk_body_size, decode_chunk_body, decode_chunk_header, encode_chunk, CHUNK_HEADER_SIZE,
};
use super::{BufferState, ChecksumType, RowSourceMask, TabletId};
use crate::storage::{StorageResult, TracedStorageError};

pub fn path_of_spill_file(dir: impl AsRef<Path>, tablet_id: TabletId) -> PathBuf {
    dir.as_ref().join(format!("row_source_mask_{}", tablet_id))
}

/// Spilled masks of one buffer. The file is created on the first spill and
/// removed when this handle drops.
pub struct SpillFile {
    path: PathBuf,
    writer: BufWriter<File>,
    checksum_type: ChecksumType,
    num_chunks: usize,
    num_masks: usize,
    /// Whether some chunk has not been synced to disk yet.
    dirty: bool,
    /// Set when a write or sync failed. The file may then hold a partial chunk.
    failed: bool,
}

impl SpillFile {
    pub fn create(
        dir: impl AsRef<Path>,
        tablet_id: TabletId,
        checksum_type: ChecksumType,
    ) -> StorageResult<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        let path = path_of_spill_file(dir, tablet_id);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        info!("create row source mask spill file {}", path.display());

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            checksum_type,
            num_chunks: 0,
            num_masks: 0,
            dirty: false,
            failed: false,
        })
    }

    /// Append `masks` as one chunk.
    pub fn append_chunk(&mut self, masks: &[RowSourceMask]) -> StorageResult<()> {
        self.check_not_failed("spill")?;
        let mut data = Vec::with_capacity(CHUNK_HEADER_SIZE + chunk_body_size(masks.len()));
        encode_chunk(masks, self.checksum_type, &mut data)?;
        if let Err(err) = self.writer.write_all(&data) {
            self.failed = true;
            return Err(err.into());
        }

        self.num_chunks += 1;
        self.num_masks += masks.len();
        self.dirty = true;
        debug!(
            "spill chunk #{} of {} masks ({} bytes) to {}",
            self.num_chunks,
            masks.len(),
            data.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Flush buffered chunks and sync them so that a reader can see them.
    pub fn sync(&mut self) -> StorageResult<()> {
        self.check_not_failed("flush")?;
        if !self.dirty {
            return Ok(());
        }
        let synced = self
            .writer
            .flush()
            .and_then(|_| self.writer.get_ref().sync_data());
        if let Err(err) = synced {
            self.failed = true;
            return Err(err.into());
        }
        self.dirty = false;
        Ok(())
    }

    /// Open an independent reader positioned at the first chunk.
    pub fn reader(&self) -> StorageResult<SpillReader> {
        self.check_not_failed("flip")?;
        if self.dirty {
            return Err(TracedStorageError::decode(format!(
                "spill file {} has unsynced chunks",
                self.path.display()
            )));
        }
        SpillReader::open(&self.path, self.num_chunks)
    }

    fn check_not_failed(&self, op: &'static str) -> StorageResult<()> {
        if self.failed {
            return Err(TracedStorageError::invalid_state(op, BufferState::Failed));
        }
        Ok(())
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn num_chunks(&self) -> usize {
        self.num_chunks
    }

    pub fn num_masks(&self) -> usize {
        self.num_masks
    }
}

impl Drop for SpillFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!("remove row source mask spill file {}", self.path.display()),
            Err(err) => warn!(
                "failed to remove row source mask spill file {}: {}",
                self.path.display(),
                err
            ),
        }
    }
}

/// Reads a spill file back one chunk at a time.
pub struct SpillReader {
    reader: BufReader<File>,
    remaining_chunks: usize,
    remaining_bytes: u64,
}

impl SpillReader {
    pub fn open(path: impl AsRef<Path>, num_chunks: usize) -> StorageResult<Self> {
        let file = File::open(path)?;
        let remaining_bytes = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            remaining_chunks: num_chunks,
            remaining_bytes,
        })
    }

    /// Deserialize the next chunk. Returns `None` once every chunk written
    /// before the reader was opened has been returned.
    pub fn next_chunk(&mut self) -> StorageResult<Option<Vec<RowSourceMask>>> {
        if self.remaining_chunks == 0 {
            return Ok(None);
        }

        let mut header = [0; CHUNK_HEADER_SIZE];
        self.read_exact(&mut header)?;
        let num_masks = decode_chunk_header(&mut &header[..])?;

        let mut body = vec![0; chunk_body_size(num_masks)];
        self.read_exact(&mut body)?;
        let masks = decode_chunk_body(num_masks, &body)?;

        self.remaining_chunks -= 1;
        Ok(Some(masks))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> StorageResult<()> {
        if (buf.len() as u64) > self.remaining_bytes {
            return Err(TracedStorageError::decode(format!(
                "truncated spill file: expected {} more bytes, found {} ({} chunks missing)",
                buf.len(),
                self.remaining_bytes,
                self.remaining_chunks
            )));
        }
        self.reader.read_exact(buf)?;
        self.remaining_bytes -= buf.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    fn masks(source_nums: &[u16]) -> Vec<RowSourceMask> {
        source_nums
            .iter()
            .map(|&n| RowSourceMask::new(n, n % 2 == 0).unwrap())
            .collect()
    }

    #[test]
    fn test_read_chunks_in_order() {
        let tempdir = tempfile::tempdir().unwrap();
        let mut file = SpillFile::create(tempdir.path(), 7, ChecksumType::Crc32).unwrap();
        file.append_chunk(&masks(&[0, 1, 1])).unwrap();
        file.append_chunk(&masks(&[1, 3, 2])).unwrap();
        file.sync().unwrap();
        assert_eq!(file.num_chunks(), 2);
        assert_eq!(file.num_masks(), 6);

        let mut reader = file.reader().unwrap();
        assert_eq!(reader.next_chunk().unwrap().unwrap(), masks(&[0, 1, 1]));
        assert_eq!(reader.next_chunk().unwrap().unwrap(), masks(&[1, 3, 2]));
        assert!(reader.next_chunk().unwrap().is_none());
        assert!(reader.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_reader_requires_sync() {
        let tempdir = tempfile::tempdir().unwrap();
        let mut file = SpillFile::create(tempdir.path(), 7, ChecksumType::None).unwrap();
        file.append_chunk(&masks(&[4])).unwrap();
        assert!(file.reader().is_err());
        file.sync().unwrap();
        assert!(file.reader().is_ok());
    }

    #[test]
    fn test_truncated_file() {
        let tempdir = tempfile::tempdir().unwrap();
        let mut file = SpillFile::create(tempdir.path(), 8, ChecksumType::Crc32).unwrap();
        file.append_chunk(&masks(&[0, 1])).unwrap();
        file.append_chunk(&masks(&[2, 3])).unwrap();
        file.sync().unwrap();

        let len = std::fs::metadata(file.path()).unwrap().len();
        OpenOptions::new()
            .write(true)
            .open(file.path())
            .unwrap()
            .set_len(len - 3)
            .unwrap();

        let mut reader = file.reader().unwrap();
        assert_eq!(reader.next_chunk().unwrap().unwrap(), masks(&[0, 1]));
        let err = reader.next_chunk().unwrap_err();
        assert!(matches!(err.kind(), StorageError::Decode(_)));
    }

    #[test]
    fn test_missing_file() {
        let tempdir = tempfile::tempdir().unwrap();
        let mut file = SpillFile::create(tempdir.path(), 9, ChecksumType::None).unwrap();
        file.append_chunk(&masks(&[0])).unwrap();
        file.sync().unwrap();
        std::fs::remove_file(file.path()).unwrap();
        let err = file.reader().err().unwrap();
        assert!(matches!(err.kind(), StorageError::Io(_)));
    }

    #[test]
    fn test_failed_file_rejects_further_use() {
        let tempdir = tempfile::tempdir().unwrap();
        let mut file = SpillFile::create(tempdir.path(), 11, ChecksumType::Crc32).unwrap();
        file.append_chunk(&masks(&[0, 1])).unwrap();
        file.failed = true;

        let err = file.append_chunk(&masks(&[2])).unwrap_err();
        assert!(matches!(
            err.kind(),
            StorageError::InvalidState("spill", BufferState::Failed)
        ));
        assert!(file.sync().is_err());
        assert!(file.reader().is_err());
        assert_eq!(file.num_chunks(), 1);
        assert_eq!(file.num_masks(), 2);
    }

    #[test]
    fn test_removed_on_drop() {
        let tempdir = tempfile::tempdir().unwrap();
        let file = SpillFile::create(tempdir.path(), 10, ChecksumType::None).unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());
        drop(file);
        assert!(!path.exists());
    }
}
