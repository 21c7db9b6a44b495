// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use std::path::PathBuf;

use super::ChecksumType;

/// Directory under the storage root holding spill files.
pub const TMP_DIR_NAME: &str = "tmp";

/// Options for `RowSourceMaskBuffer`
#[derive(Clone, Debug)]
pub struct RowSourceMaskOptions {
    /// Storage root. Spill files are created under `<path>/tmp`.
    pub path: PathBuf,

    /// Resident bytes a buffer may hold before spilling to disk
    pub max_row_source_mask_memory_bytes: usize,

    /// Checksum type used by spilled chunks
    pub checksum_type: ChecksumType,
}

impl RowSourceMaskOptions {
    pub fn default_for_cli() -> Self {
        Self {
            path: PathBuf::new().join("rowsource.db"),
            max_row_source_mask_memory_bytes: 200 * (1 << 20), // 200MB
            checksum_type: ChecksumType::Crc32,
        }
    }

    pub fn default_for_test(path: PathBuf) -> Self {
        Self {
            path,
            max_row_source_mask_memory_bytes: 1 << 10, // 1KB
            checksum_type: ChecksumType::Crc32,
        }
    }

    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.max_row_source_mask_memory_bytes = bytes;
        self
    }

    pub fn spill_dir(&self) -> PathBuf {
        self.path.join(TMP_DIR_NAME)
    }
}
