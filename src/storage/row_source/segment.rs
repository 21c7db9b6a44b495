// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use tracing::info;

use super::{
    PrimitiveFixedWidthEncode, RowSourceMask, RowSourceMaskOptions, SpillFile, SpillReader,
    TabletId,
};
use crate::storage::StorageResult;

/// Holds the masks of one buffer: a spilled segment on disk, followed by the
/// resident segment of masks appended since the last spill.
///
/// Whenever the resident segment grows beyond
/// `max_row_source_mask_memory_bytes`, it is spilled as a whole, in append
/// order, as one chunk of the spill file.
pub struct MaskSegmentStore {
    tablet_id: TabletId,
    options: RowSourceMaskOptions,
    resident: Vec<RowSourceMask>,
    resident_bytes: usize,
    spilled: Option<SpillFile>,
}

impl MaskSegmentStore {
    pub fn new(tablet_id: TabletId, options: RowSourceMaskOptions) -> Self {
        Self {
            tablet_id,
            options,
            resident: vec![],
            resident_bytes: 0,
            spilled: None,
        }
    }

    /// Append `masks` after every mask appended so far. If spilling fails,
    /// none of `masks` is kept.
    pub fn append(&mut self, masks: &[RowSourceMask]) -> StorageResult<()> {
        if masks.is_empty() {
            return Ok(());
        }
        let resident_len = self.resident.len();
        self.resident.extend_from_slice(masks);
        self.resident_bytes += masks.len() * RowSourceMask::WIDTH;
        if self.resident_bytes > self.options.max_row_source_mask_memory_bytes {
            if let Err(err) = self.spill() {
                self.resident.truncate(resident_len);
                self.resident_bytes = resident_len * RowSourceMask::WIDTH;
                return Err(err);
            }
        }
        Ok(())
    }

    fn spill(&mut self) -> StorageResult<()> {
        if self.spilled.is_none() {
            info!(
                "tablet {} exceeds {} resident mask bytes, spilling to disk",
                self.tablet_id, self.options.max_row_source_mask_memory_bytes
            );
            let file = SpillFile::create(
                self.options.spill_dir(),
                self.tablet_id,
                self.options.checksum_type,
            )?;
            self.spilled = Some(file);
        }
        if let Some(file) = &mut self.spilled {
            file.append_chunk(&self.resident)?;
        }
        self.resident.clear();
        self.resident_bytes = 0;
        Ok(())
    }

    /// Make every spilled chunk readable. Resident masks stay in memory.
    pub fn flush(&mut self) -> StorageResult<()> {
        match &mut self.spilled {
            Some(file) => file.sync(),
            None => Ok(()),
        }
    }

    /// Open a reader over the spilled segment, if anything was spilled.
    pub fn spilled_reader(&self) -> StorageResult<Option<SpillReader>> {
        self.spilled.as_ref().map(SpillFile::reader).transpose()
    }

    /// The resident segment, which follows every spilled mask in append order.
    pub fn resident(&self) -> &[RowSourceMask] {
        &self.resident
    }

    /// Whether a failed spill may have left a partial chunk on disk.
    pub fn is_failed(&self) -> bool {
        self.spilled.as_ref().is_some_and(SpillFile::is_failed)
    }

    pub fn resident_bytes(&self) -> usize {
        self.resident_bytes
    }

    pub fn num_spilled_chunks(&self) -> usize {
        self.spilled.as_ref().map_or(0, SpillFile::num_chunks)
    }

    pub fn num_masks(&self) -> usize {
        self.spilled.as_ref().map_or(0, SpillFile::num_masks) + self.resident.len()
    }

    pub fn tablet_id(&self) -> TabletId {
        self.tablet_id
    }
}
