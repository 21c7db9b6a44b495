// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt;

use tracing::debug;

use super::{MaskSegmentStore, RowSourceMask, RowSourceMaskOptions, SpillReader, TabletId};
use crate::storage::{StorageResult, TracedStorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Writing,
    Reading,
    /// A spill failed after some of its bytes may have reached the spill file.
    Failed,
}

impl fmt::Display for BufferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Writing => write!(f, "writing"),
            Self::Reading => write!(f, "reading"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Position of the read cursor.
enum SegmentCursor {
    /// Inside the spilled segment. `chunk` is the only materialized chunk.
    Spilled {
        reader: SpillReader,
        chunk: Vec<RowSourceMask>,
        offset: usize,
    },
    /// Inside the resident segment, after every spilled mask.
    Resident { offset: usize },
}

/// Records, for every output row of a multi-source merge, which source
/// produced it and whether it was aggregated in place.
///
/// The merge writes one mask per output row while producing its output, then
/// calls [`flush`](Self::flush) and [`flip`](Self::flip) and reads the masks
/// back in the same order with [`has_remaining`](Self::has_remaining),
/// [`current`](Self::current) and [`advance`](Self::advance).
///
/// Masks beyond `max_row_source_mask_memory_bytes` are spilled to a per-tablet
/// file that is read back one chunk at a time and removed when the buffer
/// drops. The buffer is meant for a single merge task and is not thread-safe.
pub struct RowSourceMaskBuffer {
    /// `None` while writing.
    cursor: Option<SegmentCursor>,
    store: MaskSegmentStore,
}

impl RowSourceMaskBuffer {
    pub fn new(tablet_id: TabletId, options: RowSourceMaskOptions) -> Self {
        Self {
            cursor: None,
            store: MaskSegmentStore::new(tablet_id, options),
        }
    }

    pub fn state(&self) -> BufferState {
        if self.store.is_failed() {
            return BufferState::Failed;
        }
        match self.cursor {
            None => BufferState::Writing,
            Some(_) => BufferState::Reading,
        }
    }

    /// Append `masks` in order. On error none of `masks` is recorded.
    pub fn write(&mut self, masks: &[RowSourceMask]) -> StorageResult<()> {
        self.check_state("write", BufferState::Writing)?;
        self.store.append(masks)
    }

    /// Make spilled masks readable. Masks still resident are kept in memory.
    pub fn flush(&mut self) -> StorageResult<()> {
        self.check_state("flush", BufferState::Writing)?;
        self.store.flush()
    }

    /// Switch to reading and move the cursor to the first mask. Flipping a
    /// buffer that is already reading restarts from the first mask.
    pub fn flip(&mut self) -> StorageResult<()> {
        if self.store.is_failed() {
            return Err(TracedStorageError::invalid_state(
                "flip",
                BufferState::Failed,
            ));
        }
        if self.cursor.is_none() {
            self.store.flush()?;
        }
        let cursor = match self.store.spilled_reader()? {
            Some(reader) => SegmentCursor::Spilled {
                reader,
                chunk: vec![],
                offset: 0,
            },
            None => SegmentCursor::Resident { offset: 0 },
        };
        debug!(
            "flip row source mask buffer of tablet {}: {} masks, {} spilled chunks, {} resident bytes",
            self.store.tablet_id(),
            self.store.num_masks(),
            self.store.num_spilled_chunks(),
            self.store.resident_bytes()
        );
        self.cursor = Some(cursor);
        Ok(())
    }

    /// Whether a mask exists at the cursor. Loads the next spilled chunk when
    /// the current one is exhausted.
    pub fn has_remaining(&mut self) -> StorageResult<bool> {
        let resident_len = self.store.resident().len();
        let Some(cursor) = &mut self.cursor else {
            return Err(TracedStorageError::invalid_state(
                "has_remaining",
                BufferState::Writing,
            ));
        };
        loop {
            let next = match cursor {
                SegmentCursor::Spilled {
                    reader,
                    chunk,
                    offset,
                } => {
                    if *offset < chunk.len() {
                        return Ok(true);
                    }
                    match reader.next_chunk()? {
                        Some(next) => {
                            *chunk = next;
                            *offset = 0;
                            continue;
                        }
                        None => SegmentCursor::Resident { offset: 0 },
                    }
                }
                SegmentCursor::Resident { offset } => return Ok(*offset < resident_len),
            };
            *cursor = next;
        }
    }

    /// The mask at the cursor. Only valid after `has_remaining` returned true.
    pub fn current(&self) -> StorageResult<RowSourceMask> {
        self.window()?
            .first()
            .copied()
            .ok_or_else(TracedStorageError::out_of_range)
    }

    /// Move the cursor to the next mask. Crossing into the next chunk or
    /// segment happens on the following `has_remaining`.
    pub fn advance(&mut self) -> StorageResult<()> {
        match &mut self.cursor {
            Some(SegmentCursor::Spilled { offset, .. } | SegmentCursor::Resident { offset }) => {
                *offset += 1;
                Ok(())
            }
            None => Err(TracedStorageError::invalid_state(
                "advance",
                BufferState::Writing,
            )),
        }
    }

    /// Whether the `count` masks starting at the cursor all come from
    /// `source_num`.
    ///
    /// Only masks already in memory are inspected: the current spilled chunk,
    /// or the resident segment once the cursor reached it. No chunk is read to
    /// answer, so a run crossing the end of the current chunk yields `false`
    /// even if the masks beyond it match.
    pub fn has_same_source(&self, source_num: u16, count: usize) -> bool {
        match self.window() {
            Ok(window) if count <= window.len() => window[..count]
                .iter()
                .all(|mask| mask.source_num() == source_num),
            _ => false,
        }
    }

    /// Materialized masks from the cursor to the end of the current chunk or segment.
    fn window(&self) -> StorageResult<&[RowSourceMask]> {
        let (masks, offset) = match &self.cursor {
            Some(SegmentCursor::Spilled { chunk, offset, .. }) => (chunk.as_slice(), *offset),
            Some(SegmentCursor::Resident { offset }) => (self.store.resident(), *offset),
            None => {
                return Err(TracedStorageError::invalid_state(
                    "reading",
                    BufferState::Writing,
                ))
            }
        };
        Ok(masks.get(offset..).unwrap_or_default())
    }

    fn check_state(&self, op: &'static str, expected: BufferState) -> StorageResult<()> {
        let state = self.state();
        if state != expected {
            return Err(TracedStorageError::invalid_state(op, state));
        }
        Ok(())
    }

    pub fn tablet_id(&self) -> TabletId {
        self.store.tablet_id()
    }

    /// Number of masks written so far.
    pub fn num_masks(&self) -> usize {
        self.store.num_masks()
    }

    /// Bytes of masks currently held in memory rather than spilled.
    pub fn memory_usage(&self) -> usize {
        self.store.resident_bytes()
    }

    pub fn num_spilled_chunks(&self) -> usize {
        self.store.num_spilled_chunks()
    }
}
