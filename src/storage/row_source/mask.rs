// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use bytes::{Buf, BufMut};

use crate::storage::{StorageResult, TracedStorageError};

const AGG_FLAG: u16 = 0x8000;
const SOURCE_NUM_MASK: u16 = 0x7FFF;

/// Largest source number a mask can carry (15 bits).
pub const MAX_SOURCE_NUM: u16 = SOURCE_NUM_MASK;

/// Encode a fixed-width record into a buffer
pub trait PrimitiveFixedWidthEncode: Copy + Clone + 'static + Send + Sync + PartialEq {
    /// Width of each element
    const WIDTH: usize;

    /// Encode current record to the end of a buffer.
    fn encode(&self, buffer: &mut impl BufMut);

    /// Decode a record from a bytes array.
    fn decode(buffer: &mut impl Buf) -> Self;
}

/// Provenance of one merge output row, packed into a 16-bit word.
///
/// ```plain
/// | agg_flag | source_num |
/// |  bit 15  | bits 0-14  |
/// ```
///
/// `source_num` is the ordinal of the input source that produced the row, and
/// `agg_flag` is set when the row is the result of aggregating several source
/// rows in place instead of a straight copy.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RowSourceMask(u16);

impl RowSourceMask {
    pub fn new(source_num: u16, agg_flag: bool) -> StorageResult<Self> {
        let mut mask = Self(0);
        mask.set_source_num(source_num)?;
        mask.set_agg_flag(agg_flag);
        Ok(mask)
    }

    /// Wraps a raw word. Every 16-bit value is a valid mask.
    pub const fn from_data(data: u16) -> Self {
        Self(data)
    }

    pub const fn data(&self) -> u16 {
        self.0
    }

    pub const fn source_num(&self) -> u16 {
        self.0 & SOURCE_NUM_MASK
    }

    pub const fn agg_flag(&self) -> bool {
        self.0 & AGG_FLAG != 0
    }

    /// Replaces the low 15 bits. Fails if `source_num` does not fit.
    pub fn set_source_num(&mut self, source_num: u16) -> StorageResult<()> {
        if source_num > MAX_SOURCE_NUM {
            return Err(TracedStorageError::invalid_argument(format!(
                "source number {source_num} exceeds {MAX_SOURCE_NUM}"
            )));
        }
        self.0 = (self.0 & AGG_FLAG) | source_num;
        Ok(())
    }

    pub fn set_agg_flag(&mut self, agg_flag: bool) {
        if agg_flag {
            self.0 |= AGG_FLAG;
        } else {
            self.0 &= SOURCE_NUM_MASK;
        }
    }
}

impl std::fmt::Debug for RowSourceMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowSourceMask")
            .field("source_num", &self.source_num())
            .field("agg_flag", &self.agg_flag())
            .finish()
    }
}

impl PrimitiveFixedWidthEncode for RowSourceMask {
    const WIDTH: usize = std::mem::size_of::<u16>();

    fn encode(&self, buffer: &mut impl BufMut) {
        buffer.put_u16_le(self.0);
    }

    fn decode(buffer: &mut impl Buf) -> Self {
        Self(buffer.get_u16_le())
    }
}
