// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Row-source masks of multi-source merges.
//!
//! Compaction, schema change and rollup merge rows from several input
//! sources. For every output row, the merge records a [`RowSourceMask`] in a
//! [`RowSourceMaskBuffer`] and replays them in a second pass over its output.

pub use buffer::*;
pub use checksum::*;
pub use mask::*;
pub use options::*;
use segment::*;
pub use spill_file::*;

mod buffer;
mod checksum;
mod chunk;
mod mask;
mod options;
mod segment;
mod spill_file;

pub type TabletId = u64;
