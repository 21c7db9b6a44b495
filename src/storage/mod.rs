// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Storage engine components.

mod error;
pub mod row_source;

pub use self::error::*;
pub use self::row_source::{
    BufferState, ChecksumType, RowSourceMask, RowSourceMaskBuffer, RowSourceMaskOptions,
    TabletId,
};
