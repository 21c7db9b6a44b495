// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Row-source provenance of multi-source merges in a columnar storage engine.
//!
//! Compaction, schema change and rollup merge rows from several sources into
//! one output. [`storage::RowSourceMaskBuffer`] records, for every output row,
//! which source it came from, spilling to disk beyond a memory ceiling and
//! replaying the masks in order in a second pass.

#![deny(unused_must_use)]

pub mod catalog;
pub mod storage;
pub mod types;
