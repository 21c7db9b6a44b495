// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Encoding of spilled mask chunks.
//!
//! A spill file is a plain concatenation of chunks. Each chunk holds the masks
//! that were resident when the buffer spilled, in append order:
//!
//! ```plain
//! | num_masks |      masks      | cksum_type | cksum |
//! |    4B     | 2B * num_masks  |     4B     |  8B   |
//! ```

use bytes::{Buf, BufMut};

use super::{build_checksum, verify_checksum, ChecksumType, PrimitiveFixedWidthEncode, RowSourceMask};
use crate::storage::{StorageResult, TracedStorageError};

pub const CHUNK_HEADER_SIZE: usize = 4;
pub const CHUNK_FOOTER_SIZE: usize = 4 + 8;

#[derive(Default, Debug, Clone)]
pub struct ChunkFooter {
    pub checksum_type: ChecksumType,
    pub checksum: u64,
}

impl ChunkFooter {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i32_le(self.checksum_type.into());
        buf.put_u64_le(self.checksum);
    }

    pub fn decode(buf: &mut impl Buf) -> StorageResult<Self> {
        if buf.remaining() < CHUNK_FOOTER_SIZE {
            return Err(TracedStorageError::decode(format!(
                "expected {CHUNK_FOOTER_SIZE} bytes of chunk footer"
            )));
        }
        let checksum_type = ChecksumType::try_from(buf.get_i32_le())?;
        let checksum = buf.get_u64_le();
        Ok(Self {
            checksum_type,
            checksum,
        })
    }
}

/// Size in bytes of everything following the header of a chunk with `num_masks` masks.
pub fn chunk_body_size(num_masks: usize) -> usize {
    num_masks * RowSourceMask::WIDTH + CHUNK_FOOTER_SIZE
}

/// Number of masks as stored in a chunk header. Fails if it does not fit in 4 bytes.
pub fn header_num_masks(num_masks: usize) -> StorageResult<u32> {
    u32::try_from(num_masks).map_err(|_| {
        TracedStorageError::invalid_argument(format!(
            "chunk of {num_masks} masks exceeds {} masks",
            u32::MAX
        ))
    })
}

/// Append an encoded chunk to `buf`. Nothing is appended on failure.
pub fn encode_chunk(
    masks: &[RowSourceMask],
    checksum_type: ChecksumType,
    buf: &mut impl BufMut,
) -> StorageResult<()> {
    let num_masks = header_num_masks(masks.len())?;
    let mut data = Vec::with_capacity(masks.len() * RowSourceMask::WIDTH);
    for mask in masks {
        mask.encode(&mut data);
    }
    let footer = ChunkFooter {
        checksum_type,
        checksum: build_checksum(checksum_type, &data),
    };
    buf.put_u32_le(num_masks);
    buf.put_slice(&data);
    footer.encode(buf);
    Ok(())
}

/// Decode the number of masks in the chunk starting at `buf`.
pub fn decode_chunk_header(buf: &mut impl Buf) -> StorageResult<usize> {
    if buf.remaining() < CHUNK_HEADER_SIZE {
        return Err(TracedStorageError::decode(format!(
            "expected {CHUNK_HEADER_SIZE} bytes of chunk header"
        )));
    }
    Ok(buf.get_u32_le() as usize)
}

/// Decode the masks of a chunk, given the body following its header.
pub fn decode_chunk_body(num_masks: usize, body: &[u8]) -> StorageResult<Vec<RowSourceMask>> {
    if body.len() != chunk_body_size(num_masks) {
        return Err(TracedStorageError::decode(format!(
            "chunk of {} masks expects {} bytes, found {}",
            num_masks,
            chunk_body_size(num_masks),
            body.len()
        )));
    }
    let (data, mut footer) = body.split_at(num_masks * RowSourceMask::WIDTH);
    let footer = ChunkFooter::decode(&mut footer)?;
    verify_checksum(footer.checksum_type, data, footer.checksum)?;

    let mut data = data;
    let mut masks = Vec::with_capacity(num_masks);
    while data.has_remaining() {
        masks.push(RowSourceMask::decode(&mut data));
    }
    Ok(masks)
}
