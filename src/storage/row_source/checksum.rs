use crate::storage::{StorageResult, TracedStorageError};

/// Checksum stored after each spilled chunk.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumType {
    #[default]
    None = 0,
    Crc32 = 1,
}

impl From<ChecksumType> for i32 {
    fn from(ty: ChecksumType) -> i32 {
        ty as i32
    }
}

impl TryFrom<i32> for ChecksumType {
    type Error = TracedStorageError;

    fn try_from(value: i32) -> StorageResult<Self> {
        match value {
            0 => Ok(ChecksumType::None),
            1 => Ok(ChecksumType::Crc32),
            _ => Err(TracedStorageError::decode(format!(
                "invalid checksum type {value}"
            ))),
        }
    }
}

pub fn build_checksum(checksum_type: ChecksumType, data: &[u8]) -> u64 {
    match checksum_type {
        ChecksumType::None => 0,
        ChecksumType::Crc32 => crc32fast::hash(data) as u64,
    }
}

pub fn verify_checksum(checksum_type: ChecksumType, data: &[u8], checksum: u64) -> StorageResult<()> {
    match checksum_type {
        ChecksumType::None => Ok(()),
        ChecksumType::Crc32 => {
            let found = crc32fast::hash(data) as u64;
            if found != checksum {
                return Err(TracedStorageError::checksum(found, checksum));
            }
            Ok(())
        }
    }
}
