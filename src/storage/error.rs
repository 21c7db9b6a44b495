// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use std::backtrace::Backtrace;

use thiserror::Error;

use super::row_source::BufferState;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{0} is not allowed while the buffer is {1}")]
    InvalidState(&'static str, BufferState),
    #[error("IO error: {0}")]
    Io(#[from] Box<std::io::Error>),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Invalid checksum: found {0}, expected {1}")]
    Checksum(u64, u64),
    #[error("no row source mask at the cursor")]
    OutOfRange,
}

impl From<std::io::Error> for TracedStorageError {
    #[inline]
    fn from(e: std::io::Error) -> TracedStorageError {
        StorageError::Io(e.into()).into()
    }
}

/// [`StorageResult`] with backtrace.
pub struct TracedStorageError {
    source: StorageError,
    backtrace: Backtrace,
}

impl From<StorageError> for TracedStorageError {
    #[inline]
    fn from(source: StorageError) -> Self {
        Self {
            source,
            backtrace: Backtrace::capture(),
        }
    }
}

impl std::fmt::Display for TracedStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}\n{}", self.source, self.backtrace)
    }
}

impl std::fmt::Debug for TracedStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl std::error::Error for TracedStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl TracedStorageError {
    pub fn invalid_argument(message: impl ToString) -> Self {
        StorageError::InvalidArgument(message.to_string()).into()
    }

    pub fn invalid_state(op: &'static str, state: BufferState) -> Self {
        StorageError::InvalidState(op, state).into()
    }

    pub fn decode(message: impl ToString) -> Self {
        StorageError::Decode(message.to_string()).into()
    }

    pub fn checksum(found: u64, expected: u64) -> Self {
        StorageError::Checksum(found, expected).into()
    }

    pub fn out_of_range() -> Self {
        StorageError::OutOfRange.into()
    }

    /// The error without its backtrace, for matching on the failure kind.
    pub fn kind(&self) -> &StorageError {
        &self.source
    }
}

pub type StorageResult<T> = std::result::Result<T, TracedStorageError>;
