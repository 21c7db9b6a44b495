// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Metadata collaborators of the storage engine.

pub use self::cached::*;
pub use self::column::*;
pub use self::external_table::*;

mod cached;
mod column;
mod external_table;

pub type TableId = u32;
pub type ColumnId = u32;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),
    #[error("property '{0}' must be set")]
    MissingProperty(&'static str),
    #[error("unknown table properties: {0}")]
    UnknownProperties(String),
    #[error("can not convert external column type [{native}] to local type [{local}], column name: {column}")]
    IncompatibleType {
        column: String,
        native: NativeType,
        local: crate::types::PrimitiveType,
    },
    #[error("failed to load external table {0}: {1}")]
    Load(String, String),
    #[error("JSON decode error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        CatalogError::Json(e.to_string())
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
