// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use serde::{Deserialize, Serialize};

use super::ColumnId;
use crate::types::PrimitiveType;

/// A column declared by a local table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCatalog {
    id: ColumnId,
    name: String,
    datatype: PrimitiveType,
    is_nullable: bool,
}

impl ColumnCatalog {
    pub fn new(id: ColumnId, name: impl Into<String>, datatype: PrimitiveType, is_nullable: bool) -> Self {
        ColumnCatalog {
            id,
            name: name.into(),
            datatype,
            is_nullable,
        }
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn datatype(&self) -> PrimitiveType {
        self.datatype
    }

    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }
}
