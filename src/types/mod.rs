// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Primitive column types of the local engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Date,
    DateTime,
    Char,
    Varchar,
    DecimalV2,
    Decimal32,
    Decimal64,
    Decimal128,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "BOOLEAN",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Int => "INT",
            Self::BigInt => "BIGINT",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Date => "DATE",
            Self::DateTime => "DATETIME",
            Self::Char => "CHAR",
            Self::Varchar => "VARCHAR",
            Self::DecimalV2 => "DECIMALV2",
            Self::Decimal32 => "DECIMAL32",
            Self::Decimal64 => "DECIMAL64",
            Self::Decimal128 => "DECIMAL128",
        };
        write!(f, "{name}")
    }
}
