// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{CachedHandle, CatalogError, CatalogResult, ColumnCatalog, TableId};
use crate::types::PrimitiveType;

const PROPERTY_DATABASE: &str = "database";
const PROPERTY_TABLE: &str = "table";
const PROPERTY_RESOURCE: &str = "resource";

/// Column types of the external table format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeType {
    Boolean,
    Integer,
    Long,
    Float,
    Double,
    Date,
    Time,
    Timestamp,
    String,
    Uuid,
    Fixed,
    Binary,
    Decimal,
    Struct,
    List,
    Map,
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format!("{self:?}").to_lowercase())
    }
}

/// Local types a column of the given external type may be declared as.
/// Length and precision are not checked. Types without a mapping return an
/// empty set.
pub fn valid_column_types(native: NativeType) -> &'static [PrimitiveType] {
    use PrimitiveType::*;
    match native {
        NativeType::Boolean => &[Boolean],
        NativeType::Integer => &[Int, TinyInt, SmallInt],
        NativeType::Time | NativeType::Timestamp | NativeType::Long => &[BigInt],
        NativeType::Float => &[Float],
        NativeType::Double => &[Double],
        NativeType::Date => &[Date, DateTime],
        NativeType::String | NativeType::Uuid => &[Varchar, Char],
        NativeType::Decimal => &[DecimalV2, Decimal32, Decimal64, Decimal128],
        NativeType::Fixed
        | NativeType::Binary
        | NativeType::Struct
        | NativeType::List
        | NativeType::Map => &[],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteColumn {
    pub name: String,
    pub native_type: NativeType,
}

/// A table owned by an external catalog service.
pub trait RemoteTable: Send + Sync {
    fn columns(&self) -> &[RemoteColumn];

    fn location(&self) -> &str;
}

pub type RemoteTableRef = Arc<dyn RemoteTable>;

/// Loads remote table objects from an external catalog service.
pub trait ExternalCatalog: Send + Sync {
    fn load_table(&self, database: &str, table: &str) -> CatalogResult<RemoteTableRef>;
}

/// Local definition of a table whose data lives in an external catalog.
#[derive(Serialize, Deserialize)]
pub struct ExternalTable {
    id: TableId,
    name: String,
    columns: Vec<ColumnCatalog>,
    database: String,
    table: String,
    resource: String,
    #[serde(skip)]
    remote: CachedHandle<RemoteTableRef>,
}

impl ExternalTable {
    /// Create a table definition from its `database`, `table` and `resource`
    /// properties, checking every declared column against the remote table.
    pub fn new(
        id: TableId,
        name: impl Into<String>,
        columns: Vec<ColumnCatalog>,
        properties: &HashMap<String, String>,
        catalog: &dyn ExternalCatalog,
    ) -> CatalogResult<Self> {
        let mut properties: BTreeMap<_, _> = properties.clone().into_iter().collect();
        let mut take = |key: &'static str| match properties.remove(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(CatalogError::MissingProperty(key)),
        };
        let database = take(PROPERTY_DATABASE)?;
        let table = take(PROPERTY_TABLE)?;
        let resource = take(PROPERTY_RESOURCE)?;
        if !properties.is_empty() {
            return Err(CatalogError::UnknownProperties(
                properties
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .join(", "),
            ));
        }

        let external_table = Self {
            id,
            name: name.into(),
            columns,
            database,
            table,
            resource,
            remote: CachedHandle::new(),
        };
        let remote = external_table.remote_table(catalog)?;
        external_table.validate_columns(remote.as_ref())?;
        info!(
            "external table {} bound to {}.{} via resource {}",
            external_table.name,
            external_table.database,
            external_table.table,
            external_table.resource
        );
        Ok(external_table)
    }

    fn validate_columns(&self, remote: &dyn RemoteTable) -> CatalogResult<()> {
        let remote_columns: HashMap<_, _> = remote
            .columns()
            .iter()
            .map(|column| (column.name.as_str(), column.native_type))
            .collect();
        for column in &self.columns {
            let native = *remote_columns
                .get(column.name())
                .ok_or_else(|| CatalogError::NotFound("column", column.name().into()))?;
            if !valid_column_types(native).contains(&column.datatype()) {
                return Err(CatalogError::IncompatibleType {
                    column: column.name().into(),
                    native,
                    local: column.datatype(),
                });
            }
        }
        Ok(())
    }

    /// The remote table object, loaded from `catalog` on first use and shared
    /// afterwards.
    pub fn remote_table(&self, catalog: &dyn ExternalCatalog) -> CatalogResult<RemoteTableRef> {
        self.remote.get_or_try_load(|| {
            catalog
                .load_table(&self.database, &self.table)
                .map_err(|err| {
                    error!(
                        "failed to load external table {}.{}: {}",
                        self.database, self.table, err
                    );
                    err
                })
        })
    }

    pub fn column(&self, name: &str) -> Option<&ColumnCatalog> {
        self.columns.iter().find(|column| column.name() == name)
    }

    pub fn columns(&self) -> &[ColumnCatalog] {
        &self.columns
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn to_json(&self) -> CatalogResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restore a table definition. The remote table is loaded again on first use.
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct MockTable {
        columns: Vec<RemoteColumn>,
    }

    impl RemoteTable for MockTable {
        fn columns(&self) -> &[RemoteColumn] {
            &self.columns
        }

        fn location(&self) -> &str {
            "hdfs://warehouse/db1/t1"
        }
    }

    #[derive(Default)]
    struct MockCatalog {
        loads: AtomicUsize,
    }

    impl ExternalCatalog for MockCatalog {
        fn load_table(&self, database: &str, table: &str) -> CatalogResult<RemoteTableRef> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if (database, table) != ("db1", "t1") {
                return Err(CatalogError::Load(
                    format!("{database}.{table}"),
                    "no such table".into(),
                ));
            }
            Ok(Arc::new(MockTable {
                columns: vec![
                    RemoteColumn {
                        name: "id".into(),
                        native_type: NativeType::Long,
                    },
                    RemoteColumn {
                        name: "price".into(),
                        native_type: NativeType::Decimal,
                    },
                    RemoteColumn {
                        name: "payload".into(),
                        native_type: NativeType::Binary,
                    },
                ],
            }))
        }
    }

    fn properties(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn default_properties() -> HashMap<String, String> {
        properties(&[("database", "db1"), ("table", "t1"), ("resource", "iceberg0")])
    }

    #[test]
    fn test_type_mapping() {
        assert_eq!(valid_column_types(NativeType::Boolean), &[PrimitiveType::Boolean]);
        assert!(valid_column_types(NativeType::Decimal).contains(&PrimitiveType::Decimal128));
        assert!(valid_column_types(NativeType::Timestamp).contains(&PrimitiveType::BigInt));
        assert!(!valid_column_types(NativeType::Integer).contains(&PrimitiveType::BigInt));
        assert!(valid_column_types(NativeType::Map).is_empty());
    }

    #[test]
    fn test_create_and_cache() {
        let catalog = MockCatalog::default();
        let table = ExternalTable::new(
            1,
            "orders",
            vec![
                ColumnCatalog::new(0, "id", PrimitiveType::BigInt, false),
                ColumnCatalog::new(1, "price", PrimitiveType::Decimal64, true),
            ],
            &default_properties(),
            &catalog,
        )
        .unwrap();
        assert_eq!(table.column("price").unwrap().id(), 1);
        assert!(table.column("payload").is_none());

        let remote = table.remote_table(&catalog).unwrap();
        assert_eq!(remote.location(), "hdfs://warehouse/db1/t1");
        table.remote_table(&catalog).unwrap();
        assert_eq!(catalog.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_incompatible_column() {
        let catalog = MockCatalog::default();
        let err = ExternalTable::new(
            1,
            "orders",
            vec![ColumnCatalog::new(0, "payload", PrimitiveType::Varchar, true)],
            &default_properties(),
            &catalog,
        )
        .err()
        .unwrap();
        assert!(matches!(err, CatalogError::IncompatibleType { native: NativeType::Binary, .. }));

        let err = ExternalTable::new(
            1,
            "orders",
            vec![ColumnCatalog::new(0, "missing", PrimitiveType::Int, true)],
            &default_properties(),
            &catalog,
        )
        .err()
        .unwrap();
        assert_eq!(err, CatalogError::NotFound("column", "missing".into()));
    }

    #[test]
    fn test_properties() {
        let catalog = MockCatalog::default();
        let err = ExternalTable::new(1, "t", vec![], &properties(&[("table", "t1")]), &catalog)
            .err()
            .unwrap();
        assert_eq!(err, CatalogError::MissingProperty("database"));

        let mut props = default_properties();
        props.insert("owner".into(), "alice".into());
        let err = ExternalTable::new(1, "t", vec![], &props, &catalog).err().unwrap();
        assert_eq!(err, CatalogError::UnknownProperties("owner=alice".into()));
        assert_eq!(catalog.loads.load(Ordering::SeqCst), 0);

        let mut props = default_properties();
        props.insert("table".into(), "t2".into());
        let err = ExternalTable::new(1, "t", vec![], &props, &catalog).err().unwrap();
        assert!(matches!(err, CatalogError::Load(..)));
    }

    #[test]
    fn test_json() {
        let catalog = MockCatalog::default();
        let table = ExternalTable::new(
            7,
            "orders",
            vec![ColumnCatalog::new(0, "id", PrimitiveType::BigInt, false)],
            &default_properties(),
            &catalog,
        )
        .unwrap();
        let restored = ExternalTable::from_json(&table.to_json().unwrap()).unwrap();
        assert_eq!(restored.id(), 7);
        assert_eq!(restored.database(), "db1");
        assert_eq!(restored.resource(), "iceberg0");
        assert_eq!(restored.columns(), table.columns());
        assert!(!restored.remote.is_loaded());
    }
}
