//! Procedure catalog: templates, table types and mapping caches behind an
//! atomically swappable snapshot

use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use parking_lot::RwLock;

use crate::config::ConnectionConfig;
use crate::error::{ProcedureError, Result};
use crate::materialize::{ColumnPropertyMapping, MappingCache, ObjectPropertyParameterMapping};
use crate::metadata::{CatalogMetadata, MetadataSource, TableTypeMetadata};
use crate::naming::{normalize_object_name, to_underscore, DEFAULT_SCHEMA};
use crate::procedure::{ProcedureInstance, ProcedureTemplate};
use crate::types::{TableType, TableTypeColumn};

/// Everything loaded by one catalog build.
///
/// Instances keep the snapshot they were created from, so a rebuild never
/// changes the table types or caches an in-flight instance sees.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    procedures: HashMap<String, Arc<ProcedureTemplate>>,
    table_types: HashMap<String, Arc<TableType>>,
    column_mappings: MappingCache<ColumnPropertyMapping>,
    parameter_mappings: MappingCache<ObjectPropertyParameterMapping>,
}

impl CatalogSnapshot {
    /// Builds templates and table types from a catalog document
    pub fn build(metadata: &CatalogMetadata, connections: &ConnectionConfig) -> Result<Self> {
        let mut table_types = HashMap::with_capacity(metadata.table_types.len());
        for described in &metadata.table_types {
            let table_type = build_table_type(described)?;
            table_types.insert(table_type.name.clone(), Arc::new(table_type));
        }

        let mut procedures = HashMap::with_capacity(metadata.procedures.len());
        for described in &metadata.procedures {
            let template = ProcedureTemplate::from_metadata(described, connections)?;
            let name = template.name().to_string();
            if procedures.insert(name.clone(), Arc::new(template)).is_some() {
                return Err(ProcedureError::InvalidMetadata {
                    procedure: name,
                    message: "procedure described twice".to_string(),
                });
            }
        }

        Ok(Self {
            procedures,
            table_types,
            column_mappings: MappingCache::new(),
            parameter_mappings: MappingCache::new(),
        })
    }

    /// Template by name; unqualified names use the `dbo` schema
    pub fn template(&self, name: &str) -> Result<&Arc<ProcedureTemplate>> {
        let normalized = normalize_object_name(name, DEFAULT_SCHEMA);
        self.procedures
            .get(&normalized)
            .ok_or(ProcedureError::UnknownProcedure { name: normalized })
    }

    /// Row shape of a user-defined table type
    pub fn table_type(&self, name: &str) -> Result<&Arc<TableType>> {
        let normalized = normalize_object_name(name, DEFAULT_SCHEMA);
        self.table_types
            .get(&normalized)
            .ok_or(ProcedureError::UnknownTableType { name: normalized })
    }

    pub fn procedure_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.procedures.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn procedure_count(&self) -> usize {
        self.procedures.len()
    }

    pub fn table_type_count(&self) -> usize {
        self.table_types.len()
    }

    /// Result column to record field mappings
    pub fn column_mappings(&self) -> &MappingCache<ColumnPropertyMapping> {
        &self.column_mappings
    }

    /// Record field to parameter mappings
    pub fn parameter_mappings(&self) -> &MappingCache<ObjectPropertyParameterMapping> {
        &self.parameter_mappings
    }
}

fn build_table_type(described: &TableTypeMetadata) -> Result<TableType> {
    let columns = described
        .columns
        .iter()
        .map(|column| {
            // Length limits only apply to character columns
            let max_length = column
                .character_maximum_length
                .filter(|_| column.data_type.to_ascii_lowercase().contains("char"));
            TableTypeColumn::new(
                column.column_name.clone(),
                &column.data_type,
                column.is_nullable,
                max_length,
            )
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(TableType::new(described.qualified_name(), columns))
}

/// Entry point for obtaining procedure instances.
///
/// ```
/// use rust_sqlproc::{Catalog, ConnectionConfig, JsonMetadataSource};
///
/// let source = JsonMetadataSource::from_text(r#"{
///     "procedures": [{ "specificSchema": "dbo", "specificName": "CLEAR_DATA", "isNonQuery": true }]
/// }"#);
/// let connections = ConnectionConfig::new().with_connection("dbo", "Server=.");
/// let catalog = Catalog::new(source, connections).unwrap();
///
/// let instance = catalog.procedure("CLEAR_DATA").unwrap();
/// assert_eq!(instance.name(), "[dbo].[CLEAR_DATA]");
/// ```
pub struct Catalog {
    source: Box<dyn MetadataSource>,
    connections: ConnectionConfig,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
}

impl Catalog {
    /// Loads the catalog from `source`
    pub fn new(
        source: impl MetadataSource + 'static,
        connections: ConnectionConfig,
    ) -> anyhow::Result<Self> {
        let source: Box<dyn MetadataSource> = Box::new(source);
        let snapshot = Self::load(source.as_ref(), &connections)?;
        Ok(Self {
            source,
            connections,
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    fn load(source: &dyn MetadataSource, connections: &ConnectionConfig) -> anyhow::Result<CatalogSnapshot> {
        let metadata = source.load()?;
        let snapshot = CatalogSnapshot::build(&metadata, connections)?;
        info!(
            "Loaded {} procedures and {} table types",
            snapshot.procedure_count(),
            snapshot.table_type_count()
        );
        Ok(snapshot)
    }

    /// Reloads metadata and swaps in a fresh snapshot with empty caches.
    ///
    /// On failure the current snapshot stays in place.
    pub fn rebuild(&self) -> anyhow::Result<()> {
        let snapshot = Self::load(self.source.as_ref(), &self.connections)?;
        *self.snapshot.write() = Arc::new(snapshot);
        info!("Catalog rebuilt");
        Ok(())
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn connections(&self) -> &ConnectionConfig {
        &self.connections
    }

    /// Template by name; unqualified names use the `dbo` schema
    pub fn template(&self, name: &str) -> Result<Arc<ProcedureTemplate>> {
        self.snapshot().template(name).map(Arc::clone)
    }

    /// Fresh, unbound instance of a procedure
    pub fn procedure(&self, name: &str) -> Result<ProcedureInstance> {
        let snapshot = self.snapshot();
        let template = Arc::clone(snapshot.template(name)?);
        Ok(ProcedureInstance::new(template, snapshot))
    }

    /// Instance of the procedure serving an HTTP method on a resource:
    /// `("POST", "open", "orderItem")` resolves to `[open].[POST_ORDER_ITEM]`.
    pub fn rest_procedure(&self, method: &str, schema: &str, name: &str) -> Result<ProcedureInstance> {
        let specific_name = format!("{}_{}", method.to_ascii_uppercase(), to_underscore(name));
        self.procedure(&format!("{}.{}", schema, specific_name))
    }

    pub fn table_type(&self, name: &str) -> Result<Arc<TableType>> {
        self.snapshot().table_type(name).map(Arc::clone)
    }

    pub fn procedure_names(&self) -> Vec<String> {
        self.snapshot()
            .procedure_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("Catalog")
            .field("procedures", &snapshot.procedure_count())
            .field("table_types", &snapshot.table_type_count())
            .finish()
    }
}
