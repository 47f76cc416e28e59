//! rust-sqlproc: typed, validated SQL Server stored procedure calls
//!
//! This library turns catalog metadata into procedure templates, binds caller
//! input (query pairs, JSON documents, records) with validation, hands the
//! prepared command to a [`CommandExecutor`] and materializes the results.

pub mod catalog;
pub mod config;
pub mod error;
pub mod materialize;
pub mod metadata;
pub mod naming;
pub mod procedure;
pub mod types;

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

pub use catalog::{Catalog, CatalogSnapshot};
pub use config::{ConnectionConfig, ConnectionTarget};
pub use error::ProcedureError;
pub use materialize::{Field, Record};
pub use metadata::{CatalogMetadata, JsonMetadataSource, MetadataSource};
pub use procedure::{
    CommandExecutor, CommandOutcome, InstanceState, ProcedureInstance, ProcedureTemplate,
    ResultSet,
};
pub use types::{NativeType, Value};

/// Options for loading a catalog from files
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Path to the catalog JSON document
    pub catalog_path: PathBuf,
    /// Path to the `app.config` style connection string file
    pub config_path: PathBuf,
}

/// Load a catalog from a catalog document and a connection configuration
pub fn load_catalog(options: &LoadOptions) -> Result<Catalog> {
    info!("Reading connections from {}", options.config_path.display());
    let connections = ConnectionConfig::from_file(&options.config_path)?;
    info!("Found {} connection strings", connections.len());

    let source = JsonMetadataSource::from_file(&options.catalog_path);
    Catalog::new(source, connections)
        .with_context(|| format!("Failed to load catalog {}", options.catalog_path.display()))
}
