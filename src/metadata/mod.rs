//! Catalog metadata documents and the sources that load them
//!
//! The catalog document is the JSON produced by the database catalog
//! procedure: every procedure with its parameters, plus the row shapes of
//! every user-defined table type.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::naming::qualified_name;

/// Complete catalog document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMetadata {
    #[serde(default)]
    pub procedures: Vec<ProcedureMetadata>,
    #[serde(default)]
    pub table_types: Vec<TableTypeMetadata>,
}

/// One routine as described by the catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureMetadata {
    pub specific_schema: String,
    pub specific_name: String,
    #[serde(default = "default_routine_type")]
    pub routine_type: String,
    #[serde(default)]
    pub is_json_result: bool,
    #[serde(default)]
    pub is_single_result: bool,
    #[serde(default)]
    pub is_always_encrypted: bool,
    #[serde(default)]
    pub is_non_query: bool,
    #[serde(default)]
    pub parameters: Vec<ParameterMetadata>,
}

impl ProcedureMetadata {
    /// `[schema].[NAME]`
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.specific_schema, &self.specific_name)
    }
}

fn default_routine_type() -> String {
    "PROCEDURE".to_string()
}

fn default_nullable() -> bool {
    true
}

/// One routine parameter as described by the catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterMetadata {
    #[serde(default)]
    pub ordinal_position: i32,
    pub parameter_mode: String,
    /// `YES` for the routine result
    #[serde(default)]
    pub is_result: Option<String>,
    pub parameter_name: String,
    pub data_type: String,
    #[serde(default)]
    pub numeric_precision: Option<u8>,
    #[serde(default)]
    pub numeric_scale: Option<i32>,
    #[serde(default)]
    pub character_maximum_length: Option<i32>,
    #[serde(default)]
    pub date_time_precision: Option<i16>,
    #[serde(default)]
    pub numeric_minimum_value: Option<i64>,
    #[serde(default)]
    pub numeric_maximum_value: Option<i64>,
    #[serde(default)]
    pub regular_expression: Option<String>,
    #[serde(default = "default_nullable")]
    pub is_nullable: bool,
    #[serde(default)]
    pub user_defined_type_schema: Option<String>,
    #[serde(default)]
    pub user_defined_type_name: Option<String>,
}

impl ParameterMetadata {
    pub fn is_result(&self) -> bool {
        self.is_result
            .as_deref()
            .is_some_and(|flag| flag.eq_ignore_ascii_case("YES"))
    }

    /// `[schema].[TYPE]` for parameters of a user-defined type
    pub fn user_defined_type(&self) -> Option<String> {
        match (&self.user_defined_type_schema, &self.user_defined_type_name) {
            (Some(schema), Some(name)) => Some(qualified_name(schema, name)),
            _ => None,
        }
    }
}

/// A user-defined table type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableTypeMetadata {
    pub specific_schema: String,
    pub specific_name: String,
    #[serde(default)]
    pub columns: Vec<TableColumnMetadata>,
}

impl TableTypeMetadata {
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.specific_schema, &self.specific_name)
    }
}

/// One column of a user-defined table type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumnMetadata {
    pub column_name: String,
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub is_nullable: bool,
    #[serde(default)]
    pub character_maximum_length: Option<i32>,
}

/// Anything that can produce the catalog document
pub trait MetadataSource: Send + Sync {
    fn load(&self) -> Result<CatalogMetadata>;
}

/// Catalog document read from a JSON file or held in memory
#[derive(Debug, Clone)]
pub enum JsonMetadataSource {
    File(PathBuf),
    Text(String),
}

impl JsonMetadataSource {
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        JsonMetadataSource::File(path.as_ref().to_path_buf())
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        JsonMetadataSource::Text(text.into())
    }
}

impl MetadataSource for JsonMetadataSource {
    fn load(&self) -> Result<CatalogMetadata> {
        match self {
            JsonMetadataSource::File(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse catalog file: {}", path.display()))
            }
            JsonMetadataSource::Text(text) => {
                serde_json::from_str(text).context("Failed to parse catalog document")
            }
        }
    }
}

/// Fixed in-memory catalog
impl MetadataSource for CatalogMetadata {
    fn load(&self) -> Result<CatalogMetadata> {
        Ok(self.clone())
    }
}
