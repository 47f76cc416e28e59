//! Connection string configuration (`app.config` style XML)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::error::{ProcedureError, Result};

/// Suffix appended to the connection string of Always Encrypted procedures
pub const COLUMN_ENCRYPTION_SETTING: &str = ";Column Encryption Setting=enabled";

/// Endpoint a procedure executes against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Configuration entry name (the procedure's schema)
    pub name: String,
    pub connection_string: String,
}

/// Named connection strings, keyed by schema name
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    connections: HashMap<String, String>,
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a named connection string
    pub fn with_connection(mut self, name: impl Into<String>, connection_string: impl Into<String>) -> Self {
        self.connections.insert(name.into(), connection_string.into());
        self
    }

    /// Reads `<configuration><connectionStrings><add name=".." connectionString=".."/>`
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ProcedureError::ConfigReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Parses configuration XML held in memory
    pub fn from_xml(content: &str) -> Result<Self> {
        Self::parse(content, Path::new("<inline>"))
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let doc = Document::parse(content).map_err(|e| ProcedureError::ConfigParseError {
            path: PathBuf::from(path),
            source: e,
        })?;

        let mut connections = HashMap::new();
        for section in doc
            .descendants()
            .filter(|n| n.tag_name().name() == "connectionStrings")
        {
            for child in section.children().filter(Node::is_element) {
                match child.tag_name().name() {
                    "add" => {
                        if let (Some(name), Some(connection_string)) =
                            (child.attribute("name"), child.attribute("connectionString"))
                        {
                            connections.insert(name.to_string(), connection_string.to_string());
                        }
                    }
                    "remove" => {
                        if let Some(name) = child.attribute("name") {
                            connections.remove(name);
                        }
                    }
                    "clear" => connections.clear(),
                    _ => {}
                }
            }
        }

        Ok(Self { connections })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.connections.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Execution endpoint for a schema
    pub fn target_for(&self, schema: &str, always_encrypted: bool) -> Result<ConnectionTarget> {
        let base = self
            .get(schema)
            .ok_or_else(|| ProcedureError::MissingConnection {
                name: schema.to_string(),
            })?;

        let connection_string = if always_encrypted {
            format!("{}{}", base, COLUMN_ENCRYPTION_SETTING)
        } else {
            base.to_string()
        };

        Ok(ConnectionTarget {
            name: schema.to_string(),
            connection_string,
        })
    }
}
