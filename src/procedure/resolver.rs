//! Alias table mapping every accepted spelling of a parameter to its canonical name

use std::collections::HashMap;

use crate::error::{ProcedureError, Result};
use crate::naming::{bare_parameter_name, to_camel, to_proper_case};

/// Resolves `@FIRST_NAME`, `FIRST_NAME`, `firstName` and `FirstName` to
/// `@FIRST_NAME`. Lookups are case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct NameResolver {
    procedure: String,
    aliases: HashMap<String, String>,
}

impl NameResolver {
    pub fn new(procedure: impl Into<String>) -> Self {
        Self {
            procedure: procedure.into(),
            aliases: HashMap::new(),
        }
    }

    /// Registers the four spellings of a canonical name.
    ///
    /// Registering the same canonical name twice is a no-op; an alias already
    /// claimed by a different canonical name is a metadata error.
    pub fn insert(&mut self, canonical: &str) -> Result<()> {
        for alias in Self::spellings(canonical) {
            match self.aliases.get(&alias) {
                Some(existing) if existing != canonical => {
                    return Err(ProcedureError::InvalidMetadata {
                        procedure: self.procedure.clone(),
                        message: format!(
                            "alias '{}' is shared by {} and {}",
                            alias, existing, canonical
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    self.aliases.insert(alias, canonical.to_string());
                }
            }
        }
        Ok(())
    }

    /// Canonical name for an alias
    pub fn resolve(&self, alias: &str) -> Result<&str> {
        self.aliases
            .get(alias)
            .map(String::as_str)
            .ok_or_else(|| ProcedureError::UnknownParameter {
                procedure: self.procedure.clone(),
                name: alias.to_string(),
            })
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.aliases.contains_key(alias)
    }

    /// The distinct spellings accepted for a canonical name
    pub fn spellings(canonical: &str) -> Vec<String> {
        let bare = bare_parameter_name(canonical);
        let mut spellings = vec![
            canonical.to_string(),
            bare.to_string(),
            to_camel(bare),
            to_proper_case(bare),
        ];
        spellings.dedup();
        spellings
    }
}
