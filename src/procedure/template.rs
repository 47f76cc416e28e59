//! Immutable procedure templates built once from catalog metadata

use std::collections::HashMap;

use crate::config::{ConnectionConfig, ConnectionTarget};
use crate::error::{ProcedureError, Result};
use crate::metadata::{ParameterMetadata, ProcedureMetadata};
use crate::naming::qualified_name;
use crate::types::{self, Direction};

use super::parameter::ParameterDefinition;
use super::resolver::NameResolver;

/// Canonical name of the routine result parameter
pub const RETURN_VALUE: &str = "@RETURN_VALUE";

/// Canonical name of the conventional message output parameter
pub const MESSAGE_RESULT: &str = "@MESSAGE_RESULT";

/// Execution-mode annotations of a procedure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcedureFlags {
    /// The procedure streams a JSON document in the first column of its rows
    pub returns_json: bool,
    /// The procedure returns at most one object
    pub single_result: bool,
    /// The procedure returns no rows
    pub non_query: bool,
    /// The procedure touches Always Encrypted columns
    pub always_encrypted: bool,
}

/// A procedure's parameters, alias table, flags and execution target
#[derive(Debug)]
pub struct ProcedureTemplate {
    name: String,
    schema: String,
    specific_name: String,
    routine_type: String,
    flags: ProcedureFlags,
    parameters: Vec<ParameterDefinition>,
    positions: HashMap<String, usize>,
    resolver: NameResolver,
    connection: ConnectionTarget,
}

impl ProcedureTemplate {
    /// Assembles a template, adding `@RETURN_VALUE` at position 0 when a
    /// stored procedure declares no return value parameter. Functions report
    /// their own result through the catalog and get none synthesized.
    pub fn new(
        schema: &str,
        specific_name: &str,
        routine_type: &str,
        flags: ProcedureFlags,
        mut parameters: Vec<ParameterDefinition>,
        connection: ConnectionTarget,
    ) -> Result<Self> {
        let name = qualified_name(schema, specific_name);

        let return_values = parameters
            .iter()
            .filter(|p| p.direction() == Direction::ReturnValue)
            .count();
        let is_function = routine_type.trim().eq_ignore_ascii_case("FUNCTION");
        match return_values {
            0 if is_function => {}
            0 => parameters.insert(
                0,
                ParameterDefinition::new(RETURN_VALUE, Direction::ReturnValue, "int")?,
            ),
            1 => {}
            n => {
                return Err(ProcedureError::InvalidMetadata {
                    procedure: name,
                    message: format!("{} return value parameters declared", n),
                })
            }
        }

        let mut resolver = NameResolver::new(name.clone());
        let mut positions = HashMap::with_capacity(parameters.len());
        for (idx, parameter) in parameters.iter().enumerate() {
            if positions.insert(parameter.name().to_string(), idx).is_some() {
                return Err(ProcedureError::InvalidMetadata {
                    procedure: name,
                    message: format!("parameter {} declared twice", parameter.name()),
                });
            }
            resolver.insert(parameter.name())?;
        }

        Ok(Self {
            name,
            schema: schema.to_string(),
            specific_name: specific_name.to_string(),
            routine_type: routine_type.to_string(),
            flags,
            parameters,
            positions,
            resolver,
            connection,
        })
    }

    /// Builds a template from its catalog description
    pub fn from_metadata(metadata: &ProcedureMetadata, connections: &ConnectionConfig) -> Result<Self> {
        let connection =
            connections.target_for(&metadata.specific_schema, metadata.is_always_encrypted)?;

        let mut described: Vec<&ParameterMetadata> = metadata.parameters.iter().collect();
        described.sort_by_key(|p| p.ordinal_position);

        let parameters = described
            .into_iter()
            .map(build_parameter)
            .collect::<Result<Vec<_>>>()?;

        let flags = ProcedureFlags {
            returns_json: metadata.is_json_result,
            single_result: metadata.is_single_result,
            non_query: metadata.is_non_query,
            always_encrypted: metadata.is_always_encrypted,
        };

        Self::new(
            &metadata.specific_schema,
            &metadata.specific_name,
            &metadata.routine_type,
            flags,
            parameters,
            connection,
        )
    }

    /// `[schema].[NAME]`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn specific_name(&self) -> &str {
        &self.specific_name
    }

    pub fn routine_type(&self) -> &str {
        &self.routine_type
    }

    pub fn flags(&self) -> ProcedureFlags {
        self.flags
    }

    pub fn parameters(&self) -> &[ParameterDefinition] {
        &self.parameters
    }

    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }

    pub fn connection(&self) -> &ConnectionTarget {
        &self.connection
    }

    /// Position of a parameter by any accepted spelling
    pub fn position(&self, alias: &str) -> Result<usize> {
        let canonical = self.resolver.resolve(alias)?;
        self.positions
            .get(canonical)
            .copied()
            .ok_or_else(|| ProcedureError::UnknownParameter {
                procedure: self.name.clone(),
                name: alias.to_string(),
            })
    }

    pub fn parameter(&self, alias: &str) -> Result<&ParameterDefinition> {
        self.position(alias).map(|idx| &self.parameters[idx])
    }

    pub fn contains_parameter(&self, alias: &str) -> bool {
        self.resolver.contains(alias)
    }

    /// Fresh, unset copies of every parameter for a new instance
    pub fn new_parameters(&self) -> Vec<ParameterDefinition> {
        self.parameters.iter().map(ParameterDefinition::clone_unset).collect()
    }
}

fn build_parameter(metadata: &ParameterMetadata) -> Result<ParameterDefinition> {
    let direction = if metadata.is_result() {
        Direction::ReturnValue
    } else {
        types::direction(&metadata.parameter_name, &metadata.parameter_mode)?
    };

    let name = if metadata.parameter_name.is_empty() && direction == Direction::ReturnValue {
        RETURN_VALUE.to_string()
    } else {
        metadata.parameter_name.clone()
    };

    let scale = metadata
        .numeric_scale
        .and_then(|scale| u8::try_from(scale).ok());
    let date_time_precision = metadata
        .date_time_precision
        .and_then(|precision| u8::try_from(precision).ok());

    ParameterDefinition::new(name, direction, &metadata.data_type)?
        .with_nullable(metadata.is_nullable)
        .with_max_length(metadata.character_maximum_length)
        .with_precision(metadata.numeric_precision, scale)
        .with_date_time_precision(date_time_precision)
        .with_range(metadata.numeric_minimum_value, metadata.numeric_maximum_value)
        .with_structured_type(metadata.user_defined_type())
        .with_pattern(metadata.regular_expression.as_deref())
}
