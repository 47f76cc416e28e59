//! Boundary to the component that actually runs commands against SQL Server

use std::fmt;

use crate::config::ConnectionTarget;
use crate::error::{ExecutorError, ProcedureError, Result};
use crate::types::{Direction, SqlDbType, Value};

/// How the executor should run a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Read the rows the procedure returns
    Reader,
    /// Run the procedure without reading rows
    NonQuery,
}

/// A parameter as handed to the executor
#[derive(Debug, Clone)]
pub struct CommandParameter<'a> {
    pub name: &'a str,
    pub direction: Direction,
    pub sql_db_type: SqlDbType,
    pub size: Option<i32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    /// Table type name for structured parameters
    pub type_name: Option<&'a str>,
    /// `None` when unset
    pub value: Option<&'a Value>,
}

/// A stored procedure call ready to be issued
#[derive(Debug, Clone)]
pub struct Command<'a> {
    pub procedure_name: &'a str,
    pub connection: &'a ConnectionTarget,
    pub kind: CommandKind,
    pub parameters: Vec<CommandParameter<'a>>,
}

impl Command<'_> {
    pub fn parameter(&self, name: &str) -> Option<&CommandParameter<'_>> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// What a command produced
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Rows(ResultSet),
    Scalar(Value),
    Void,
}

/// Command result plus the post-execution value of each non-input parameter
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub result: CommandResult,
    pub output_values: Vec<(String, Value)>,
}

impl CommandOutcome {
    pub fn rows(rows: ResultSet) -> Self {
        Self {
            result: CommandResult::Rows(rows),
            output_values: Vec::new(),
        }
    }

    pub fn scalar(value: impl Into<Value>) -> Self {
        Self {
            result: CommandResult::Scalar(value.into()),
            output_values: Vec::new(),
        }
    }

    pub fn void() -> Self {
        Self {
            result: CommandResult::Void,
            output_values: Vec::new(),
        }
    }

    pub fn with_output(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.output_values.push((name.into(), value.into()));
        self
    }
}

/// Runs commands against the database.
///
/// Implementations own connections and the wire protocol; the engine only
/// prepares the command and interprets the outcome.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, command: &Command<'_>) -> std::result::Result<CommandOutcome, ExecutorError>;
}

/// Tabular result: named columns and rows of values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row; missing trailing cells are null and extra cells dropped
    pub fn push_row(&mut self, mut values: Vec<Value>) {
        values.resize(self.columns.len(), Value::Null);
        self.rows.push(values);
    }

    pub fn with_row(mut self, values: Vec<Value>) -> Self {
        self.push_row(values);
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<Row<'_>> {
        self.rows.get(idx).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// Case-insensitive column lookup
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
    }

    /// Builds a result set from a JSON array of objects.
    ///
    /// Columns are the union of all object keys in first-seen order. A single
    /// object is treated as one row and blank text as no rows.
    pub fn from_json(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let document: serde_json::Value = serde_json::from_str(text)?;
        let objects = match document {
            serde_json::Value::Array(items) => items,
            object @ serde_json::Value::Object(_) => vec![object],
            other => {
                return Err(ProcedureError::InvalidJson {
                    message: format!("expected an array of objects, found {}", other),
                })
            }
        };

        let mut result = Self::default();
        let mut rows = Vec::with_capacity(objects.len());
        for item in objects {
            let serde_json::Value::Object(fields) = item else {
                return Err(ProcedureError::InvalidJson {
                    message: "result rows must be objects".to_string(),
                });
            };
            for key in fields.keys() {
                if !result.columns.iter().any(|c| c == key) {
                    result.columns.push(key.clone());
                }
            }
            rows.push(fields);
        }

        for fields in rows {
            let values = result
                .columns
                .iter()
                .map(|column| fields.get(column).map(Value::from_json).unwrap_or(Value::Null))
                .collect();
            result.rows.push(values);
        }
        Ok(result)
    }

    /// Rows as a JSON array of objects keyed by column name
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.iter().map(|row| row.to_json()).collect())
    }
}

/// Borrowed view of one result row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, ordinal: usize) -> Option<&'a Value> {
        self.values.get(ordinal)
    }

    /// Cell by case-insensitive column name
    pub fn get_by_name(&self, name: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
            .and_then(|ordinal| self.values.get(ordinal))
    }

    /// True for null or missing cells
    pub fn is_null(&self, ordinal: usize) -> bool {
        self.values.get(ordinal).map_or(true, Value::is_null)
    }

    pub fn column_name(&self, ordinal: usize) -> Option<&'a str> {
        self.columns.get(ordinal).map(String::as_str)
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    fn to_json(self) -> serde_json::Value {
        let object = self
            .columns
            .iter()
            .zip(self.values)
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(object)
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.columns.join("\t"))?;
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
            writeln!(f, "{}", cells.join("\t"))?;
        }
        Ok(())
    }
}
