//! Error types for rust-sqlproc

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::procedure::InstanceState;

/// Error returned by a [`CommandExecutor`](crate::procedure::CommandExecutor).
pub type ExecutorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which side of a numeric range a value fell outside of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    Minimum,
    Maximum,
}

impl fmt::Display for RangeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeBound::Minimum => write!(f, "minimum"),
            RangeBound::Maximum => write!(f, "maximum"),
        }
    }
}

/// Errors raised while binding, validating, executing or materializing a procedure
#[derive(Error, Debug)]
pub enum ProcedureError {
    #[error("Unknown parameter '{name}' for procedure {procedure}")]
    UnknownParameter { procedure: String, name: String },

    #[error("Non-nullable parameter {name} is null")]
    NullConstraintViolation { name: String },

    #[error("Parameter {name} expects {expected}, the value provided was {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("Value for {name} does not match the pattern {pattern}")]
    PatternViolation { name: String, pattern: String },

    #[error("Value for {name} exceeds the maximum length of {max_length} (was {actual})")]
    LengthViolation {
        name: String,
        max_length: usize,
        actual: usize,
    },

    #[error("Value {value} for {name} violates the {bound} of {limit}")]
    RangeViolation {
        name: String,
        value: i64,
        limit: i64,
        bound: RangeBound,
    },

    #[error("Procedure {procedure} does not support {mode}: {reason}")]
    UnsupportedExecutionMode {
        procedure: String,
        mode: &'static str,
        reason: &'static str,
    },

    #[error("Execution of {procedure} failed")]
    UpstreamExecutionFailure {
        procedure: String,
        #[source]
        source: ExecutorError,
    },

    #[error("Parameter {name} is {direction} and cannot be assigned")]
    ReadOnlyParameter { name: String, direction: String },

    #[error("Procedure instance for {procedure} is {state:?} and cannot be reused")]
    InstanceConsumed {
        procedure: String,
        state: InstanceState,
    },

    #[error("No procedure was found by the name {name}")]
    UnknownProcedure { name: String },

    #[error("No table type was found by the name {name}")]
    UnknownTableType { name: String },

    #[error("Table type {table_type} has no column {column}")]
    UnknownColumn { table_type: String, column: String },

    #[error("Malformed input for {name}: {message}")]
    MalformedInput { name: String, message: String },

    #[error("Invalid JSON document: {message}")]
    InvalidJson { message: String },

    #[error("Unknown SQL data type: {data_type}")]
    UnknownDataType { data_type: String },

    #[error("Unknown parameter mode '{mode}' for {name}")]
    UnknownParameterMode { name: String, mode: String },

    #[error("Invalid metadata for {procedure}: {message}")]
    InvalidMetadata { procedure: String, message: String },

    #[error("Invalid validation pattern for {name}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("No connection string configured for {name}")]
    MissingConnection { name: String },

    #[error("Failed to read configuration file: {path}")]
    ConfigReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file: {path}")]
    ConfigParseError {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },
}

impl ProcedureError {
    /// True for the constraint rejections raised by the validation pipeline
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ProcedureError::NullConstraintViolation { .. }
                | ProcedureError::TypeMismatch { .. }
                | ProcedureError::PatternViolation { .. }
                | ProcedureError::LengthViolation { .. }
                | ProcedureError::RangeViolation { .. }
        )
    }
}

impl From<serde_json::Error> for ProcedureError {
    fn from(err: serde_json::Error) -> Self {
        ProcedureError::InvalidJson {
            message: err.to_string(),
        }
    }
}

pub type Result<T, E = ProcedureError> = std::result::Result<T, E>;
