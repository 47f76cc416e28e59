//! Static mapping between SQL Server data type names, driver types and
//! engine-native value types.

use std::fmt;

use crate::error::{ProcedureError, Result};

/// SQL Server driver type of a parameter or column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDbType {
    BigInt,
    Binary,
    Bit,
    Char,
    Date,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Decimal,
    Float,
    Image,
    Int,
    Money,
    NChar,
    NText,
    NVarChar,
    Real,
    SmallDateTime,
    SmallInt,
    SmallMoney,
    Structured,
    Text,
    Time,
    Timestamp,
    TinyInt,
    Udt,
    UniqueIdentifier,
    VarBinary,
    VarChar,
    Variant,
    Xml,
}

/// Engine-native value type a parameter or column carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    Int64,
    Int32,
    Int16,
    Byte,
    Bool,
    String,
    DateTime,
    DateTimeOffset,
    Decimal,
    Float,
    Binary,
    Guid,
    Table,
    Object,
    Xml,
}

/// Parameter direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl Direction {
    /// Whether callers may assign a value to a parameter with this direction
    pub fn accepts_input(&self) -> bool {
        matches!(self, Direction::Input | Direction::InputOutput)
    }

    /// Whether the execution collaborator reports a value back for this direction
    pub fn returns_value(&self) -> bool {
        !matches!(self, Direction::Input)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Input => "Input",
            Direction::Output => "Output",
            Direction::InputOutput => "InputOutput",
            Direction::ReturnValue => "ReturnValue",
        };
        f.write_str(name)
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Lowercase SQL Server type name -> (driver type, native type)
static DATA_TYPES: &[(&str, SqlDbType, NativeType)] = &[
    ("bigint", SqlDbType::BigInt, NativeType::Int64),
    ("binary", SqlDbType::Binary, NativeType::Binary),
    ("bit", SqlDbType::Bit, NativeType::Bool),
    ("char", SqlDbType::Char, NativeType::String),
    ("date", SqlDbType::Date, NativeType::DateTime),
    ("datetime", SqlDbType::DateTime, NativeType::DateTime),
    ("datetime2", SqlDbType::DateTime2, NativeType::DateTime),
    ("datetimeoffset", SqlDbType::DateTimeOffset, NativeType::DateTimeOffset),
    ("decimal", SqlDbType::Decimal, NativeType::Decimal),
    ("float", SqlDbType::Float, NativeType::Float),
    ("image", SqlDbType::Image, NativeType::Binary),
    ("int", SqlDbType::Int, NativeType::Int32),
    ("money", SqlDbType::Money, NativeType::Decimal),
    ("nchar", SqlDbType::NChar, NativeType::String),
    ("ntext", SqlDbType::NText, NativeType::String),
    ("numeric", SqlDbType::Decimal, NativeType::Decimal),
    ("nvarchar", SqlDbType::NVarChar, NativeType::String),
    ("real", SqlDbType::Real, NativeType::Float),
    ("rowversion", SqlDbType::Timestamp, NativeType::Binary),
    ("smalldatetime", SqlDbType::SmallDateTime, NativeType::DateTime),
    ("smallint", SqlDbType::SmallInt, NativeType::Int16),
    ("smallmoney", SqlDbType::SmallMoney, NativeType::Decimal),
    ("structured", SqlDbType::Structured, NativeType::Table),
    ("table type", SqlDbType::Structured, NativeType::Table),
    ("text", SqlDbType::Text, NativeType::String),
    ("time", SqlDbType::Time, NativeType::DateTime),
    ("timestamp", SqlDbType::Timestamp, NativeType::Binary),
    ("tinyint", SqlDbType::TinyInt, NativeType::Byte),
    ("udt", SqlDbType::Udt, NativeType::Object),
    ("uniqueidentifier", SqlDbType::UniqueIdentifier, NativeType::Guid),
    ("varbinary", SqlDbType::VarBinary, NativeType::Binary),
    ("varchar", SqlDbType::VarChar, NativeType::String),
    ("variant", SqlDbType::Variant, NativeType::Object),
    ("sql_variant", SqlDbType::Variant, NativeType::Object),
    ("xml", SqlDbType::Xml, NativeType::Xml),
];

fn lookup(data_type: &str) -> Result<&'static (&'static str, SqlDbType, NativeType)> {
    let wanted = data_type.trim();
    DATA_TYPES
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| ProcedureError::UnknownDataType {
            data_type: data_type.to_string(),
        })
}

/// Driver type for a SQL Server data type name (case-insensitive)
pub fn sql_db_type(data_type: &str) -> Result<SqlDbType> {
    lookup(data_type).map(|(_, sql_db_type, _)| *sql_db_type)
}

/// Native value type for a SQL Server data type name (case-insensitive)
pub fn native_type(data_type: &str) -> Result<NativeType> {
    lookup(data_type).map(|(_, _, native)| *native)
}

/// Direction for a catalog parameter mode (`IN`, `INOUT`, `OUT`).
///
/// SQL Server reports `OUTPUT` parameters as `INOUT` and the routine result
/// as `OUT`. An `OUTPUT` parameter also carries the caller's value in, so
/// `INOUT` maps to [`Direction::InputOutput`] and `OUT` to
/// [`Direction::ReturnValue`].
pub fn direction(parameter_name: &str, mode: &str) -> Result<Direction> {
    match mode.trim().to_ascii_lowercase().as_str() {
        "in" => Ok(Direction::Input),
        "inout" => Ok(Direction::InputOutput),
        "out" => Ok(Direction::ReturnValue),
        _ => Err(ProcedureError::UnknownParameterMode {
            name: parameter_name.to_string(),
            mode: mode.to_string(),
        }),
    }
}

impl SqlDbType {
    /// Native value type carried by this driver type
    pub fn native_type(&self) -> NativeType {
        match self {
            SqlDbType::BigInt => NativeType::Int64,
            SqlDbType::Int => NativeType::Int32,
            SqlDbType::SmallInt => NativeType::Int16,
            SqlDbType::TinyInt => NativeType::Byte,
            SqlDbType::Bit => NativeType::Bool,
            SqlDbType::Char
            | SqlDbType::NChar
            | SqlDbType::NText
            | SqlDbType::NVarChar
            | SqlDbType::Text
            | SqlDbType::VarChar => NativeType::String,
            SqlDbType::Date
            | SqlDbType::DateTime
            | SqlDbType::DateTime2
            | SqlDbType::SmallDateTime
            | SqlDbType::Time => NativeType::DateTime,
            SqlDbType::DateTimeOffset => NativeType::DateTimeOffset,
            SqlDbType::Decimal | SqlDbType::Money | SqlDbType::SmallMoney => NativeType::Decimal,
            SqlDbType::Float | SqlDbType::Real => NativeType::Float,
            SqlDbType::Binary | SqlDbType::Image | SqlDbType::Timestamp | SqlDbType::VarBinary => {
                NativeType::Binary
            }
            SqlDbType::UniqueIdentifier => NativeType::Guid,
            SqlDbType::Structured => NativeType::Table,
            SqlDbType::Udt | SqlDbType::Variant => NativeType::Object,
            SqlDbType::Xml => NativeType::Xml,
        }
    }
}

impl NativeType {
    /// SQL Server type name used when a native type is sent without catalog metadata
    pub fn default_type_name(&self) -> &'static str {
        match self {
            NativeType::Int64 => "bigint",
            NativeType::Int32 => "int",
            NativeType::Int16 => "smallint",
            NativeType::Byte => "tinyint",
            NativeType::Bool => "bit",
            NativeType::String => "nvarchar",
            NativeType::DateTime => "datetime2",
            NativeType::DateTimeOffset => "datetimeoffset",
            NativeType::Decimal => "decimal",
            NativeType::Float => "float",
            NativeType::Binary => "varbinary",
            NativeType::Guid => "uniqueidentifier",
            NativeType::Table => "structured",
            NativeType::Object => "sql_variant",
            NativeType::Xml => "xml",
        }
    }

    /// Whether values of this type have a meaningful character length
    pub fn is_textual(&self) -> bool {
        matches!(self, NativeType::String | NativeType::Xml)
    }
}
