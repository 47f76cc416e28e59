//! A single stored procedure parameter: identity, constraints and bound value

use regex::Regex;

use crate::error::{ProcedureError, RangeBound, Result};
use crate::types::{Direction, FromValue, NativeType, SqlDbType, Value};

/// A stored procedure parameter with its validation constraints.
///
/// Templates hold definitions without values; every instance works on its own
/// copy obtained through [`ParameterDefinition::clone_unset`].
#[derive(Debug, Clone)]
pub struct ParameterDefinition {
    name: String,
    direction: Direction,
    data_type: String,
    sql_db_type: SqlDbType,
    native_type: NativeType,
    is_nullable: bool,
    max_length: Option<i32>,
    precision: Option<u8>,
    scale: Option<u8>,
    date_time_precision: Option<u8>,
    minimum: Option<i64>,
    maximum: Option<i64>,
    pattern: Option<Regex>,
    structured_type_name: Option<String>,
    value: Option<Value>,
}

impl ParameterDefinition {
    /// Creates a nullable, unconstrained parameter of the given SQL data type
    pub fn new(name: impl Into<String>, direction: Direction, data_type: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            direction,
            data_type: data_type.to_string(),
            sql_db_type: crate::types::sql_db_type(data_type)?,
            native_type: crate::types::native_type(data_type)?,
            is_nullable: true,
            max_length: None,
            precision: None,
            scale: None,
            date_time_precision: None,
            minimum: None,
            maximum: None,
            pattern: None,
            structured_type_name: None,
            value: None,
        })
    }

    pub fn with_nullable(mut self, is_nullable: bool) -> Self {
        self.is_nullable = is_nullable;
        self
    }

    pub fn with_max_length(mut self, max_length: Option<i32>) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_precision(mut self, precision: Option<u8>, scale: Option<u8>) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    pub fn with_date_time_precision(mut self, precision: Option<u8>) -> Self {
        self.date_time_precision = precision;
        self
    }

    pub fn with_range(mut self, minimum: Option<i64>, maximum: Option<i64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    /// Compiles the validation pattern; an empty pattern means none
    pub fn with_pattern(mut self, pattern: Option<&str>) -> Result<Self> {
        self.pattern = match pattern.filter(|p| !p.is_empty()) {
            Some(p) => Some(Regex::new(p).map_err(|source| ProcedureError::InvalidPattern {
                name: self.name.clone(),
                source,
            })?),
            None => None,
        };
        Ok(self)
    }

    pub fn with_structured_type(mut self, type_name: Option<String>) -> Self {
        self.structured_type_name = type_name;
        self
    }

    /// Copy of this definition with the value reset
    pub fn clone_unset(&self) -> Self {
        Self {
            value: None,
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn sql_db_type(&self) -> SqlDbType {
        self.sql_db_type
    }

    pub fn native_type(&self) -> NativeType {
        self.native_type
    }

    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    pub fn max_length(&self) -> Option<i32> {
        self.max_length
    }

    pub fn precision(&self) -> Option<u8> {
        self.precision
    }

    pub fn scale(&self) -> Option<u8> {
        self.scale
    }

    pub fn date_time_precision(&self) -> Option<u8> {
        self.date_time_precision
    }

    pub fn minimum(&self) -> Option<i64> {
        self.minimum
    }

    pub fn maximum(&self) -> Option<i64> {
        self.maximum
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }

    /// Qualified user-defined table type name, for table-valued parameters
    pub fn structured_type_name(&self) -> Option<&str> {
        self.structured_type_name.as_deref()
    }

    /// The bound value; `None` while unset
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Assigns a value whose type must match the parameter type exactly
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<()> {
        self.assign(value.into(), true)
    }

    /// Assigns a dynamically typed value, converting it where possible
    pub fn set_untyped(&mut self, value: impl Into<Value>) -> Result<()> {
        self.assign(value.into(), false)
    }

    /// Reads the value as `T`; unset and null values read as `T::default()`
    pub fn get<T: FromValue + Default>(&self) -> Result<T> {
        match &self.value {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => value.to::<T>().ok_or_else(|| ProcedureError::TypeMismatch {
                name: self.name.clone(),
                expected: std::any::type_name::<T>().to_string(),
                found: value.type_label().to_string(),
            }),
        }
    }

    /// Pre-execution check: non-nullable inputs must hold a non-null value
    pub fn validate_for_execution(&self) -> Result<()> {
        let missing = matches!(self.value, None | Some(Value::Null));
        if self.direction.accepts_input() && !self.is_nullable && missing {
            return Err(ProcedureError::NullConstraintViolation {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    fn assign(&mut self, value: Value, exact: bool) -> Result<()> {
        if !self.direction.accepts_input() {
            return Err(ProcedureError::ReadOnlyParameter {
                name: self.name.clone(),
                direction: self.direction.to_string(),
            });
        }
        let accepted = self.validate(value, exact)?;
        self.value = Some(accepted);
        Ok(())
    }

    /// Runs the validation pipeline and returns the value to store.
    ///
    /// Order: null, type, pattern, length, range.
    fn validate(&self, value: Value, exact: bool) -> Result<Value> {
        if value.is_null() {
            if self.is_nullable {
                return Ok(Value::Null);
            }
            return Err(ProcedureError::NullConstraintViolation {
                name: self.name.clone(),
            });
        }

        let value = if exact {
            if !value.matches(self.native_type) {
                return Err(self.type_mismatch(&value));
            }
            value
        } else {
            value
                .coerce_to(self.native_type)
                .ok_or_else(|| self.type_mismatch(&value))?
        };

        if let (Value::Table(rows), Some(expected)) = (&value, &self.structured_type_name) {
            if !rows.type_name().eq_ignore_ascii_case(expected) {
                return Err(ProcedureError::TypeMismatch {
                    name: self.name.clone(),
                    expected: expected.clone(),
                    found: rows.type_name().to_string(),
                });
            }
        }

        if let Some(pattern) = &self.pattern {
            if let Some(text) = value.text() {
                if !pattern.is_match(&text) {
                    return Err(ProcedureError::PatternViolation {
                        name: self.name.clone(),
                        pattern: pattern.as_str().to_string(),
                    });
                }
            }
        }

        if let Some(limit) = self.length_limit() {
            if let Some(actual) = value.measured_length() {
                if actual > limit {
                    return Err(ProcedureError::LengthViolation {
                        name: self.name.clone(),
                        max_length: limit,
                        actual,
                    });
                }
            }
        }

        if self.minimum.is_some() || self.maximum.is_some() {
            let numeric = value.to_i64().ok_or_else(|| ProcedureError::TypeMismatch {
                name: self.name.clone(),
                expected: NativeType::Int64.to_string(),
                found: value.type_label().to_string(),
            })?;
            if let Some(minimum) = self.minimum.filter(|min| numeric < *min) {
                return Err(ProcedureError::RangeViolation {
                    name: self.name.clone(),
                    value: numeric,
                    limit: minimum,
                    bound: RangeBound::Minimum,
                });
            }
            if let Some(maximum) = self.maximum.filter(|max| numeric > *max) {
                return Err(ProcedureError::RangeViolation {
                    name: self.name.clone(),
                    value: numeric,
                    limit: maximum,
                    bound: RangeBound::Maximum,
                });
            }
        }

        Ok(value)
    }

    /// Converts a value reported back by the executor.
    ///
    /// Returns `None` for null outputs, which leave the parameter untouched.
    /// Input/output parameters go through the full validation pipeline.
    pub(crate) fn prepare_output(&self, value: Value) -> Result<Option<Value>> {
        if value.is_null() {
            return Ok(None);
        }
        match self.direction {
            Direction::InputOutput => self.validate(value, false).map(Some),
            _ => value
                .coerce_to(self.native_type)
                .map(Some)
                .ok_or_else(|| self.type_mismatch(&value)),
        }
    }

    pub(crate) fn store_output(&mut self, value: Value) {
        self.value = Some(value);
    }

    fn length_limit(&self) -> Option<usize> {
        self.max_length
            .filter(|max| *max >= 0)
            .map(|max| max as usize)
    }

    fn type_mismatch(&self, value: &Value) -> ProcedureError {
        ProcedureError::TypeMismatch {
            name: self.name.clone(),
            expected: self.native_type.to_string(),
            found: value.type_label().to_string(),
        }
    }
}
