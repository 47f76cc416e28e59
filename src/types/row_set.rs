//! Table-valued parameter shapes and row sets

use std::sync::Arc;

use crate::error::{ProcedureError, Result};

use super::{NativeType, SqlDbType, Value};

/// One column of a user-defined table type
#[derive(Debug, Clone, PartialEq)]
pub struct TableTypeColumn {
    /// Column name as declared (upper underscore case)
    pub name: String,
    /// SQL Server data type name
    pub data_type: String,
    pub sql_db_type: SqlDbType,
    pub native_type: NativeType,
    pub is_nullable: bool,
    /// Maximum character length; negative or absent means unlimited
    pub max_length: Option<i32>,
}

impl TableTypeColumn {
    pub fn new(
        name: impl Into<String>,
        data_type: &str,
        is_nullable: bool,
        max_length: Option<i32>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            data_type: data_type.to_string(),
            sql_db_type: super::sql_db_type(data_type)?,
            native_type: super::native_type(data_type)?,
            is_nullable,
            max_length,
        })
    }

    fn length_limit(&self) -> Option<usize> {
        self.max_length
            .filter(|max| *max >= 0)
            .map(|max| max as usize)
    }
}

/// Row shape of a user-defined table type, e.g. `[dbo].[ORDER_ITEM_TYPE]`
#[derive(Debug, Clone, PartialEq)]
pub struct TableType {
    pub name: String,
    pub columns: Vec<TableTypeColumn>,
}

impl TableType {
    pub fn new(name: impl Into<String>, columns: Vec<TableTypeColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Case-insensitive column lookup
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(name))
    }
}

/// Value of a table-valued parameter: a table type plus ordered rows
#[derive(Debug, Clone, PartialEq)]
pub struct RowSet {
    table_type: Arc<TableType>,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(table_type: Arc<TableType>) -> Self {
        Self {
            table_type,
            rows: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.table_type.name
    }

    pub fn table_type(&self) -> &Arc<TableType> {
        &self.table_type
    }

    pub fn columns(&self) -> &[TableTypeColumn] {
        &self.table_type.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Starts a row with every cell null
    pub fn new_row(&self) -> DataRow {
        DataRow {
            table_type: Arc::clone(&self.table_type),
            values: vec![Value::Null; self.table_type.columns.len()],
        }
    }

    /// Appends a completed row after checking non-nullable columns
    pub fn add_row(&mut self, row: DataRow) -> Result<()> {
        for (column, value) in self.table_type.columns.iter().zip(&row.values) {
            if value.is_null() && !column.is_nullable {
                return Err(ProcedureError::NullConstraintViolation {
                    name: cell_name(&self.table_type, column),
                });
            }
        }
        self.rows.push(row.values);
        Ok(())
    }

    /// Cell value by row index and case-insensitive column name
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let ordinal = self.table_type.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(ordinal))
    }

    /// Rows as an array of objects keyed by column name
    pub fn to_json(&self) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .map(|cells| {
                let object = self
                    .table_type
                    .columns
                    .iter()
                    .zip(cells)
                    .map(|(column, value)| (column.name.clone(), value.to_json()))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

/// A row under construction
#[derive(Debug, Clone)]
pub struct DataRow {
    table_type: Arc<TableType>,
    values: Vec<Value>,
}

impl DataRow {
    /// Sets a cell by column name, coercing the value to the column type.
    ///
    /// Text longer than the column's maximum length is rejected.
    pub fn set(&mut self, column_name: &str, value: Value) -> Result<()> {
        let ordinal = self.table_type.column_index(column_name).ok_or_else(|| {
            ProcedureError::UnknownColumn {
                table_type: self.table_type.name.clone(),
                column: column_name.to_string(),
            }
        })?;
        let column = &self.table_type.columns[ordinal];

        let coerced =
            value
                .coerce_to(column.native_type)
                .ok_or_else(|| ProcedureError::TypeMismatch {
                    name: cell_name(&self.table_type, column),
                    expected: column.native_type.to_string(),
                    found: value.type_label().to_string(),
                })?;

        if let (Some(limit), Some(actual)) = (column.length_limit(), coerced.measured_length()) {
            if actual > limit {
                return Err(ProcedureError::LengthViolation {
                    name: cell_name(&self.table_type, column),
                    max_length: limit,
                    actual,
                });
            }
        }

        self.values[ordinal] = coerced;
        Ok(())
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

fn cell_name(table_type: &TableType, column: &TableTypeColumn) -> String {
    format!("{}.{}", table_type.name, column.name)
}
