//! Value and type model shared by parameters, table-valued inputs and results

mod row_set;
mod type_map;
mod value;

pub use row_set::{DataRow, RowSet, TableType, TableTypeColumn};
pub use type_map::{direction, native_type, sql_db_type, Direction, NativeType, SqlDbType};
pub use value::{FromValue, Value};
