//! Turns tabular results into typed records

use log::trace;

use crate::error::{ProcedureError, Result};
use crate::naming::to_proper_case;
use crate::procedure::ResultSet;

use super::mapping::{ColumnPropertyMapping, MappingCache};
use super::record::Record;

/// Materializes the rows of `procedure`'s result into `T`.
///
/// Types that claim the procedure through [`Record::supports_map`] map each
/// row themselves. Otherwise columns are matched to fields by converting the
/// column name to PascalCase; the mapping is computed from the first result
/// seen for `(procedure, T)` and reused for every later result.
pub fn materialize<T: Record>(
    procedure: &str,
    result: &ResultSet,
    cache: &MappingCache<ColumnPropertyMapping>,
) -> Result<Vec<T>> {
    if T::supports_map(procedure) {
        return result
            .iter()
            .map(|row| {
                let mut item = T::default();
                item.map_row(procedure, &row)?;
                Ok(item)
            })
            .collect();
    }

    let mapping = cache.get_or_build::<T>(procedure, || column_mapping::<T>(result.columns()));
    let fields = T::fields();

    let mut items = Vec::with_capacity(result.len());
    for row in result.iter() {
        let mut item = T::default();
        for entry in mapping.iter() {
            let Some(value) = row.get(entry.ordinal).filter(|v| !v.is_null()) else {
                continue;
            };
            let field = &fields[entry.field_index];
            (field.set)(&mut item, value).ok_or_else(|| ProcedureError::TypeMismatch {
                name: row
                    .column_name(entry.ordinal)
                    .unwrap_or(field.name)
                    .to_string(),
                expected: field.native_type.to_string(),
                found: value.type_label().to_string(),
            })?;
        }
        items.push(item);
    }
    Ok(items)
}

/// Column ordinal to field index pairs for the columns that name a field
pub fn column_mapping<T: Record>(columns: &[String]) -> Vec<ColumnPropertyMapping> {
    columns
        .iter()
        .enumerate()
        .filter_map(|(ordinal, column)| {
            let property = to_proper_case(column);
            match T::field(&property) {
                Some((field_index, _)) => Some(ColumnPropertyMapping {
                    ordinal,
                    field_index,
                }),
                None => {
                    trace!("Column {} has no field {}", column, property);
                    None
                }
            }
        })
        .collect()
}
