//! Target types describe their fields through a registered field list

use std::fmt;

use crate::error::Result;
use crate::procedure::Row;
use crate::types::{NativeType, Value};

/// One settable, readable field of a [`Record`]
pub struct Field<T> {
    /// PascalCase field name, e.g. `FirstName`
    pub name: &'static str,
    pub native_type: NativeType,
    pub get: fn(&T) -> Value,
    /// Returns `None` when the value cannot be converted to the field type
    pub set: fn(&mut T, &Value) -> Option<()>,
}

impl<T> Field<T> {
    pub const fn new(
        name: &'static str,
        native_type: NativeType,
        get: fn(&T) -> Value,
        set: fn(&mut T, &Value) -> Option<()>,
    ) -> Self {
        Self {
            name,
            native_type,
            get,
            set,
        }
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("native_type", &self.native_type)
            .finish()
    }
}

/// A type that procedure results can be materialized into and procedure
/// parameters can be bound from.
///
/// # Example
///
/// ```
/// use once_cell::sync::Lazy;
/// use rust_sqlproc::materialize::{Field, Record};
/// use rust_sqlproc::types::{NativeType, Value};
///
/// #[derive(Default)]
/// struct Person {
///     person_id: i32,
///     first_name: String,
/// }
///
/// static PERSON_FIELDS: Lazy<Vec<Field<Person>>> = Lazy::new(|| {
///     vec![
///         Field::new("PersonId", NativeType::Int32, |p: &Person| p.person_id.into(), |p: &mut Person, v: &Value| {
///             p.person_id = v.to()?;
///             Some(())
///         }),
///         Field::new("FirstName", NativeType::String, |p: &Person| p.first_name.clone().into(), |p: &mut Person, v: &Value| {
///             p.first_name = v.to()?;
///             Some(())
///         }),
///     ]
/// });
///
/// impl Record for Person {
///     fn fields() -> &'static [Field<Self>] {
///         &PERSON_FIELDS
///     }
/// }
///
/// assert_eq!(Person::fields().len(), 2);
/// ```
pub trait Record: Default + 'static {
    /// Every field in declaration order
    fn fields() -> &'static [Field<Self>];

    /// Whether rows of `procedure` are mapped by [`Record::map_row`] instead
    /// of by column name
    fn supports_map(_procedure: &str) -> bool {
        false
    }

    /// Populates `self` from one row of `procedure`'s result
    fn map_row(&mut self, _procedure: &str, _row: &Row<'_>) -> Result<()> {
        Ok(())
    }

    /// Field by exact name
    fn field(name: &str) -> Option<(usize, &'static Field<Self>)> {
        Self::fields()
            .iter()
            .enumerate()
            .find(|(_, field)| field.name == name)
    }
}
