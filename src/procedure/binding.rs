//! Input binding from query pairs, JSON documents and records
//!
//! JSON documents are bound in a single streaming pass: serde drives a chain
//! of seeds and visitors that write straight into the instance's parameters
//! and table-valued row sets, without building an intermediate tree.

use std::fmt;
use std::sync::Arc;

use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};

use crate::error::{ProcedureError, Result};
use crate::materialize::{ObjectPropertyParameterMapping, Record};
use crate::naming::{parameter_name_for, to_underscore};
use crate::types::{DataRow, NativeType, RowSet, Value};

use super::instance::ProcedureInstance;
use super::template::ProcedureTemplate;

impl ProcedureInstance {
    /// Binds `(name, value)` pairs, e.g. a parsed query string
    pub fn load_from_query<I, K, V>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.bind(|instance| {
            for (name, value) in pairs {
                instance.parameter_mut(name.as_ref())?.set_untyped(value)?;
            }
            Ok(())
        })
    }

    /// Binds the properties of a JSON object.
    ///
    /// Scalar properties bind to the parameter they name. Array properties
    /// bind to table-valued parameters, one row per element object, with row
    /// properties matched to table columns after conversion to upper
    /// underscore case.
    pub fn load_from_json(&mut self, json: &str) -> Result<()> {
        self.bind(|instance| {
            let mut failure = None;
            let mut deserializer = serde_json::Deserializer::from_str(json);
            let outcome = DocumentSeed {
                instance,
                failure: &mut failure,
            }
            .deserialize(&mut deserializer)
            .and_then(|()| deserializer.end());

            match (failure, outcome) {
                (Some(err), _) => Err(err),
                (None, Err(err)) => Err(err.into()),
                (None, Ok(())) => Ok(()),
            }
        })
    }

    /// Binds every field of `item` that names an input parameter
    pub fn load_from_object<T: Record>(&mut self, item: &T) -> Result<()> {
        self.bind(|instance| {
            let template = Arc::clone(instance.template());
            let mapping = instance
                .snapshot()
                .parameter_mappings()
                .get_or_build::<T>(template.name(), || parameter_mapping::<T>(&template));

            let fields = T::fields();
            for entry in mapping.iter() {
                let value = (fields[entry.field_index].get)(item);
                instance.parameter_mut(&entry.parameter)?.set_untyped(value)?;
            }
            Ok(())
        })
    }
}

/// Field index to parameter pairs for the fields of `T` that name an input
/// parameter of `template`
pub fn parameter_mapping<T: Record>(template: &ProcedureTemplate) -> Vec<ObjectPropertyParameterMapping> {
    T::fields()
        .iter()
        .enumerate()
        .filter_map(|(field_index, field)| {
            let parameter = parameter_name_for(field.name);
            template
                .parameter(&parameter)
                .ok()
                .filter(|definition| definition.direction().accepts_input())
                .map(|_| ObjectPropertyParameterMapping {
                    parameter,
                    field_index,
                })
        })
        .collect()
}

/// Records a binding failure and hands serde an error that stops the walk
fn fail<E: de::Error>(slot: &mut Option<ProcedureError>, result: Result<()>) -> Result<(), E> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            let message = err.to_string();
            *slot = Some(err);
            Err(E::custom(message))
        }
    }
}

fn malformed(name: &str, message: &str) -> ProcedureError {
    ProcedureError::MalformedInput {
        name: name.to_string(),
        message: message.to_string(),
    }
}

/// Dispatches JSON scalars to `accept`
macro_rules! visit_scalars {
    () => {
        fn visit_bool<E: de::Error>(self, v: bool) -> Result<(), E> {
            self.accept(Value::Bool(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<(), E> {
            self.accept(Value::Int64(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<(), E> {
            let value = i64::try_from(v)
                .map(Value::Int64)
                .unwrap_or(Value::Float(v as f64));
            self.accept(value)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<(), E> {
            self.accept(Value::Float(v))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<(), E> {
            self.accept(Value::String(v.to_string()))
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<(), E> {
            self.accept(Value::String(v))
        }

        fn visit_unit<E: de::Error>(self) -> Result<(), E> {
            self.accept(Value::Null)
        }

        fn visit_none<E: de::Error>(self) -> Result<(), E> {
            self.accept(Value::Null)
        }
    };
}

/// The document root; must be an object
struct DocumentSeed<'a> {
    instance: &'a mut ProcedureInstance,
    failure: &'a mut Option<ProcedureError>,
}

impl<'de> DeserializeSeed<'de> for DocumentSeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for DocumentSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let DocumentSeed { instance, failure } = self;
        while let Some(name) = map.next_key::<String>()? {
            map.next_value_seed(PropertySeed {
                instance: &mut *instance,
                failure: &mut *failure,
                name: &name,
            })?;
        }
        Ok(())
    }
}

/// One property of the root object
struct PropertySeed<'a> {
    instance: &'a mut ProcedureInstance,
    failure: &'a mut Option<ProcedureError>,
    name: &'a str,
}

impl PropertySeed<'_> {
    fn accept<E: de::Error>(self, value: Value) -> Result<(), E> {
        let result = self
            .instance
            .parameter_mut(self.name)
            .and_then(|parameter| parameter.set_untyped(value));
        fail(self.failure, result)
    }

    /// Empty row set for the table-valued parameter this property names
    fn row_set(&self) -> Result<RowSet> {
        let parameter = self.instance.parameter(self.name)?;
        if parameter.native_type() != NativeType::Table {
            return Err(ProcedureError::TypeMismatch {
                name: parameter.name().to_string(),
                expected: parameter.native_type().to_string(),
                found: "array".to_string(),
            });
        }
        let type_name =
            parameter
                .structured_type_name()
                .ok_or_else(|| ProcedureError::UnknownTableType {
                    name: parameter.name().to_string(),
                })?;
        let table_type = self.instance.snapshot().table_type(type_name)?;
        Ok(RowSet::new(Arc::clone(table_type)))
    }
}

impl<'de> DeserializeSeed<'de> for PropertySeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for PropertySeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar or an array of row objects")
    }

    visit_scalars!();

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        let mut rows = match self.row_set() {
            Ok(rows) => rows,
            Err(err) => return fail(self.failure, Err(err)),
        };
        while seq
            .next_element_seed(RowSeed {
                rows: &mut rows,
                failure: &mut *self.failure,
                parameter: self.name,
            })?
            .is_some()
        {}
        self.accept(Value::Table(rows))
    }

    fn visit_map<A: MapAccess<'de>>(self, _map: A) -> Result<(), A::Error> {
        let err = malformed(self.name, "nested objects cannot be bound to a parameter");
        fail(self.failure, Err(err))
    }
}

/// One element of a table-valued parameter array; must be an object
struct RowSeed<'a> {
    rows: &'a mut RowSet,
    failure: &'a mut Option<ProcedureError>,
    parameter: &'a str,
}

impl RowSeed<'_> {
    fn accept<E: de::Error>(self, _value: Value) -> Result<(), E> {
        let err = malformed(self.parameter, "table-valued parameter rows must be objects");
        fail(self.failure, Err(err))
    }
}

impl<'de> DeserializeSeed<'de> for RowSeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for RowSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a row object")
    }

    visit_scalars!();

    fn visit_seq<A: SeqAccess<'de>>(self, _seq: A) -> Result<(), A::Error> {
        self.accept(Value::Null)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let RowSeed { rows, failure, .. } = self;
        let mut row = rows.new_row();
        while let Some(key) = map.next_key::<String>()? {
            let column = to_underscore(&key);
            map.next_value_seed(CellSeed {
                row: &mut row,
                failure: &mut *failure,
                column: &column,
            })?;
        }
        fail(failure, rows.add_row(row))
    }
}

/// One cell of a table-valued parameter row
struct CellSeed<'a> {
    row: &'a mut DataRow,
    failure: &'a mut Option<ProcedureError>,
    column: &'a str,
}

impl CellSeed<'_> {
    fn accept<E: de::Error>(self, value: Value) -> Result<(), E> {
        let result = self.row.set(self.column, value);
        fail(self.failure, result)
    }

    fn nested<E: de::Error>(self) -> Result<(), E> {
        let err = malformed(self.column, "nested values cannot be bound to a table column");
        fail(self.failure, Err(err))
    }
}

impl<'de> DeserializeSeed<'de> for CellSeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for CellSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar cell value")
    }

    visit_scalars!();

    fn visit_seq<A: SeqAccess<'de>>(self, _seq: A) -> Result<(), A::Error> {
        self.nested()
    }

    fn visit_map<A: MapAccess<'de>>(self, _map: A) -> Result<(), A::Error> {
        self.nested()
    }
}
