//! Result materialization and the mapping caches behind it

mod mapping;
mod materializer;
mod record;

pub use mapping::{ColumnPropertyMapping, MappingCache, ObjectPropertyParameterMapping};
pub use materializer::{column_mapping, materialize};
pub use record::{Field, Record};
