//! Lazily built mapping tables cached per (procedure, target type)

use std::any::{type_name, TypeId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use log::debug;

/// Result column ordinal -> field index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnPropertyMapping {
    pub ordinal: usize,
    pub field_index: usize,
}

/// Canonical parameter name -> field index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPropertyParameterMapping {
    pub parameter: String,
    pub field_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MappingKey {
    procedure: String,
    type_id: TypeId,
}

/// Concurrent cache of mapping tables.
///
/// Each entry is built under its shard lock, so a key is computed at most
/// once no matter how many threads ask for it simultaneously.
#[derive(Debug)]
pub struct MappingCache<M> {
    entries: DashMap<MappingKey, Arc<[M]>>,
    builds: AtomicUsize,
}

impl<M> Default for MappingCache<M> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            builds: AtomicUsize::new(0),
        }
    }
}

impl<M> MappingCache<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached mapping for `(procedure, T)`, building it with `build` on first use
    pub fn get_or_build<T: 'static>(&self, procedure: &str, build: impl FnOnce() -> Vec<M>) -> Arc<[M]> {
        let key = MappingKey {
            procedure: procedure.to_string(),
            type_id: TypeId::of::<T>(),
        };

        if let Some(existing) = self.entries.get(&key) {
            return Arc::clone(existing.value());
        }

        let entry = self.entries.entry(key).or_insert_with(|| {
            self.builds.fetch_add(1, Ordering::SeqCst);
            let mapping: Arc<[M]> = Arc::from(build());
            debug!(
                "Built mapping for {} / {} with {} entries",
                procedure,
                type_name::<T>(),
                mapping.len()
            );
            mapping
        });
        Arc::clone(entry.value())
    }

    pub fn contains<T: 'static>(&self, procedure: &str) -> bool {
        self.entries.contains_key(&MappingKey {
            procedure: procedure.to_string(),
            type_id: TypeId::of::<T>(),
        })
    }

    /// Number of mappings built since the cache was created
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
