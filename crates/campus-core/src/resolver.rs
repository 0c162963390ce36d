use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;

use crate::{Collection, MappedId, MigrationError};

/// Persisted form of one collection's mapping: `[legacy_key, value]` pairs in registration order.
pub type CheckpointTable = Vec<(String, MappedId)>;

/// Durable key-value storage for per-collection checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn exists(&self, collection: Collection) -> anyhow::Result<bool>;
    async fn load(&self, collection: Collection) -> anyhow::Result<CheckpointTable>;
    async fn save(&self, collection: Collection, table: &CheckpointTable) -> anyhow::Result<()>;
}

/// One collection's append-only legacy key → new id table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping {
    entries: Vec<(String, MappedId)>,
    by_key: BTreeMap<String, usize>,
    taken: BTreeMap<String, String>,
}

impl IdMapping {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, legacy_key: &str) -> Option<&MappedId> {
        self.by_key.get(legacy_key).map(|&i| &self.entries[i].1)
    }

    pub fn is_taken(&self, new_id: &str) -> bool {
        self.taken.contains_key(new_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MappedId)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_table(&self) -> CheckpointTable {
        self.entries.clone()
    }
}

/// In-memory resolver over every collection's mapping.
#[derive(Debug, Clone, Default)]
pub struct IdentifierResolver {
    mappings: BTreeMap<Collection, IdMapping>,
}

impl IdentifierResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, collection: Collection, legacy_key: &str) -> Result<&MappedId, MigrationError> {
        self.mappings
            .get(&collection)
            .and_then(|mapping| mapping.get(legacy_key))
            .ok_or_else(|| MigrationError::missing(collection.as_str(), legacy_key))
    }

    pub fn resolve_id(&self, collection: Collection, legacy_key: &str) -> Result<String, MigrationError> {
        self.resolve(collection, legacy_key).map(|id| id.id().to_string())
    }

    /// Map a list of legacy keys, failing on the first unresolved one.
    pub fn resolve_all(
        &self,
        collection: Collection,
        legacy_keys: &[String],
    ) -> Result<Vec<String>, MigrationError> {
        legacy_keys
            .iter()
            .map(|key| self.resolve_id(collection, key.trim()))
            .collect()
    }

    /// Bind `legacy_key` to `value`. Re-registering the same pair is a no-op.
    pub fn register(
        &mut self,
        collection: Collection,
        legacy_key: &str,
        value: MappedId,
    ) -> Result<(), MigrationError> {
        let mapping = self.mappings.entry(collection).or_default();

        if let Some(existing) = mapping.get(legacy_key) {
            if *existing == value {
                return Ok(());
            }
            return Err(MigrationError::DuplicateMapping {
                collection: collection.to_string(),
                key: legacy_key.to_string(),
                existing: existing.to_string(),
                attempted: value.to_string(),
            });
        }

        if let Some(owner) = mapping.taken.get(value.id()) {
            return Err(MigrationError::DuplicateMapping {
                collection: collection.to_string(),
                key: legacy_key.to_string(),
                existing: format!("{} (legacy id `{owner}`)", value.id()),
                attempted: value.to_string(),
            });
        }

        mapping.taken.insert(value.id().to_string(), legacy_key.to_string());
        mapping
            .by_key
            .insert(legacy_key.to_string(), mapping.entries.len());
        mapping.entries.push((legacy_key.to_string(), value));
        Ok(())
    }

    /// First id of `base`, `base-2`, `base-3`, ... not yet taken in `collection`.
    pub fn allocate_id(&self, collection: Collection, base: &str) -> String {
        let Some(mapping) = self.mappings.get(&collection) else {
            return base.to_string();
        };
        if !mapping.is_taken(base) {
            return base.to_string();
        }
        (2usize..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !mapping.is_taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn mapping(&self, collection: Collection) -> Option<&IdMapping> {
        self.mappings.get(&collection)
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.mapping(collection).map(IdMapping::len).unwrap_or(0)
    }

    /// Drop a collection's in-memory mapping before it is migrated again.
    pub fn reset(&mut self, collection: Collection) {
        self.mappings.remove(&collection);
    }

    pub async fn checkpoint_exists(
        &self,
        store: &dyn CheckpointStore,
        collection: Collection,
    ) -> anyhow::Result<bool> {
        store
            .exists(collection)
            .await
            .with_context(|| format!("checking {collection} checkpoint"))
    }

    /// Replace the in-memory mapping with the persisted one; returns the entry count.
    pub async fn load_checkpoint(
        &mut self,
        store: &dyn CheckpointStore,
        collection: Collection,
    ) -> anyhow::Result<usize> {
        let table = store
            .load(collection)
            .await
            .with_context(|| format!("loading {collection} checkpoint"))?;
        self.reset(collection);
        self.mappings.entry(collection).or_default();
        for (key, value) in table {
            self.register(collection, &key, value)
                .with_context(|| format!("replaying {collection} checkpoint"))?;
        }
        Ok(self.len(collection))
    }

    /// Persist the full mapping of `collection` (an empty table if nothing was registered).
    pub async fn save_checkpoint(
        &self,
        store: &dyn CheckpointStore,
        collection: Collection,
    ) -> anyhow::Result<usize> {
        let table = self
            .mapping(collection)
            .map(IdMapping::to_table)
            .unwrap_or_default();
        store
            .save(collection, &table)
            .await
            .with_context(|| format!("saving {collection} checkpoint"))?;
        Ok(table.len())
    }
}
