use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use campus_core::{CheckpointStore, CheckpointTable, Collection};
use tokio::fs;

use crate::write_atomic;

/// Checkpoints as `<dir>/<collection>.json`, each a JSON array of `[legacy_key, value]` pairs.
#[derive(Debug, Clone)]
pub struct JsonFileCheckpointStore {
    dir: PathBuf,
}

impl JsonFileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, collection: Collection) -> PathBuf {
        self.dir.join(collection.checkpoint_file_name())
    }
}

#[async_trait]
impl CheckpointStore for JsonFileCheckpointStore {
    async fn exists(&self, collection: Collection) -> anyhow::Result<bool> {
        let path = self.path_for(collection);
        fs::try_exists(&path)
            .await
            .with_context(|| format!("checking checkpoint path {}", path.display()))
    }

    async fn load(&self, collection: Collection) -> anyhow::Result<CheckpointTable> {
        let path = self.path_for(collection);
        let text = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    async fn save(&self, collection: Collection, table: &CheckpointTable) -> anyhow::Result<()> {
        let path = self.path_for(collection);
        let bytes = serde_json::to_vec(table)
            .with_context(|| format!("serializing {collection} checkpoint"))?;
        write_atomic(&path, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::{MappedId, ResourceKind};
    use tempfile::tempdir;

    #[tokio::test]
    async fn tables_round_trip_as_pair_arrays() {
        let dir = tempdir().expect("tempdir");
        let store = JsonFileCheckpointStore::new(dir.path());
        let table = vec![
            ("jsmith".to_string(), MappedId::Slug("smith-jane".into())),
            (
                "intro".to_string(),
                MappedId::Resource {
                    collection: ResourceKind::Pathfinder,
                    id: "intro".into(),
                },
            ),
        ];

        assert!(!store.exists(Collection::People).await.unwrap());
        store.save(Collection::People, &table).await.unwrap();
        assert!(store.exists(Collection::People).await.unwrap());

        let raw = std::fs::read_to_string(dir.path().join("people.json")).unwrap();
        assert_eq!(
            raw,
            r#"[["jsmith","smith-jane"],["intro",{"collection":"pathfinders","id":"intro"}]]"#
        );
        assert_eq!(store.load(Collection::People).await.unwrap(), table);
    }

    #[tokio::test]
    async fn empty_tables_are_still_checkpoints() {
        let dir = tempdir().expect("tempdir");
        let store = JsonFileCheckpointStore::new(dir.path().join("nested"));
        store.save(Collection::Events, &Vec::new()).await.unwrap();
        assert!(store.exists(Collection::Events).await.unwrap());
        assert_eq!(
            std::fs::read_to_string(store.path_for(Collection::Events)).unwrap(),
            "[]"
        );
    }

    #[tokio::test]
    async fn malformed_checkpoints_fail_loudly() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("tags.json"), "{not json").unwrap();
        let store = JsonFileCheckpointStore::new(dir.path());
        let err = store.load(Collection::Tags).await.unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
    }
}
