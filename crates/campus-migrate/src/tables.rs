use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use campus_core::{MigrationError, Organisation, UuidTarget};
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::info;

use crate::normalize::OrganisationTable;

/// Legacy opaque id → resource it names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UuidTable {
    entries: BTreeMap<String, UuidTarget>,
}

impl UuidTable {
    pub fn from_pairs(pairs: Vec<(String, UuidTarget)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(uuid, target)| (uuid.to_ascii_lowercase(), target))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `/resources/<type>/<slug>` for `uuid`, or `MissingMapping` in collection `uuid`.
    pub fn public_path(&self, uuid: &str) -> Result<String, MigrationError> {
        self.entries
            .get(&uuid.to_ascii_lowercase())
            .map(UuidTarget::public_path)
            .ok_or_else(|| MigrationError::missing("uuid", uuid))
    }
}

async fn load_pairs<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Option<Vec<(String, T)>>> {
    let exists = fs::try_exists(path)
        .await
        .with_context(|| format!("checking {}", path.display()))?;
    if !exists {
        info!(path = %path.display(), "lookup table not present; treating as empty");
        return Ok(None);
    }
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let pairs = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(pairs))
}

/// `organisations.json`: `[[key, {name, url?, logo?}]]`. A missing file is an empty table.
pub async fn load_organisations(path: &Path) -> anyhow::Result<OrganisationTable> {
    let pairs: Vec<(String, Organisation)> = load_pairs(path).await?.unwrap_or_default();
    Ok(pairs.into_iter().collect())
}

/// `uuid.json`: `[[uuid, {name, type}]]`. A missing file is an empty table.
pub async fn load_uuid_table(path: &Path) -> anyhow::Result<UuidTable> {
    let pairs = load_pairs(path).await?.unwrap_or_default();
    Ok(UuidTable::from_pairs(pairs))
}
