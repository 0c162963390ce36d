//! Batch orchestration: collections in dependency order, entries in sorted order,
//! one checkpoint per completed collection.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use campus_core::frontmatter::{render_document, split_frontmatter};
use campus_core::{
    CheckpointStore, Collection, IdentifierResolver, MappedId, MigrationError, RecordLayout,
    ResourceKind,
};
use campus_markup::{AssetUse, RewriteContext};
use campus_storage::{
    write_atomic, AssetKind, AssetRelocator, AssetTarget, HttpClientConfig, HttpFetcher,
    JsonFileCheckpointStore, RelocateOptions,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_yaml::Value;
use tokio::fs;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::MigrationConfig;
use crate::graph::processing_order;
use crate::normalize::{
    normalize_curriculum, normalize_event, normalize_person, normalize_resource, normalize_source,
    normalize_tag, resource_mapping, AssetSlots, Normalized, OrganisationTable, PendingAsset,
    References,
};
use crate::tables::{load_organisations, load_uuid_table, UuidTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionState {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub collection: Collection,
    pub state: CollectionState,
    /// Completed from an existing checkpoint without touching the legacy tree.
    pub skipped: bool,
    /// Migrated entries, or mappings loaded from the checkpoint when skipped.
    pub entries: usize,
    pub assets: usize,
}

impl CollectionReport {
    fn new(collection: Collection) -> Self {
        Self {
            collection,
            state: CollectionState::NotStarted,
            skipped: false,
            entries: 0,
            assets: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub collections: Vec<CollectionReport>,
}

impl MigrationSummary {
    pub fn report(&self, collection: Collection) -> Option<&CollectionReport> {
        self.collections.iter().find(|r| r.collection == collection)
    }

    pub fn migrated_entries(&self) -> usize {
        self.collections
            .iter()
            .filter(|r| !r.skipped)
            .map(|r| r.entries)
            .sum()
    }

    pub fn relocated_assets(&self) -> usize {
        self.collections.iter().map(|r| r.assets).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub collection: Collection,
    pub checkpoint: bool,
    pub mappings: usize,
}

/// One legacy record on disk.
#[derive(Debug, Clone)]
struct LegacyEntry {
    key: String,
    /// Directory relative asset references are resolved against.
    dir: PathBuf,
    document: PathBuf,
}

pub struct MigrationPipeline {
    config: MigrationConfig,
    store: Box<dyn CheckpointStore>,
    relocator: AssetRelocator,
    fetcher: Option<HttpFetcher>,
    resolver: IdentifierResolver,
    organisations: OrganisationTable,
    uuids: UuidTable,
}

impl MigrationPipeline {
    pub fn new(config: MigrationConfig) -> Result<Self> {
        let store = JsonFileCheckpointStore::new(config.checkpoint_dir.clone());
        let relocator = AssetRelocator::new(config.public_dir.clone(), config.locale.clone());
        let fetcher = if config.fetch_remote_assets {
            Some(HttpFetcher::new(HttpClientConfig {
                timeout: Duration::from_secs(config.http_timeout_secs),
                user_agent: Some(config.user_agent.clone()),
            })?)
        } else {
            None
        };

        Ok(Self {
            config,
            store: Box::new(store),
            relocator,
            fetcher,
            resolver: IdentifierResolver::new(),
            organisations: OrganisationTable::new(),
            uuids: UuidTable::default(),
        })
    }

    pub fn with_checkpoint_store(mut self, store: Box<dyn CheckpointStore>) -> Self {
        self.store = store;
        self
    }

    pub fn resolver(&self) -> &IdentifierResolver {
        &self.resolver
    }

    pub async fn run(&mut self) -> Result<MigrationSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let order = processing_order(&self.config.collections)?;
        self.organisations = load_organisations(&self.config.organisations_path).await?;
        self.uuids = load_uuid_table(&self.config.uuid_path).await?;
        info!(
            %run_id,
            collections = order.len(),
            organisations = self.organisations.len(),
            uuids = self.uuids.len(),
            force = self.config.force,
            "migration started"
        );

        let mut collections = Vec::with_capacity(order.len());
        for collection in order {
            let span = info_span!("migrate_collection", collection = %collection);
            let report = self
                .migrate_collection(collection)
                .instrument(span)
                .await
                .with_context(|| format!("migrating collection {collection}"))?;
            collections.push(report);
        }

        Ok(MigrationSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            collections,
        })
    }

    async fn migrate_collection(&mut self, collection: Collection) -> Result<CollectionReport> {
        let mut report = CollectionReport::new(collection);

        if !self.config.force
            && self
                .resolver
                .checkpoint_exists(self.store.as_ref(), collection)
                .await?
        {
            let loaded = self
                .resolver
                .load_checkpoint(self.store.as_ref(), collection)
                .await?;
            report.state = CollectionState::Completed;
            report.skipped = true;
            report.entries = loaded;
            info!(mappings = loaded, "checkpoint present, collection skipped");
            return Ok(report);
        }

        report.state = CollectionState::InProgress;
        self.resolver.reset(collection);
        let entries = self.list_entries(collection).await?;
        info!(entries = entries.len(), "collection in progress");

        for entry in &entries {
            let assets = self
                .migrate_entry(collection, entry)
                .await
                .with_context(|| format!("migrating {collection} entry {}", entry.key))?;
            report.entries += 1;
            report.assets += assets;
        }

        let saved = self
            .resolver
            .save_checkpoint(self.store.as_ref(), collection)
            .await?;
        report.state = CollectionState::Completed;
        info!(mappings = saved, assets = report.assets, "collection completed");
        Ok(report)
    }

    async fn list_entries(&self, collection: Collection) -> Result<Vec<LegacyEntry>> {
        let root = self.config.source_dir.join(collection.legacy_dir());
        let present = fs::try_exists(&root)
            .await
            .with_context(|| format!("checking {}", root.display()))?;
        if !present {
            warn!(path = %root.display(), "legacy directory missing, treating collection as empty");
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let mut listing = fs::read_dir(&root)
            .await
            .with_context(|| format!("reading {}", root.display()))?;
        while let Some(item) = listing
            .next_entry()
            .await
            .with_context(|| format!("listing {}", root.display()))?
        {
            let path = item.path();
            let file_type = item
                .file_type()
                .await
                .with_context(|| format!("inspecting {}", path.display()))?;

            match collection.layout() {
                RecordLayout::YamlFile => {
                    let is_yaml = path
                        .extension()
                        .is_some_and(|ext| ext == "yml" || ext == "yaml");
                    if !file_type.is_file() || !is_yaml {
                        continue;
                    }
                    let Some(key) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                        continue;
                    };
                    entries.push(LegacyEntry {
                        key,
                        dir: root.clone(),
                        document: path,
                    });
                }
                RecordLayout::MdxDirectory => {
                    if !file_type.is_dir() {
                        continue;
                    }
                    let document = path.join("index.mdx");
                    let has_document = fs::try_exists(&document)
                        .await
                        .with_context(|| format!("checking {}", document.display()))?;
                    if !has_document {
                        debug!(path = %path.display(), "directory without index.mdx ignored");
                        continue;
                    }
                    entries.push(LegacyEntry {
                        key: item.file_name().to_string_lossy().into_owned(),
                        dir: path,
                        document,
                    });
                }
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    /// Migrate one record and return how many assets it relocated.
    async fn migrate_entry(&mut self, collection: Collection, entry: &LegacyEntry) -> Result<usize> {
        let text = fs::read_to_string(&entry.document)
            .await
            .with_context(|| format!("reading {}", entry.document.display()))?;

        let (header, body) = match collection.layout() {
            RecordLayout::YamlFile => (text.as_str(), ""),
            RecordLayout::MdxDirectory => match split_frontmatter(&text) {
                (Some(header), body) => (header, body),
                (None, _) => {
                    return Err(MigrationError::invalid_field(
                        "frontmatter",
                        "document has no frontmatter header",
                    )
                    .into())
                }
            },
        };
        let raw: Value = serde_yaml::from_str(header)
            .map_err(|err| MigrationError::invalid_field("frontmatter", err.to_string()))?;

        let refs = References {
            resolver: &self.resolver,
            organisations: &self.organisations,
        };
        let key = entry.key.as_str();
        let path = collection.content_path();

        match collection {
            Collection::People => {
                let normalized = normalize_person(key, &raw)?;
                self.write_entry(collection, entry, normalized, path, None).await
            }
            Collection::Tags => {
                let normalized = normalize_tag(key, &raw)?;
                self.write_entry(collection, entry, normalized, path, None).await
            }
            Collection::Sources => {
                let normalized = normalize_source(key, &raw)?;
                self.write_entry(collection, entry, normalized, path, None).await
            }
            Collection::Resources => {
                let normalized = normalize_resource(key, &raw, body, refs)?;
                let kind = normalized.frontmatter.kind();
                self.write_entry(collection, entry, normalized, &kind.content_path(), Some(kind))
                    .await
            }
            Collection::Events => {
                let normalized = normalize_event(key, &raw, body, refs)?;
                self.write_entry(collection, entry, normalized, path, None).await
            }
            Collection::Curricula => {
                let normalized = normalize_curriculum(key, &raw, body, refs)?;
                self.write_entry(collection, entry, normalized, path, None).await
            }
        }
    }

    /// Allocate the new id, relocate assets, rewrite the body, write the document,
    /// and only then record the mapping.
    async fn write_entry<T>(
        &mut self,
        collection: Collection,
        entry: &LegacyEntry,
        mut normalized: Normalized<T>,
        content_path: &str,
        resource_kind: Option<ResourceKind>,
    ) -> Result<usize>
    where
        T: Serialize + AssetSlots + Send + Sync,
    {
        let id = self.resolver.allocate_id(collection, &normalized.id_base);
        if id.is_empty() {
            return Err(MigrationError::invalid_field("id", "new id slug is empty").into());
        }

        let ctx = EntryContext {
            label: format!("{}/{}", collection.legacy_dir(), entry.key),
            entry_dir: &entry.dir,
            source_root: &self.config.source_dir,
            relocator: &self.relocator,
            fetcher: self.fetcher.as_ref(),
            uuids: &self.uuids,
            collection_path: content_path,
            entry_id: &id,
            relocated: AtomicUsize::new(0),
        };

        for asset in &normalized.assets {
            if let Some(url) = ctx.relocate_field(asset).await? {
                normalized.frontmatter.set_asset(asset.slot, url);
            }
        }

        let body = match collection.layout() {
            RecordLayout::MdxDirectory => campus_markup::rewrite(&normalized.body, &ctx).await?,
            RecordLayout::YamlFile => normalized.body.clone(),
        };
        let document = render_document(&normalized.frontmatter, &body)
            .with_context(|| format!("rendering frontmatter of {}", ctx.label))?;

        let target = self
            .config
            .locale_content_dir()
            .join(content_path)
            .join(&id)
            .join("index.mdx");
        write_atomic(&target, document.as_bytes()).await?;
        let assets = ctx.relocated.load(Ordering::Relaxed);
        debug!(entry = %ctx.label, id = %id, assets, path = %target.display(), "entry written");

        let mapped = match resource_kind {
            Some(kind) => resource_mapping(kind, &id),
            None => MappedId::Slug(id.clone()),
        };
        self.resolver.register(collection, &entry.key, mapped)?;
        Ok(assets)
    }
}

/// Per-entry view handed to normalizer asset slots and the markup rewrite.
struct EntryContext<'a> {
    label: String,
    entry_dir: &'a Path,
    source_root: &'a Path,
    relocator: &'a AssetRelocator,
    fetcher: Option<&'a HttpFetcher>,
    uuids: &'a UuidTable,
    collection_path: &'a str,
    entry_id: &'a str,
    relocated: AtomicUsize,
}

const RELOCATED_PREFIX: &str = "/assets/content/";

fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

impl EntryContext<'_> {
    fn target(&self, kind: AssetKind) -> AssetTarget<'_> {
        AssetTarget {
            kind,
            collection_path: self.collection_path,
            entry_id: self.entry_id,
        }
    }

    /// Rooted references (`/images/logo.svg`) live under the legacy tree root, others beside the record.
    fn local_path(&self, reference: &str) -> PathBuf {
        let reference = reference
            .split(['?', '#'])
            .next()
            .unwrap_or(reference);
        match reference.strip_prefix('/') {
            Some(rooted) => self.source_root.join(rooted),
            None => self.entry_dir.join(reference),
        }
    }

    async fn relocate(
        &self,
        kind: AssetKind,
        reference: &str,
        options: &RelocateOptions,
    ) -> Result<Option<String>> {
        let reference = reference.trim();
        if reference.is_empty() || reference.starts_with(RELOCATED_PREFIX) {
            return Ok(None);
        }

        let relocated = if is_remote(reference) {
            match (self.fetcher, kind) {
                (Some(fetcher), AssetKind::Image) => {
                    self.relocator
                        .relocate_remote(fetcher, reference, self.target(kind))
                        .await?
                }
                _ => return Ok(None),
            }
        } else {
            let path = self.local_path(reference);
            self.relocator
                .relocate(&path, self.target(kind), options)
                .await
                .with_context(|| format!("relocating `{reference}` for {}", self.label))?
        };

        self.relocated.fetch_add(1, Ordering::Relaxed);
        if relocated.deduplicated {
            debug!(entry = %self.label, url = %relocated.public_url, "asset unchanged");
        }
        Ok(Some(relocated.public_url))
    }

    async fn relocate_field(&self, asset: &PendingAsset) -> Result<Option<String>> {
        let options = asset
            .slot
            .file_stem()
            .map(RelocateOptions::stem)
            .unwrap_or_default();
        self.relocate(AssetKind::Image, &asset.reference, &options).await
    }
}

#[async_trait]
impl<'a> RewriteContext for EntryContext<'a> {
    fn entry(&self) -> &str {
        &self.label
    }

    async fn relocate_asset(&self, usage: AssetUse, reference: &str) -> anyhow::Result<Option<String>> {
        let kind = match usage {
            AssetUse::Image => AssetKind::Image,
            AssetUse::Download => AssetKind::Download,
        };
        self.relocate(kind, reference, &RelocateOptions::default()).await
    }

    fn resolve_uuid(&self, uuid: &str) -> Result<String, MigrationError> {
        self.uuids.public_path(uuid)
    }
}

/// Checkpoint presence and mapping counts, in processing order.
pub async fn status(config: &MigrationConfig) -> Result<Vec<CollectionStatus>> {
    let store = JsonFileCheckpointStore::new(config.checkpoint_dir.clone());
    let mut out = Vec::new();
    for collection in processing_order(&config.collections)? {
        let checkpoint = store.exists(collection).await?;
        let mappings = if checkpoint {
            store
                .load(collection)
                .await
                .with_context(|| format!("loading {collection} checkpoint"))?
                .len()
        } else {
            0
        };
        out.push(CollectionStatus {
            collection,
            checkpoint,
            mappings,
        });
    }
    Ok(out)
}

pub async fn run_migration(config: MigrationConfig) -> Result<MigrationSummary> {
    MigrationPipeline::new(config)?.run().await
}

pub async fn run_migration_from_env() -> Result<MigrationSummary> {
    run_migration(MigrationConfig::from_env()).await
}
