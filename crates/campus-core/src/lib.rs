//! Core domain model for the campus content migration.

use std::fmt;

use serde::{Deserialize, Serialize};

mod date;
mod error;
pub mod frontmatter;
pub mod records;
mod resolver;
mod slug;

pub use date::normalize_date;
pub use error::MigrationError;
pub use resolver::{CheckpointStore, CheckpointTable, IdMapping, IdentifierResolver};
pub use slug::{slugify, slugify_with};

pub const CRATE_NAME: &str = "campus-core";

pub const DEFAULT_LOCALE: &str = "en";

/// Legacy key spaces. Each one is migrated in a single pass and checkpointed as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    People,
    Tags,
    Sources,
    Resources,
    Events,
    Curricula,
}

/// How a legacy collection stores its records on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    /// One YAML file per record, keyed by file stem.
    YamlFile,
    /// One directory per record holding an `index.mdx`, keyed by directory name.
    MdxDirectory,
}

impl Collection {
    /// Declaration order; also the tie-breaker when ordering by dependencies.
    pub const ALL: [Collection; 6] = [
        Collection::People,
        Collection::Tags,
        Collection::Sources,
        Collection::Resources,
        Collection::Events,
        Collection::Curricula,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::People => "people",
            Collection::Tags => "tags",
            Collection::Sources => "sources",
            Collection::Resources => "resources",
            Collection::Events => "events",
            Collection::Curricula => "curricula",
        }
    }

    pub fn legacy_dir(self) -> &'static str {
        match self {
            Collection::People => "people",
            Collection::Tags => "tags",
            Collection::Sources => "categories",
            Collection::Resources => "posts",
            Collection::Events => "events",
            Collection::Curricula => "courses",
        }
    }

    pub fn layout(self) -> RecordLayout {
        match self {
            Collection::People | Collection::Tags | Collection::Sources => RecordLayout::YamlFile,
            Collection::Resources | Collection::Events | Collection::Curricula => {
                RecordLayout::MdxDirectory
            }
        }
    }

    pub fn checkpoint_file_name(self) -> String {
        format!("{}.json", self.as_str())
    }

    /// Collections whose mappings must be complete before this one can be migrated.
    pub fn dependencies(self) -> &'static [Collection] {
        match self {
            Collection::People | Collection::Tags | Collection::Sources => &[],
            Collection::Resources | Collection::Events => {
                &[Collection::People, Collection::Tags, Collection::Sources]
            }
            Collection::Curricula => &[Collection::People, Collection::Tags, Collection::Resources],
        }
    }

    /// Output path below `content/<locale>/`. Resources are split further by [`ResourceKind`].
    pub fn content_path(self) -> &'static str {
        match self {
            Collection::People => "people",
            Collection::Tags => "tags",
            Collection::Sources => "sources",
            Collection::Resources => "resources",
            Collection::Events => "resources/events",
            Collection::Curricula => "curricula",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target sub-collection of a migrated resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "hosted")]
    Hosted,
    #[serde(rename = "external")]
    External,
    #[serde(rename = "pathfinders")]
    Pathfinder,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Hosted => "hosted",
            ResourceKind::External => "external",
            ResourceKind::Pathfinder => "pathfinders",
        }
    }

    pub fn content_path(self) -> String {
        format!("{}/{}", Collection::Resources.content_path(), self.as_str())
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value side of an identifier mapping: a bare slug, or a slug plus its resource sub-collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappedId {
    Slug(String),
    Resource { collection: ResourceKind, id: String },
}

impl MappedId {
    pub fn id(&self) -> &str {
        match self {
            MappedId::Slug(id) => id,
            MappedId::Resource { id, .. } => id,
        }
    }

    pub fn resource_kind(&self) -> Option<ResourceKind> {
        match self {
            MappedId::Slug(_) => None,
            MappedId::Resource { collection, .. } => Some(*collection),
        }
    }
}

impl fmt::Display for MappedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappedId::Slug(id) => f.write_str(id),
            MappedId::Resource { collection, id } => write!(f, "{collection}/{id}"),
        }
    }
}

/// Entry of the pre-extracted `organisations.json` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organisation {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

/// Entry of the pre-extracted `uuid.json` table: legacy resource folder name + target collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UuidTarget {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
}

impl UuidTarget {
    pub fn public_path(&self) -> String {
        format!("/resources/{}/{}", self.kind.as_str(), slugify(&self.name))
    }
}
