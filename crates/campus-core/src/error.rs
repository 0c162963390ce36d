use std::path::PathBuf;

use thiserror::Error;

/// Fatal migration errors. None of them is recovered locally; each aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    #[error("missing {collection} mapping for legacy id `{key}`")]
    MissingMapping { collection: String, key: String },

    #[error("invalid value `{value}` for `{field}`, expected one of: {allowed}")]
    InvalidEnumValue {
        field: String,
        value: String,
        allowed: String,
    },

    #[error("unexpected markup <{tag}> in {entry}: {reason}")]
    UnexpectedMarkup {
        tag: String,
        entry: String,
        reason: String,
    },

    #[error("asset not found: {}", .path.display())]
    AssetNotFound { path: PathBuf },

    #[error("cannot determine media type for asset {asset}")]
    UnknownMediaType { asset: String, mime: Option<String> },

    #[error("{collection} legacy id `{key}` cannot map to `{attempted}`, already bound to `{existing}`")]
    DuplicateMapping {
        collection: String,
        key: String,
        existing: String,
        attempted: String,
    },

    #[error("invalid `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("malformed markup at byte {offset}: {reason}")]
    MarkupSyntax { offset: usize, reason: String },

    #[error("collection dependency cycle or unknown dependency among: {collections}")]
    DependencyCycle { collections: String },
}

impl MigrationError {
    pub fn missing(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingMapping {
            collection: collection.into(),
            key: key.into(),
        }
    }

    pub fn invalid_enum(field: &str, value: &str, allowed: &[&str]) -> Self {
        Self::InvalidEnumValue {
            field: field.to_string(),
            value: value.to_string(),
            allowed: allowed.join(", "),
        }
    }

    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unexpected_markup(tag: &str, entry: &str, reason: impl Into<String>) -> Self {
        Self::UnexpectedMarkup {
            tag: tag.to_string(),
            entry: entry.to_string(),
            reason: reason.into(),
        }
    }
}
