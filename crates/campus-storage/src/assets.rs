use std::path::{Path, PathBuf};

use anyhow::Context;
use campus_core::{slugify_with, MigrationError};
use tokio::fs;
use tracing::debug;

use crate::{sha256_hex, write_atomic, HttpFetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Images and logos, under `assets/content/assets/`.
    Image,
    /// Downloadable attachments, under `assets/content/downloads/`.
    Download,
}

impl AssetKind {
    fn segment(self) -> &'static str {
        match self {
            AssetKind::Image => "assets",
            AssetKind::Download => "downloads",
        }
    }
}

/// Where a relocated asset belongs: kind, collection path below the locale, entry id.
#[derive(Debug, Clone, Copy)]
pub struct AssetTarget<'a> {
    pub kind: AssetKind,
    pub collection_path: &'a str,
    pub entry_id: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct RelocateOptions {
    /// Replaces the slugified basename, keeping the extension (`image`, `featured-image`, ...).
    pub file_stem: Option<String>,
    /// Content type used to synthesize an extension when the source has none.
    pub mime_hint: Option<String>,
}

impl RelocateOptions {
    pub fn stem(stem: impl Into<String>) -> Self {
        Self {
            file_stem: Some(stem.into()),
            mime_hint: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelocatedAsset {
    pub public_url: String,
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub content_hash: String,
    pub byte_size: usize,
    /// The destination already held identical bytes, nothing was written.
    pub deduplicated: bool,
}

/// Copies legacy assets into the public tree under deterministic, slugified names.
#[derive(Debug, Clone)]
pub struct AssetRelocator {
    public_root: PathBuf,
    locale: String,
}

impl AssetRelocator {
    pub fn new(public_root: impl Into<PathBuf>, locale: impl Into<String>) -> Self {
        Self {
            public_root: public_root.into(),
            locale: locale.into(),
        }
    }

    pub fn public_root(&self) -> &Path {
        &self.public_root
    }

    pub fn relative_dir(&self, target: &AssetTarget<'_>) -> PathBuf {
        let mut dir = PathBuf::from("assets")
            .join("content")
            .join(target.kind.segment())
            .join(&self.locale);
        for segment in target.collection_path.split('/').filter(|s| !s.is_empty()) {
            dir.push(segment);
        }
        dir.join(target.entry_id)
    }

    /// Copy `source` into the public tree; the legacy file is only read.
    pub async fn relocate(
        &self,
        source: &Path,
        target: AssetTarget<'_>,
        options: &RelocateOptions,
    ) -> anyhow::Result<RelocatedAsset> {
        let bytes = match fs::read(source).await {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(path = %source.display(), error = %err, "asset unreadable");
                return Err(MigrationError::AssetNotFound {
                    path: source.to_path_buf(),
                }
                .into());
            }
        };

        let basename = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = destination_file_name(&basename, options)?;
        self.store_bytes(&file_name, target, &bytes).await
    }

    /// Fetch a remote image and store it like a local one. The response must be `image/*`.
    pub async fn relocate_remote(
        &self,
        fetcher: &HttpFetcher,
        url: &str,
        target: AssetTarget<'_>,
    ) -> anyhow::Result<RelocatedAsset> {
        let parsed = url::Url::parse(url).with_context(|| format!("parsing asset url {url}"))?;
        let response = fetcher
            .fetch_bytes(url)
            .await
            .with_context(|| format!("fetching remote asset {url}"))?;

        let mime = response.content_type.clone();
        if !mime
            .as_deref()
            .is_some_and(|m| m.trim().to_ascii_lowercase().starts_with("image/"))
        {
            return Err(MigrationError::UnknownMediaType {
                asset: url.to_string(),
                mime,
            }
            .into());
        }

        let basename = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .unwrap_or_default();
        let options = RelocateOptions {
            file_stem: None,
            mime_hint: mime,
        };
        let file_name = destination_file_name(&basename, &options)?;
        self.store_bytes(&file_name, target, &response.body).await
    }

    /// Store already-read bytes as `file_name` below the target directory.
    /// Rewrites are skipped when the destination already holds the same content hash.
    pub async fn store_bytes(
        &self,
        file_name: &str,
        target: AssetTarget<'_>,
        bytes: &[u8],
    ) -> anyhow::Result<RelocatedAsset> {
        let content_hash = sha256_hex(bytes);
        let relative_path = self.relative_dir(&target).join(file_name);
        let absolute_path = self.public_root.join(&relative_path);
        let public_url = format!(
            "/{}",
            relative_path
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        );

        let existing_hash = match fs::read(&absolute_path).await {
            Ok(existing) => Some(sha256_hex(&existing)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("reading existing asset {}", absolute_path.display()))
            }
        };

        let deduplicated = existing_hash.as_deref() == Some(content_hash.as_str());
        if !deduplicated {
            write_atomic(&absolute_path, bytes).await?;
        }

        Ok(RelocatedAsset {
            public_url,
            relative_path,
            absolute_path,
            content_hash,
            byte_size: bytes.len(),
            deduplicated,
        })
    }
}

/// Slugified basename with its extension kept (or synthesized from the mime hint).
fn destination_file_name(basename: &str, options: &RelocateOptions) -> Result<String, MigrationError> {
    let (stem, extension) = match basename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            (stem.to_string(), Some(ext.to_ascii_lowercase()))
        }
        _ => (basename.to_string(), None),
    };

    let extension = match extension {
        Some(ext) => ext,
        None => options
            .mime_hint
            .as_deref()
            .and_then(extension_for_mime)
            .ok_or_else(|| MigrationError::UnknownMediaType {
                asset: basename.to_string(),
                mime: options.mime_hint.clone(),
            })?
            .to_string(),
    };

    let stem = match &options.file_stem {
        Some(stem) => stem.clone(),
        None => slugify_with(&stem, &['.']),
    };
    let stem = if stem.is_empty() { "asset".to_string() } else { stem };
    Ok(format!("{stem}.{}", slugify_with(&extension, &[])))
}

/// File extension for a content type, ignoring parameters such as `charset`.
pub fn extension_for_mime(mime: &str) -> Option<&str> {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    let known = match essence.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/avif" => Some("avif"),
        "image/svg+xml" => Some("svg"),
        "image/tiff" => Some("tiff"),
        "image/bmp" => Some("bmp"),
        "image/x-icon" | "image/vnd.microsoft.icon" => Some("ico"),
        "application/pdf" => Some("pdf"),
        "application/zip" => Some("zip"),
        "application/json" => Some("json"),
        "application/xml" | "text/xml" => Some("xml"),
        "text/plain" => Some("txt"),
        "text/csv" => Some("csv"),
        _ => None,
    };
    known.or_else(|| {
        essence
            .strip_prefix("image/")
            .filter(|sub| !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()))
    })
}
