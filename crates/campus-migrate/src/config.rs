use std::path::{Path, PathBuf};

use campus_core::{Collection, DEFAULT_LOCALE};

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Legacy tree (`content-source/`).
    pub source_dir: PathBuf,
    /// Output content tree; entries land in `<content_dir>/<locale>/...`.
    pub content_dir: PathBuf,
    /// Public asset root; assets land in `<public_dir>/assets/content/...`.
    pub public_dir: PathBuf,
    pub checkpoint_dir: PathBuf,
    pub organisations_path: PathBuf,
    pub uuid_path: PathBuf,
    pub locale: String,
    pub force: bool,
    pub fetch_remote_assets: bool,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub collections: Vec<Collection>,
}

impl MigrationConfig {
    /// Defaults for a working directory `root`.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            source_dir: root.join("content-source"),
            content_dir: root.join("content"),
            public_dir: root.join("public"),
            checkpoint_dir: root.to_path_buf(),
            organisations_path: root.join("organisations.json"),
            uuid_path: root.join("uuid.json"),
            locale: DEFAULT_LOCALE.to_string(),
            force: false,
            fetch_remote_assets: false,
            user_agent: "campus-migrate/0.1".to_string(),
            http_timeout_secs: 20,
            collections: Collection::ALL.to_vec(),
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::with_root(".");
        Self {
            source_dir: env_path("CAMPUS_SOURCE_DIR").unwrap_or(defaults.source_dir),
            content_dir: env_path("CAMPUS_CONTENT_DIR").unwrap_or(defaults.content_dir),
            public_dir: env_path("CAMPUS_PUBLIC_DIR").unwrap_or(defaults.public_dir),
            checkpoint_dir: env_path("CAMPUS_CHECKPOINT_DIR").unwrap_or(defaults.checkpoint_dir),
            organisations_path: env_path("CAMPUS_ORGANISATIONS_FILE")
                .unwrap_or(defaults.organisations_path),
            uuid_path: env_path("CAMPUS_UUID_FILE").unwrap_or(defaults.uuid_path),
            locale: std::env::var("CAMPUS_LOCALE").unwrap_or(defaults.locale),
            force: env_flag("CAMPUS_FORCE").unwrap_or(defaults.force),
            fetch_remote_assets: env_flag("CAMPUS_FETCH_REMOTE_ASSETS")
                .unwrap_or(defaults.fetch_remote_assets),
            user_agent: std::env::var("CAMPUS_USER_AGENT").unwrap_or(defaults.user_agent),
            http_timeout_secs: std::env::var("CAMPUS_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_timeout_secs),
            collections: defaults.collections,
        }
    }

    /// `content/<locale>` for this run.
    pub fn locale_content_dir(&self) -> PathBuf {
        self.content_dir.join(&self.locale)
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_relative_to_the_root() {
        let config = MigrationConfig::with_root("/work");
        assert_eq!(config.source_dir, PathBuf::from("/work/content-source"));
        assert_eq!(config.locale_content_dir(), PathBuf::from("/work/content/en"));
        assert_eq!(config.checkpoint_dir, PathBuf::from("/work"));
        assert_eq!(config.collections.len(), 6);
        assert!(!config.force && !config.fetch_remote_assets);
    }
}
