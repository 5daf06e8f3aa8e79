use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

const BASE_PATH_VAR: &str = "PLEXTRAKTSYNC_BASE_PATH";
const CONTAINER_BASE: &str = "/app";

/// Base directory of the container layout, `PLEXTRAKTSYNC_BASE_PATH` or `/app`
pub fn container_base_path() -> PathBuf {
    std::env::var(BASE_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(CONTAINER_BASE))
}

/// Where config, credentials, caches and logs live
///
/// Config and credentials sit directly in the base directory, the HTTP cache
/// under `data/cache` and the watch logs under `logs`.
#[derive(Debug, Clone)]
pub struct PathManager {
    base: PathBuf,
}

impl PathManager {
    /// Per-user layout, `~/.config/plextraktsync` on Linux
    pub fn new() -> Result<Self> {
        let config_root = dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(Self::with_base(config_root.join("plextraktsync")))
    }

    pub fn from_docker_env() -> Self {
        Self::with_base(container_base_path())
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_dir(&self) -> &Path {
        &self.base
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base.join("data")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.base.join("logs")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir().join("cache")
    }

    /// Persisted Trakt HTTP response cache
    pub fn http_cache_file(&self) -> PathBuf {
        self.cache_dir().join("trakt_http_cache.bin.gz")
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.toml")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.base.join("credentials.toml")
    }

    /// Prefix of the daily-rotated log written by `watch`
    pub fn watch_log_prefix(&self) -> &'static str {
        "plextraktsync-watch.log"
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.base.clone(), self.log_dir(), self.cache_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| anyhow!("Failed to create {}: {}", dir.display(), e))?;
        }
        Ok(())
    }
}

impl Default for PathManager {
    /// An explicit base path or an existing container base wins over the per-user layout
    fn default() -> Self {
        if std::env::var_os(BASE_PATH_VAR).is_some() || Path::new(CONTAINER_BASE).exists() {
            return Self::from_docker_env();
        }
        Self::new().unwrap_or_else(|_| Self::from_docker_env())
    }
}
