use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;

const PLEX_TOKEN: &str = "plex_token";
const PLEX_SERVER_URL: &str = "plex_server_url";
const TRAKT_ACCESS_TOKEN: &str = "trakt_access_token";
const TRAKT_REFRESH_TOKEN: &str = "trakt_refresh_token";
const TRAKT_TOKEN_EXPIRES: &str = "trakt_token_expires";

/// Secrets kept apart from `config.toml`, as a flat TOML table
///
/// Written by `login` and by Trakt token refreshes.
pub struct CredentialStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            values: BTreeMap::new(),
        }
    }

    /// A missing file leaves the store empty
    pub fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        self.values = toml::from_str(&content).with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, toml::to_string_pretty(&self.values)?)?;
        restrict_permissions(&self.path)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: String, value: String) {
        self.values.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    pub fn get_plex_token(&self) -> Option<&String> {
        self.get(PLEX_TOKEN)
    }

    pub fn set_plex_token(&mut self, token: String) {
        self.set(PLEX_TOKEN.to_string(), token);
    }

    pub fn get_plex_server_url(&self) -> Option<&String> {
        self.get(PLEX_SERVER_URL)
    }

    pub fn set_plex_server_url(&mut self, url: String) {
        self.set(PLEX_SERVER_URL.to_string(), url);
    }

    pub fn get_trakt_access_token(&self) -> Option<&String> {
        self.get(TRAKT_ACCESS_TOKEN)
    }

    pub fn set_trakt_access_token(&mut self, token: String) {
        self.set(TRAKT_ACCESS_TOKEN.to_string(), token);
    }

    pub fn get_trakt_refresh_token(&self) -> Option<&String> {
        self.get(TRAKT_REFRESH_TOKEN)
    }

    pub fn set_trakt_refresh_token(&mut self, token: String) {
        self.set(TRAKT_REFRESH_TOKEN.to_string(), token);
    }

    /// Unparseable timestamps read as absent, which forces a refresh
    pub fn get_trakt_token_expires(&self) -> Option<DateTime<Utc>> {
        let raw = self.get(TRAKT_TOKEN_EXPIRES)?;
        DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc))
    }

    pub fn set_trakt_token_expires(&mut self, expires: DateTime<Utc>) {
        self.set(TRAKT_TOKEN_EXPIRES.to_string(), expires.to_rfc3339());
    }

    /// Drop every stored Trakt token, forcing a new device login
    pub fn clear_trakt_tokens(&mut self) {
        for key in [TRAKT_ACCESS_TOKEN, TRAKT_REFRESH_TOKEN, TRAKT_TOKEN_EXPIRES] {
            self.remove(key);
        }
    }

    /// `PLEX_TOKEN` and `PLEX_BASEURL` take precedence over stored values
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (var, key) in [("PLEX_TOKEN", PLEX_TOKEN), ("PLEX_BASEURL", PLEX_SERVER_URL)] {
            if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
                self.set(key.to_string(), value);
            }
        }
    }

    /// Stored keys in sorted order
    pub fn get_all_keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &std::path::Path) -> Result<()> {
    Ok(())
}
