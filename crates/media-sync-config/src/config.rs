use media_sync_models::{Provider, RatingSource};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Cache TTL meaning "never cache this URL"
pub const DO_NOT_CACHE: u64 = 0;

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seconds between write queue flushes
    #[serde(default = "default_batch_delay")]
    pub batch_delay: u64,
    /// Library sections skipped during a full walk, by title
    #[serde(default, rename = "excluded-libraries")]
    pub excluded_libraries: Vec<String>,
    #[serde(default)]
    pub plex: PlexConfig,
    #[serde(default)]
    pub trakt: TraktConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default, rename = "xbmc-providers")]
    pub xbmc_providers: XbmcProviders,
    #[serde(default)]
    pub http_cache: HttpCacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlexConfig {
    #[serde(default)]
    pub server_url: String,
    /// Owner of the sessions to scrobble in watch mode
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Page size for paginated section and episode walks
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraktConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub rating_priority: RatingSource,
    #[serde(default = "default_true")]
    pub sync_playback_status: bool,
    #[serde(default)]
    pub plex_to_trakt: PlexToTrakt,
    #[serde(default)]
    pub trakt_to_plex: TraktToPlex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlexToTrakt {
    #[serde(default = "default_true")]
    pub collection: bool,
    #[serde(default)]
    pub clear_collected: bool,
    #[serde(default = "default_true")]
    pub watched_status: bool,
    #[serde(default = "default_true")]
    pub ratings: bool,
    #[serde(default = "default_true")]
    pub watchlist: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraktToPlex {
    #[serde(default = "default_true")]
    pub watched_status: bool,
    #[serde(default = "default_true")]
    pub ratings: bool,
    #[serde(default = "default_true")]
    pub liked_lists: bool,
    #[serde(default = "default_true")]
    pub watchlist: bool,
    #[serde(default)]
    pub watchlist_as_playlist: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Percent at which a stop is recorded as watched
    #[serde(default = "default_scrobble_threshold")]
    pub scrobble_threshold: u8,
    #[serde(default)]
    pub add_collection: bool,
    #[serde(default)]
    pub remove_collection: bool,
    #[serde(default = "default_true")]
    pub username_filter: bool,
    #[serde(default = "default_true")]
    pub media_progressbar: bool,
    /// Seconds to wait before re-subscribing to the Plex event stream
    #[serde(default = "default_restart_interval")]
    pub restart_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XbmcProviders {
    #[serde(default = "default_xbmc_movies")]
    pub movies: Provider,
    #[serde(default = "default_xbmc_shows")]
    pub shows: Provider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpCacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// First matching rule wins; URLs matching no rule are not cached
    #[serde(default = "default_cache_policy")]
    pub policy: Vec<CacheRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheRule {
    /// Glob over `host/path?query`, `*` matches any run of characters including `/`
    pub pattern: String,
    /// Seconds, `0` for do-not-cache
    pub ttl: u64,
}

impl CacheRule {
    pub fn new(pattern: &str, ttl: u64) -> Self {
        Self {
            pattern: pattern.to_string(),
            ttl,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_batch_delay() -> u64 {
    5
}

fn default_timeout() -> u64 {
    30
}

fn default_page_size() -> u32 {
    100
}

fn default_scrobble_threshold() -> u8 {
    80
}

fn default_restart_interval() -> u64 {
    15
}

fn default_xbmc_movies() -> Provider {
    Provider::Imdb
}

fn default_xbmc_shows() -> Provider {
    Provider::Tvdb
}

pub fn default_cache_policy() -> Vec<CacheRule> {
    vec![
        // account-specific reads and writes
        CacheRule::new("*.trakt.tv/sync/*", DO_NOT_CACHE),
        CacheRule::new("*.trakt.tv/scrobble/*", DO_NOT_CACHE),
        CacheRule::new("*.trakt.tv/users/me*", DO_NOT_CACHE),
        CacheRule::new("*.trakt.tv/users/likes/*", DO_NOT_CACHE),
        CacheRule::new("*.trakt.tv/oauth/*", DO_NOT_CACHE),
        CacheRule::new("*.trakt.tv/search/*", DAY),
        CacheRule::new("*.trakt.tv/shows/*/seasons*", DAY),
        CacheRule::new("*.trakt.tv/shows/*", WEEK),
        CacheRule::new("*.trakt.tv/movies/*", WEEK),
        CacheRule::new("*.trakt.tv/lists/*", 6 * HOUR),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_delay: default_batch_delay(),
            excluded_libraries: Vec::new(),
            plex: PlexConfig::default(),
            trakt: TraktConfig::default(),
            sync: SyncConfig::default(),
            watch: WatchConfig::default(),
            xbmc_providers: XbmcProviders::default(),
            http_cache: HttpCacheConfig::default(),
        }
    }
}

impl Default for PlexConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            username: None,
            timeout_seconds: default_timeout(),
            page_size: default_page_size(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rating_priority: RatingSource::default(),
            sync_playback_status: true,
            plex_to_trakt: PlexToTrakt::default(),
            trakt_to_plex: TraktToPlex::default(),
        }
    }
}

impl Default for PlexToTrakt {
    fn default() -> Self {
        Self {
            collection: true,
            clear_collected: false,
            watched_status: true,
            ratings: true,
            watchlist: true,
        }
    }
}

impl Default for TraktToPlex {
    fn default() -> Self {
        Self {
            watched_status: true,
            ratings: true,
            liked_lists: true,
            watchlist: true,
            watchlist_as_playlist: false,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            scrobble_threshold: default_scrobble_threshold(),
            add_collection: false,
            remove_collection: false,
            username_filter: true,
            media_progressbar: true,
            restart_interval: default_restart_interval(),
        }
    }
}

impl Default for XbmcProviders {
    fn default() -> Self {
        Self {
            movies: default_xbmc_movies(),
            shows: default_xbmc_shows(),
        }
    }
}

impl Default for HttpCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: default_cache_policy(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file if present, otherwise start from defaults
    pub fn load_or_default(path: &PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `PLEX_BASEURL`, `PLEX_USERNAME`, `TRAKT_CLIENT_ID` and `TRAKT_CLIENT_SECRET`
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("PLEX_BASEURL") {
            self.plex.server_url = url;
        }
        if let Some(username) = non_empty("PLEX_USERNAME") {
            self.plex.username = Some(username);
        }
        if let Some(id) = non_empty("TRAKT_CLIENT_ID") {
            self.trakt.client_id = id;
        }
        if let Some(secret) = non_empty("TRAKT_CLIENT_SECRET") {
            self.trakt.client_secret = secret;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.watch.scrobble_threshold > 100 {
            return Err(anyhow::anyhow!(
                "watch.scrobble_threshold must be between 0 and 100, got {}",
                self.watch.scrobble_threshold
            ));
        }

        if self.batch_delay == 0 {
            return Err(anyhow::anyhow!("batch_delay must be at least 1 second"));
        }

        if !self.is_trakt_configured() {
            return Err(anyhow::anyhow!(
                "Trakt client_id and client_secret are required (set them in config.toml or TRAKT_CLIENT_ID/TRAKT_CLIENT_SECRET)"
            ));
        }

        for provider in [&self.xbmc_providers.movies, &self.xbmc_providers.shows] {
            if !provider.is_resolvable() {
                return Err(anyhow::anyhow!(
                    "xbmc-providers must be one of imdb, tmdb, tvdb, got {}",
                    provider
                ));
            }
        }

        Ok(())
    }

    pub fn is_trakt_configured(&self) -> bool {
        !self.trakt.client_id.trim().is_empty() && !self.trakt.client_secret.trim().is_empty()
    }

    pub fn is_excluded(&self, library_title: &str) -> bool {
        self.excluded_libraries.iter().any(|l| l == library_title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn configured() -> Config {
        let mut config = Config::default();
        config.trakt.client_id = "test_id".to_string();
        config.trakt.client_secret = "test_secret".to_string();
        config
    }

    #[test]
    fn test_config_load_and_save() {
        let file = NamedTempFile::new().unwrap();
        let mut config = configured();
        config.sync.rating_priority = RatingSource::Trakt;
        config.excluded_libraries = vec!["Home Videos".to_string()];

        let path = file.path().to_path_buf();
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.trakt.client_id, "test_id");
        assert_eq!(loaded.sync.rating_priority, RatingSource::Trakt);
        assert!(loaded.is_excluded("Home Videos"));
        assert_eq!(loaded.http_cache.policy, default_cache_policy());
    }

    #[test]
    fn test_defaults_from_minimal_file() {
        let config: Config = toml::from_str(
            r#"
            [trakt]
            client_id = "a"
            client_secret = "b"

            [sync.plex_to_trakt]
            clear_collected = true

            [xbmc-providers]
            movies = "tmdb"
            "#,
        )
        .unwrap();

        assert_eq!(config.batch_delay, 5);
        assert_eq!(config.watch.scrobble_threshold, 80);
        assert_eq!(config.sync.rating_priority, RatingSource::Plex);
        assert!(config.sync.plex_to_trakt.clear_collected);
        assert!(config.sync.plex_to_trakt.collection);
        assert_eq!(config.xbmc_providers.movies, Provider::Tmdb);
        assert_eq!(config.xbmc_providers.shows, Provider::Tvdb);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_err());
        assert!(!config.is_trakt_configured());

        config = configured();
        assert!(config.validate().is_ok());

        config.watch.scrobble_threshold = 101;
        assert!(config.validate().is_err());
        config.watch.scrobble_threshold = 100;
        assert!(config.validate().is_ok());

        config.batch_delay = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PLEX_BASEURL", "http://plex:32400"),
            ("TRAKT_CLIENT_ID", "env_id"),
            ("TRAKT_CLIENT_SECRET", ""),
        ]
        .into_iter()
        .collect();

        let mut config = configured();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.plex.server_url, "http://plex:32400");
        assert_eq!(config.trakt.client_id, "env_id");
        // empty values do not clobber the file
        assert_eq!(config.trakt.client_secret, "test_secret");
        assert_eq!(config.plex.username, None);
    }
}
