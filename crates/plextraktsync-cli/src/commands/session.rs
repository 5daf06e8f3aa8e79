use color_eyre::eyre::eyre;
use color_eyre::Result;
use media_sync_config::{Config, CredentialStore, PathManager};
use media_sync_sources::trakt::auth;
use media_sync_sources::{HttpCache, PlexHttpClient, TraktClient, XbmcFallback};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration and credentials as loaded from disk and the environment
pub struct Session {
    pub config: Config,
    pub credentials: CredentialStore,
}

/// Connected Plex and Trakt clients
pub struct Clients {
    pub plex: Arc<PlexHttpClient>,
    pub trakt: Arc<TraktClient>,
    pub cache: Arc<HttpCache>,
}

impl Session {
    pub fn load(paths: &PathManager) -> Result<Self> {
        let config_file = paths.config_file();
        let mut config = Config::load_or_default(&config_file)
            .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
        config.apply_env();

        let credentials_file = paths.credentials_file();
        let mut credentials = CredentialStore::new(credentials_file.clone());
        credentials
            .load()
            .map_err(|e| eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;
        credentials.apply_env();

        Ok(Self { config, credentials })
    }

    /// Plex server URL from the config, falling back to the one saved by `login`
    pub fn plex_server_url(&self) -> Option<String> {
        if !self.config.plex.server_url.trim().is_empty() {
            return Some(self.config.plex.server_url.clone());
        }
        self.credentials.get_plex_server_url().cloned()
    }

    /// Validate the config and build both clients, refreshing the Trakt token when due
    pub async fn connect(&mut self, paths: &PathManager) -> Result<Clients> {
        self.config
            .validate()
            .map_err(|e| eyre!("Invalid configuration: {}", e))?;

        let token = self
            .credentials
            .get_plex_token()
            .cloned()
            .ok_or_else(|| eyre!("No Plex token found, run `plextraktsync login` first"))?;
        let server_url = self
            .plex_server_url()
            .ok_or_else(|| eyre!("No Plex server URL configured, run `plextraktsync login` first"))?;

        let timeout = Duration::from_secs(self.config.plex.timeout_seconds);
        let xbmc = XbmcFallback {
            movies: self.config.xbmc_providers.movies.clone(),
            shows: self.config.xbmc_providers.shows.clone(),
        };
        let plex = PlexHttpClient::new(&server_url, &token, timeout, xbmc)
            .map_err(|e| eyre!("Failed to create Plex client for {}: {}", server_url, e))?;
        debug!("Plex client ready for {}", server_url);

        let client_id = self.config.trakt.client_id.clone();
        let client_secret = self.config.trakt.client_secret.clone();
        let access_token = auth::access_token(&mut self.credentials, &client_id, &client_secret)
            .await
            .map_err(|e| eyre!("Trakt authentication failed: {}", e))?;

        if let Err(e) = paths.ensure_directories() {
            warn!("Could not create data directories: {}", e);
        }
        let cache = HttpCache::with_storage(&self.config.http_cache, &paths.http_cache_file())
            .map_err(|e| eyre!("Invalid HTTP cache policy: {:#}", e))?;
        let cache = Arc::new(cache);
        debug!("HTTP cache loaded with {} entries", cache.len());

        let trakt = TraktClient::new(client_id, access_token, cache.clone(), timeout);

        Ok(Clients {
            plex: Arc::new(plex),
            trakt: Arc::new(trakt),
            cache,
        })
    }
}

impl Clients {
    /// Write the HTTP cache back to disk; failures only cost a warm start
    pub fn persist_cache(&self) {
        if let Err(e) = self.cache.persist() {
            warn!("Failed to persist HTTP cache: {}", e);
        }
    }
}
