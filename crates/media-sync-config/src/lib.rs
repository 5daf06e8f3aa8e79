pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{
    default_cache_policy, CacheRule, Config, HttpCacheConfig, PlexConfig, PlexToTrakt, SyncConfig,
    TraktConfig, TraktToPlex, WatchConfig, XbmcProviders, DO_NOT_CACHE,
};
pub use credentials::CredentialStore;
pub use paths::{container_base_path, PathManager};
