mod storage;

use anyhow::Context;
use chrono::Utc;
use globset::{GlobBuilder, GlobMatcher};
use media_sync_config::{CacheRule, HttpCacheConfig, DO_NOT_CACHE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, warn};

pub use storage::CacheStorage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub body: String,
    /// Unix seconds
    pub stored_at: i64,
    pub ttl: u64,
}

impl CacheEntry {
    fn is_fresh(&self, now: i64) -> bool {
        now - self.stored_at < self.ttl as i64
    }
}

/// URL-pattern TTL cache for Trakt GET responses
///
/// Each URL is matched against the policy rules in order; the first match
/// decides the TTL. URLs matching no rule, and every URL when the cache is
/// disabled, are never cached.
pub struct HttpCache {
    enabled: bool,
    rules: Vec<(GlobMatcher, u64)>,
    entries: RwLock<HashMap<String, CacheEntry>>,
    storage: Option<CacheStorage>,
}

impl HttpCache {
    /// Fails when a policy pattern is not a valid glob
    pub fn new(config: &HttpCacheConfig) -> anyhow::Result<Self> {
        Ok(Self {
            enabled: config.enabled,
            rules: compile_policy(&config.policy)?,
            entries: RwLock::new(HashMap::new()),
            storage: None,
        })
    }

    /// Cache backed by a file, loading whatever is still there
    pub fn with_storage(config: &HttpCacheConfig, path: &Path) -> anyhow::Result<Self> {
        let rules = compile_policy(&config.policy)?;
        let storage = CacheStorage::new(path);
        let entries = if config.enabled {
            storage.load().unwrap_or_else(|e| {
                warn!("Failed to load HTTP cache from {:?}: {}", path, e);
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        Ok(Self {
            enabled: config.enabled,
            rules,
            entries: RwLock::new(entries),
            storage: Some(storage),
        })
    }

    pub fn ttl_for(&self, url: &str) -> u64 {
        if !self.enabled {
            return DO_NOT_CACHE;
        }
        let target = strip_scheme(url);
        self.rules
            .iter()
            .find(|(matcher, _)| matcher.is_match(target))
            .map(|(_, ttl)| *ttl)
            .unwrap_or(DO_NOT_CACHE)
    }

    pub fn get(&self, url: &str) -> Option<String> {
        if self.ttl_for(url) == DO_NOT_CACHE {
            return None;
        }
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(url)?;
        if entry.is_fresh(Utc::now().timestamp()) {
            debug!("HTTP cache hit: {}", url);
            Some(entry.body.clone())
        } else {
            None
        }
    }

    pub fn put(&self, url: &str, body: &str) {
        let ttl = self.ttl_for(url);
        if ttl == DO_NOT_CACHE {
            return;
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            url.to_string(),
            CacheEntry {
                body: body.to_string(),
                stored_at: Utc::now().timestamp(),
                ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry, in memory and on disk
    pub fn clear(&self) -> anyhow::Result<()> {
        self.entries.write().unwrap_or_else(|e| e.into_inner()).clear();
        if let Some(storage) = &self.storage {
            storage.remove()?;
        }
        Ok(())
    }

    /// Write fresh entries back to disk
    pub fn persist(&self) -> anyhow::Result<()> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        if !self.enabled {
            return Ok(());
        }
        let now = Utc::now().timestamp();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, entry| entry.is_fresh(now));
        storage.save(&entries)
    }
}

fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map(|(_, rest)| rest).unwrap_or(url)
}

/// Compile the policy in order; `*` also matches `/`
fn compile_policy(policy: &[CacheRule]) -> anyhow::Result<Vec<(GlobMatcher, u64)>> {
    policy
        .iter()
        .map(|rule| {
            let glob = GlobBuilder::new(&rule.pattern)
                .literal_separator(false)
                .build()
                .with_context(|| format!("invalid http_cache pattern '{}'", rule.pattern))?;
            Ok((glob.compile_matcher(), rule.ttl))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_sync_config::default_cache_policy;

    fn matches(pattern: &str, text: &str) -> bool {
        let rules = compile_policy(&[CacheRule::new(pattern, 60)]).unwrap();
        rules[0].0.is_match(text)
    }

    #[test]
    fn test_glob_match() {
        assert!(matches("*.trakt.tv/sync/*", "api.trakt.tv/sync/collection/movies"));
        assert!(matches("*.trakt.tv/shows/*/seasons*", "api.trakt.tv/shows/123/seasons?extended=episodes"));
        assert!(!matches("*.trakt.tv/shows/*/seasons*", "api.trakt.tv/shows/123"));
        assert!(matches("exact", "exact"));
        assert!(!matches("exact", "exactly"));
        assert!(matches("a*b*c", "a-b-b-c"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = HttpCacheConfig {
            enabled: true,
            policy: vec![CacheRule::new("*.trakt.tv/[movies", 86_400)],
        };
        let err = HttpCache::new(&config).err().unwrap();
        assert!(err.to_string().contains("[movies"));
    }

    #[test]
    fn test_policy_first_match_wins() {
        let cache = HttpCache::new(&HttpCacheConfig::default()).unwrap();
        assert_eq!(cache.ttl_for("https://api.trakt.tv/sync/playback"), DO_NOT_CACHE);
        assert_eq!(cache.ttl_for("https://api.trakt.tv/users/me/lists"), DO_NOT_CACHE);
        assert!(cache.ttl_for("https://api.trakt.tv/search/imdb/tt0113277?type=movie") > 0);
        assert!(cache.ttl_for("https://api.trakt.tv/shows/1/seasons?extended=episodes") > 0);
        assert_eq!(cache.ttl_for("https://example.com/other"), DO_NOT_CACHE);
    }

    #[test]
    fn test_disabled_never_caches() {
        let config = HttpCacheConfig {
            enabled: false,
            policy: default_cache_policy(),
        };
        let cache = HttpCache::new(&config).unwrap();
        let url = "https://api.trakt.tv/search/tmdb/949?type=movie";
        cache.put(url, "[]");
        assert_eq!(cache.get(url), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_get_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.bin.gz");
        let url = "https://api.trakt.tv/movies/heat";
        let write_url = "https://api.trakt.tv/sync/collection";

        let cache = HttpCache::with_storage(&HttpCacheConfig::default(), &path).unwrap();
        cache.put(url, r#"{"title":"Heat"}"#);
        cache.put(write_url, "{}");
        assert_eq!(cache.len(), 1);
        cache.persist().unwrap();

        let reloaded = HttpCache::with_storage(&HttpCacheConfig::default(), &path).unwrap();
        assert_eq!(reloaded.get(url).as_deref(), Some(r#"{"title":"Heat"}"#));

        reloaded.clear().unwrap();
        assert!(!path.exists());
        assert_eq!(reloaded.get(url), None);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.bin.gz");
        std::fs::write(&path, b"not gzip").unwrap();
        let cache = HttpCache::with_storage(&HttpCacheConfig::default(), &path).unwrap();
        assert!(cache.is_empty());
    }
}
