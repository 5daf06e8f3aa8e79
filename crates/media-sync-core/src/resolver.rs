use media_sync_models::{Guid, MediaType, PlexItem, Provider, TraktItem};
use media_sync_sources::{SourceError, TraktApi};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::episode_lookup::EpisodeLookup;
use crate::error::{SyncError, SyncResult};
use crate::retry::RetryPolicy;

/// A Plex item tied to the Trakt item it resolved to
///
/// Episodes keep their show's pair as `parent`; the show never points back
/// at its episodes.
#[derive(Debug, Clone)]
pub struct MediaPair {
    pub plex: PlexItem,
    pub trakt: TraktItem,
    pub parent: Option<Arc<MediaPair>>,
}

impl MediaPair {
    pub fn new(plex: PlexItem, trakt: TraktItem, parent: Option<Arc<MediaPair>>) -> Self {
        Self { plex, trakt, parent }
    }

    pub fn media_type(&self) -> MediaType {
        self.trakt.media_type
    }

    /// Trakt id of the show this episode belongs to
    pub fn show_id(&self) -> Option<u64> {
        self.parent
            .as_ref()
            .map(|p| p.trakt.trakt_id)
            .or(self.trakt.show_id)
    }

    /// Season and episode number, Trakt's numbering first
    pub fn episode_number(&self) -> Option<(u32, u32)> {
        let season = self.trakt.season.or(self.plex.season_number)?;
        let number = self.trakt.number.or(self.plex.episode_number)?;
        Some((season, number))
    }

    pub fn label(&self) -> String {
        self.plex.label()
    }
}

/// Maps Plex items to Trakt items through their ordered guids
pub struct Resolver {
    trakt: Arc<dyn TraktApi>,
    retry: RetryPolicy,
    lookups: Mutex<HashMap<u64, Arc<EpisodeLookup>>>,
}

impl Resolver {
    pub fn new(trakt: Arc<dyn TraktApi>, retry: RetryPolicy) -> Self {
        Self {
            trakt,
            retry,
            lookups: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `plex` to a pair, trying each guid in priority order
    ///
    /// `Ok(None)` means the item cannot be matched and should be skipped.
    /// Episodes should be passed their show's pair as `parent` when known.
    pub async fn resolve(&self, plex: &PlexItem, parent: Option<Arc<MediaPair>>) -> SyncResult<Option<MediaPair>> {
        if plex.guids.is_empty() {
            debug!("{}: no guids, skipping", plex.label());
            return Ok(None);
        }

        if let Some(trakt) = self
            .find_by_guids(&plex.guids, plex.media_type, Some(plex), parent.as_deref())
            .await?
        {
            return Ok(Some(MediaPair::new(plex.clone(), trakt, parent)));
        }

        if plex.media_type == MediaType::Movie {
            if let Some(show) = self.find_movie_as_show(plex).await? {
                return Ok(Some(MediaPair::new(plex.clone(), show, parent)));
            }
        }

        debug!(
            "{}: not found on Trakt ({})",
            plex.label(),
            plex.guids.iter().map(|g| g.to_string()).collect::<Vec<_>>().join(", ")
        );
        Ok(None)
    }

    /// First Trakt match among `guids`, which are expected in priority order
    pub async fn find_by_guids(
        &self,
        guids: &[Guid],
        media_type: MediaType,
        plex: Option<&PlexItem>,
        parent: Option<&MediaPair>,
    ) -> SyncResult<Option<TraktItem>> {
        for guid in guids {
            if let Some(found) = self.find_by_guid(guid, media_type, plex, parent).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    pub async fn find_by_guid(
        &self,
        guid: &Guid,
        media_type: MediaType,
        plex: Option<&PlexItem>,
        parent: Option<&MediaPair>,
    ) -> SyncResult<Option<TraktItem>> {
        if media_type == MediaType::Season {
            return Ok(None);
        }
        if !guid.provider.is_resolvable() {
            debug!("Skipping non-resolvable guid {}", guid);
            return Ok(None);
        }

        if media_type == MediaType::Episode {
            if let Some(show) = parent {
                return self.find_episode(&show.trakt, guid, plex).await;
            }
            if guid.is_episode_encoded() {
                let Some(show) = self.search(&guid.provider, &guid.id, MediaType::Show).await? else {
                    return Ok(None);
                };
                return self.find_episode(&show, guid, plex).await;
            }
        }

        if guid.provider == Provider::Tvdb && media_type == MediaType::Movie {
            return Ok(None);
        }
        if !guid.is_valid_id() {
            warn!("Invalid {} id '{}', skipping", guid.provider, guid.id);
            return Ok(None);
        }

        self.search(&guid.provider, &guid.id, media_type).await
    }

    async fn find_episode(&self, show: &TraktItem, guid: &Guid, plex: Option<&PlexItem>) -> SyncResult<Option<TraktItem>> {
        let lookup = self.episode_lookup(show).await?;

        // legacy guid carries the show id, the numbers are authoritative
        if let (true, Some(season), Some(episode)) = (guid.is_episode_encoded(), guid.season, guid.episode) {
            return Ok(lookup.from_number(season, episode).cloned());
        }

        let season = plex.and_then(|p| p.season_number);
        let episode = plex.and_then(|p| p.episode_number);
        if let Some(found) = lookup.find(guid, season, episode) {
            return Ok(Some(found));
        }

        if guid.legacy && guid.is_valid_id() {
            debug!("{}: trying {} as a direct episode lookup", show.label(), guid);
            return self.search(&guid.provider, &guid.id, MediaType::Episode).await;
        }
        Ok(None)
    }

    /// Some agents match a TV special as a movie; accept the show when the titles agree
    async fn find_movie_as_show(&self, plex: &PlexItem) -> SyncResult<Option<TraktItem>> {
        for guid in &plex.guids {
            if !guid.provider.is_resolvable() || !guid.is_valid_id() {
                continue;
            }
            if let Some(show) = self.search(&guid.provider, &guid.id, MediaType::Show).await? {
                if show.title == plex.title {
                    warn!(
                        "{}: matched Trakt show '{}' via {}, Plex agent reports it as a movie",
                        plex.label(),
                        show.title,
                        guid
                    );
                    return Ok(Some(show));
                }
            }
        }
        Ok(None)
    }

    /// Episode table of `show`, fetched once per run
    pub async fn episode_lookup(&self, show: &TraktItem) -> SyncResult<Arc<EpisodeLookup>> {
        if let Some(lookup) = self.lookups.lock().await.get(&show.trakt_id) {
            return Ok(lookup.clone());
        }

        let episodes = self
            .retry
            .run("show_episodes", &show.trakt_id.to_string(), || self.trakt.show_episodes(show))
            .await?;
        debug!("Loaded {} episodes of {}", episodes.len(), show.label());
        let lookup = Arc::new(EpisodeLookup::new(show.clone(), episodes));
        self.lookups
            .lock()
            .await
            .insert(show.trakt_id, lookup.clone());
        Ok(lookup)
    }

    async fn search(&self, provider: &Provider, id: &str, media_type: MediaType) -> SyncResult<Option<TraktItem>> {
        let args = format!("{}, {}, {}", id, provider, media_type);
        let result = self
            .retry
            .run("search_by_id", &args, || self.trakt.search_by_id(provider, id, media_type))
            .await;

        let results = match result {
            Ok(results) => results,
            Err(SyncError::Source(SourceError::NotFound(_))) => return Ok(None),
            Err(e) => return Err(e),
        };
        if results.len() > 1 {
            debug!("search_by_id({}) returned {} results, using the first", args, results.len());
        }
        Ok(results.into_iter().next())
    }
}
