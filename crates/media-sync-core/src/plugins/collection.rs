use async_trait::async_trait;
use media_sync_config::Config;
use media_sync_models::{MediaIds, MediaType, PayloadEntry, SyncOp};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::{entry, RunContext, SyncPlugin};
use crate::error::SyncResult;
use crate::resolver::MediaPair;

/// Adds walked items missing from the Trakt collection
pub struct AddCollection;

impl AddCollection {
    pub fn enabled(config: &Config) -> bool {
        config.sync.plex_to_trakt.collection
    }

    async fn add(ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        if ctx.state.is_collected(&pair.trakt).await? {
            return Ok(());
        }
        info!("Adding to collection: {}", pair.label());
        let mut entry = entry(pair);
        entry.collected_at = pair.plex.added_at;
        ctx.queue
            .add(SyncOp::AddCollection, pair.media_type(), entry)
            .await
    }
}

#[async_trait]
impl SyncPlugin for AddCollection {
    fn name(&self) -> &'static str {
        "AddCollection"
    }

    async fn walk_movie(&mut self, ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        Self::add(ctx, pair).await
    }

    async fn walk_episode(&mut self, ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        Self::add(ctx, pair).await
    }
}

/// Removes Trakt collection entries that no walked Plex item backs
///
/// Only meaningful when the whole library was walked.
#[derive(Default)]
pub struct ClearCollected {
    movies: HashSet<u64>,
    /// Show trakt id to walked (season, episode)
    episodes: HashMap<u64, HashSet<(u32, u32)>>,
}

impl ClearCollected {
    pub fn enabled(config: &Config) -> bool {
        config.sync.plex_to_trakt.clear_collected
    }
}

#[async_trait]
impl SyncPlugin for ClearCollected {
    fn name(&self) -> &'static str {
        "ClearCollected"
    }

    async fn init(&mut self, ctx: &mut RunContext) -> SyncResult<bool> {
        if ctx.partial {
            info!("Not clearing the Trakt collection on a partial walk");
            return Ok(false);
        }
        Ok(true)
    }

    async fn walk_movie(&mut self, _ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        if pair.media_type() == MediaType::Movie {
            self.movies.insert(pair.trakt.trakt_id);
        }
        Ok(())
    }

    async fn walk_episode(&mut self, _ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        if let (Some(show_id), Some(number)) = (pair.show_id(), pair.episode_number()) {
            self.episodes.entry(show_id).or_default().insert(number);
        }
        Ok(())
    }

    async fn fini(&mut self, ctx: &mut RunContext) -> SyncResult<()> {
        let mut stale_movies: Vec<u64> = ctx
            .state
            .collected_movies()
            .await?
            .iter()
            .filter(|id| !self.movies.contains(*id))
            .copied()
            .collect();
        stale_movies.sort_unstable();
        for id in stale_movies {
            debug!("Removing movie {} from collection", id);
            ctx.queue
                .add(
                    SyncOp::RemoveCollection,
                    MediaType::Movie,
                    PayloadEntry::new(MediaIds::with_trakt(id)),
                )
                .await?;
        }

        let mut stale_shows: Vec<(u64, Vec<(u32, u32)>)> = Vec::new();
        for (show_id, show) in ctx.state.collected_shows().await? {
            let walked = self.episodes.get(show_id);
            let stale: Vec<(u32, u32)> = show
                .episodes
                .keys()
                .filter(|number| !walked.is_some_and(|w| w.contains(*number)))
                .copied()
                .collect();
            if !stale.is_empty() {
                stale_shows.push((*show_id, stale));
            }
        }
        stale_shows.sort_unstable_by_key(|(id, _)| *id);
        for (show_id, stale) in stale_shows {
            debug!("Removing {} episodes of show {} from collection", stale.len(), show_id);
            ctx.queue
                .add(
                    SyncOp::RemoveCollection,
                    MediaType::Show,
                    PayloadEntry::new(MediaIds::with_trakt(show_id)).episodes(stale),
                )
                .await?;
        }
        Ok(())
    }
}
