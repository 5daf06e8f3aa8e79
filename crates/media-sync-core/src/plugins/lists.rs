use async_trait::async_trait;
use media_sync_config::Config;
use tracing::info;

use super::{RunContext, SyncPlugin};
use crate::error::SyncResult;
use crate::resolver::MediaPair;

/// Registers the user's liked Trakt lists for rendering as playlists
pub struct LikedLists;

impl LikedLists {
    pub fn enabled(config: &Config) -> bool {
        config.sync.trakt_to_plex.liked_lists
    }
}

#[async_trait]
impl SyncPlugin for LikedLists {
    fn name(&self) -> &'static str {
        "LikedLists"
    }

    async fn init(&mut self, ctx: &mut RunContext) -> SyncResult<bool> {
        if ctx.partial {
            info!("Not syncing liked lists on a partial walk");
            return Ok(false);
        }
        let liked = ctx.state.liked_lists().await?.clone();
        info!("Syncing {} liked lists", liked.len());
        ctx.lists.add_refs(liked);
        Ok(true)
    }
}

/// Collects walked items into their Trakt lists and writes the playlists
pub struct TraktLists;

impl TraktLists {
    pub fn enabled(config: &Config) -> bool {
        config.sync.trakt_to_plex.liked_lists || config.sync.trakt_to_plex.watchlist_as_playlist
    }
}

#[async_trait]
impl SyncPlugin for TraktLists {
    fn name(&self) -> &'static str {
        "TraktLists"
    }

    async fn init(&mut self, ctx: &mut RunContext) -> SyncResult<bool> {
        ctx.lists.load_pending(&ctx.state).await?;
        Ok(!ctx.lists.is_empty())
    }

    async fn walk_movie(&mut self, ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        ctx.lists.offer(pair);
        Ok(())
    }

    async fn walk_episode(&mut self, ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        ctx.lists.offer(pair);
        Ok(())
    }

    async fn fini(&mut self, ctx: &mut RunContext) -> SyncResult<()> {
        if ctx.dry_run {
            for list in ctx.lists.lists() {
                info!("[dry-run] Would update playlist '{}' with {} items", list.name, list.len());
            }
            return Ok(());
        }
        let updated = ctx.lists.sync(ctx.plex.as_ref()).await?;
        info!("Updated {} playlists", updated);
        Ok(())
    }
}
