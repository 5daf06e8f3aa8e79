use async_trait::async_trait;
use media_sync_config::Config;
use media_sync_models::{ListEntry, TraktList};
use tracing::info;

use super::{RunContext, SyncPlugin};
use crate::error::SyncResult;
use crate::watchlist::{WatchlistDirection, WatchlistReconciler};

pub const WATCHLIST_PLAYLIST: &str = "Trakt Watchlist";

/// Reconciles the Plex and Trakt watchlists once the walk is done
pub struct WatchList;

impl WatchList {
    pub fn enabled(config: &Config) -> bool {
        let sync = &config.sync;
        sync.plex_to_trakt.watchlist || sync.trakt_to_plex.watchlist || sync.trakt_to_plex.watchlist_as_playlist
    }
}

#[async_trait]
impl SyncPlugin for WatchList {
    fn name(&self) -> &'static str {
        "WatchList"
    }

    async fn init(&mut self, ctx: &mut RunContext) -> SyncResult<bool> {
        if ctx.config.sync.trakt_to_plex.watchlist_as_playlist && !ctx.partial {
            let items = ctx
                .state
                .watchlist()
                .await?
                .iter()
                .enumerate()
                .map(|(position, w)| ListEntry {
                    rank: position as u32 + 1,
                    item: w.item.clone(),
                })
                .collect();
            ctx.lists.add_list(&TraktList {
                trakt_id: 0,
                name: WATCHLIST_PLAYLIST.to_string(),
                items,
            });
        }
        Ok(true)
    }

    async fn fini(&mut self, ctx: &mut RunContext) -> SyncResult<()> {
        let sync = &ctx.config.sync;
        if !ctx.walk_watchlist || !(sync.plex_to_trakt.watchlist || sync.trakt_to_plex.watchlist) {
            return Ok(());
        }
        let direction = WatchlistDirection {
            update_trakt: sync.plex_to_trakt.watchlist,
            update_plex: sync.trakt_to_plex.watchlist,
        };
        let trakt_watchlist = ctx.state.watchlist().await?;
        info!("Syncing watchlists");
        WatchlistReconciler::new(ctx.plex.as_ref(), &ctx.resolver, &ctx.queue, direction, ctx.dry_run)
            .reconcile(trakt_watchlist)
            .await?;
        Ok(())
    }
}
