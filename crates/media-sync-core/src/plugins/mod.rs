//! Per-facet reconcilers run by the sync walk

mod collection;
mod lists;
mod ratings;
mod watch_progress;
mod watched;
mod watchlist;

pub use collection::{AddCollection, ClearCollected};
pub use lists::{LikedLists, TraktLists};
pub use ratings::SyncRatings;
pub use watch_progress::WatchProgress;
pub use watched::SyncWatched;
pub use watchlist::WatchList;

use async_trait::async_trait;
use media_sync_config::Config;
use media_sync_models::PayloadEntry;
use media_sync_sources::PlexServer;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::list_collection::ListCollection;
use crate::resolver::{MediaPair, Resolver};
use crate::trakt_state::TraktState;
use crate::walker::WalkVisitor;
use crate::write_queue::QueueHandle;

/// Everything a plugin may read or write during one run
pub struct RunContext {
    pub plex: Arc<dyn PlexServer>,
    pub state: Arc<TraktState>,
    pub resolver: Arc<Resolver>,
    pub queue: QueueHandle,
    pub config: Arc<Config>,
    /// Filters are set or a kind is disabled
    pub partial: bool,
    pub walk_watchlist: bool,
    pub dry_run: bool,
    pub lists: ListCollection,
}

/// Trakt batch entry for a pair
pub(crate) fn entry(pair: &MediaPair) -> PayloadEntry {
    PayloadEntry::new(pair.trakt.ids.clone())
}

#[async_trait]
pub trait SyncPlugin: Send {
    fn name(&self) -> &'static str;

    /// Prepare for the walk; `Ok(false)` drops the plugin from this run
    async fn init(&mut self, _ctx: &mut RunContext) -> SyncResult<bool> {
        Ok(true)
    }

    async fn walk_movie(&mut self, _ctx: &mut RunContext, _pair: &MediaPair) -> SyncResult<()> {
        Ok(())
    }

    async fn walk_episode(&mut self, _ctx: &mut RunContext, _pair: &MediaPair) -> SyncResult<()> {
        Ok(())
    }

    async fn fini(&mut self, _ctx: &mut RunContext) -> SyncResult<()> {
        Ok(())
    }
}

/// Plugins enabled by `config`, in hook order
///
/// `TraktLists` comes last so its `init` sees every list the other plugins
/// registered.
pub fn enabled_plugins(config: &Config) -> Vec<Box<dyn SyncPlugin>> {
    let mut plugins: Vec<Box<dyn SyncPlugin>> = Vec::new();
    if ClearCollected::enabled(config) {
        plugins.push(Box::new(ClearCollected::default()));
    }
    if AddCollection::enabled(config) {
        plugins.push(Box::new(AddCollection));
    }
    if SyncWatched::enabled(config) {
        plugins.push(Box::new(SyncWatched));
    }
    if SyncRatings::enabled(config) {
        plugins.push(Box::new(SyncRatings::default()));
    }
    if WatchProgress::enabled(config) {
        plugins.push(Box::new(WatchProgress));
    }
    if LikedLists::enabled(config) {
        plugins.push(Box::new(LikedLists));
    }
    if WatchList::enabled(config) {
        plugins.push(Box::new(WatchList));
    }
    if TraktLists::enabled(config) {
        plugins.push(Box::new(TraktLists));
    }
    plugins
}

/// Runs the plugin hooks and receives the walk
///
/// A failing item is logged and skipped; only fatal errors stop the run.
pub struct PluginManager {
    plugins: Vec<Box<dyn SyncPlugin>>,
    ctx: RunContext,
}

fn skip_item(plugin: &str, pair: &MediaPair, result: SyncResult<()>) -> SyncResult<()> {
    match result {
        Err(e) if !e.is_fatal() => {
            warn!("{}: {} failed, skipping: {}", plugin, pair.label(), e);
            Ok(())
        }
        other => other,
    }
}

impl PluginManager {
    pub fn new(plugins: Vec<Box<dyn SyncPlugin>>, ctx: RunContext) -> Self {
        Self { plugins, ctx }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub async fn init(&mut self) -> SyncResult<()> {
        let mut kept = Vec::with_capacity(self.plugins.len());
        for mut plugin in std::mem::take(&mut self.plugins) {
            if plugin.init(&mut self.ctx).await? {
                kept.push(plugin);
            } else {
                debug!("Plugin {} disabled for this run", plugin.name());
            }
        }
        self.plugins = kept;
        info!("Sync plugins: {}", self.names().join(", "));
        Ok(())
    }

    pub async fn fini(&mut self) -> SyncResult<()> {
        for plugin in self.plugins.iter_mut() {
            match plugin.fini(&mut self.ctx).await {
                Err(e) if !e.is_fatal() => warn!("{}: finishing failed: {}", plugin.name(), e),
                other => other?,
            }
        }
        Ok(())
    }

    pub fn into_context(self) -> RunContext {
        self.ctx
    }
}

#[async_trait]
impl WalkVisitor for PluginManager {
    async fn visit_movie(&mut self, pair: &MediaPair) -> SyncResult<()> {
        for plugin in self.plugins.iter_mut() {
            let result = plugin.walk_movie(&mut self.ctx, pair).await;
            skip_item(plugin.name(), pair, result)?;
        }
        Ok(())
    }

    async fn visit_episode(&mut self, pair: &MediaPair) -> SyncResult<()> {
        for plugin in self.plugins.iter_mut() {
            let result = plugin.walk_episode(&mut self.ctx, pair).await;
            skip_item(plugin.name(), pair, result)?;
        }
        Ok(())
    }
}
