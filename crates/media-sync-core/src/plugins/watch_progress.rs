use async_trait::async_trait;
use media_sync_config::Config;
use tracing::{debug, info};

use super::{RunContext, SyncPlugin};
use crate::error::SyncResult;
use crate::resolver::MediaPair;

/// Copies Trakt's in-progress playback position to Plex
pub struct WatchProgress;

impl WatchProgress {
    pub fn enabled(config: &Config) -> bool {
        config.sync.sync_playback_status
    }

    async fn sync(ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        let Some(playback) = ctx.state.playback(&pair.trakt).await? else {
            return Ok(());
        };
        // Plex refuses a zero offset
        if playback.progress <= 0.0 {
            return Ok(());
        }
        let Some(duration) = pair.plex.duration else {
            debug!("{}: no duration, cannot set playback progress", pair.label());
            return Ok(());
        };

        let offset = (duration as f64 * playback.progress as f64 / 100.0) as u64;
        let current = pair.plex.view_offset.unwrap_or(0);
        // within a second of each other
        if current.abs_diff(offset) < 1000 {
            return Ok(());
        }

        info!(
            "Setting playback progress of {} to {:.1}%",
            pair.label(),
            playback.progress
        );
        if !ctx.dry_run {
            ctx.plex.set_view_offset(pair.plex.rating_key, offset).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SyncPlugin for WatchProgress {
    fn name(&self) -> &'static str {
        "WatchProgress"
    }

    async fn walk_movie(&mut self, ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        Self::sync(ctx, pair).await
    }

    async fn walk_episode(&mut self, ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        Self::sync(ctx, pair).await
    }
}
