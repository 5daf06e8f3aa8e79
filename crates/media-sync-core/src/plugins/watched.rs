use async_trait::async_trait;
use media_sync_config::Config;
use media_sync_models::{MediaType, SyncOp};
use tracing::info;

use super::{entry, RunContext, SyncPlugin};
use crate::error::SyncResult;
use crate::resolver::MediaPair;

/// Propagates watched status in the configured directions
///
/// An episode Plex saw before its Trakt show was reset is marked unwatched
/// on Plex instead of being re-added to the Trakt history.
pub struct SyncWatched;

impl SyncWatched {
    pub fn enabled(config: &Config) -> bool {
        config.sync.plex_to_trakt.watched_status || config.sync.trakt_to_plex.watched_status
    }

    async fn sync(ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        let on_plex = pair.plex.is_watched();
        let on_trakt = ctx.state.is_watched(&pair.trakt).await?;
        if on_plex == on_trakt {
            return Ok(());
        }

        if on_plex {
            if !ctx.config.sync.plex_to_trakt.watched_status {
                return Ok(());
            }
            if let Some(reset_at) = watched_before_reset(ctx, pair).await? {
                info!(
                    "{}: show was reset on Trakt at {}, marking unwatched on Plex",
                    pair.label(),
                    reset_at
                );
                if !ctx.dry_run {
                    ctx.plex.mark_unwatched(pair.plex.rating_key).await?;
                }
                return Ok(());
            }

            info!("Marking as watched on Trakt: {}", pair.label());
            let entry = entry(pair).watched_at(pair.plex.last_viewed_at);
            ctx.queue
                .add(SyncOp::AddHistory, pair.media_type(), entry)
                .await
        } else {
            if !ctx.config.sync.trakt_to_plex.watched_status {
                return Ok(());
            }
            info!("Marking as watched on Plex: {}", pair.label());
            if !ctx.dry_run {
                ctx.plex.mark_watched(pair.plex.rating_key).await?;
            }
            Ok(())
        }
    }
}

/// Reset time of the episode's show when Plex's last view predates it
async fn watched_before_reset(
    ctx: &RunContext,
    pair: &MediaPair,
) -> SyncResult<Option<chrono::DateTime<chrono::Utc>>> {
    if pair.media_type() != MediaType::Episode {
        return Ok(None);
    }
    let Some(show_id) = pair.show_id() else {
        return Ok(None);
    };
    let Some(reset_at) = ctx.state.show_reset_at(show_id).await? else {
        return Ok(None);
    };
    Ok(match pair.plex.last_viewed_at {
        Some(viewed) if viewed < reset_at => Some(reset_at),
        _ => None,
    })
}

#[async_trait]
impl SyncPlugin for SyncWatched {
    fn name(&self) -> &'static str {
        "SyncWatched"
    }

    async fn walk_movie(&mut self, ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        Self::sync(ctx, pair).await
    }

    async fn walk_episode(&mut self, ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        Self::sync(ctx, pair).await
    }
}
