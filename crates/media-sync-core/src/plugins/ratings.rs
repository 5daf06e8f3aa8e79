use async_trait::async_trait;
use media_sync_config::Config;
use media_sync_models::{RatingSource, SyncOp};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{entry, RunContext, SyncPlugin};
use crate::error::SyncResult;
use crate::resolver::MediaPair;

/// Where a differing rating should be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RatingWrite {
    Plex(u8),
    Trakt(u8),
}

/// Decide the rating write for a pair
///
/// Missing ratings are filled from the other side in every mode; when both
/// sides differ, `priority` picks the winner and `None` leaves both alone.
pub(crate) fn rating_write(
    plex: Option<u8>,
    trakt: Option<u8>,
    priority: RatingSource,
    to_trakt: bool,
    to_plex: bool,
) -> Option<RatingWrite> {
    match (plex, trakt) {
        (p, t) if p == t => None,
        (Some(p), None) if to_trakt => Some(RatingWrite::Trakt(p)),
        (None, Some(t)) if to_plex => Some(RatingWrite::Plex(t)),
        (Some(p), Some(t)) => match priority {
            RatingSource::Plex if to_trakt => Some(RatingWrite::Trakt(p)),
            RatingSource::Trakt if to_plex => Some(RatingWrite::Plex(t)),
            _ => None,
        },
        _ => None,
    }
}

/// Reconciles user ratings; shows are rated once at the end of the walk
#[derive(Default)]
pub struct SyncRatings {
    shows: BTreeMap<u64, Arc<MediaPair>>,
}

impl SyncRatings {
    pub fn enabled(config: &Config) -> bool {
        config.sync.plex_to_trakt.ratings || config.sync.trakt_to_plex.ratings
    }

    async fn sync(ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        let plex_rating = pair.plex.rating();
        let trakt_rating = ctx.state.rating(&pair.trakt).await?;
        let sync = &ctx.config.sync;
        let write = rating_write(
            plex_rating,
            trakt_rating,
            sync.rating_priority,
            sync.plex_to_trakt.ratings,
            sync.trakt_to_plex.ratings,
        );

        match write {
            None => {
                if plex_rating != trakt_rating {
                    debug!(
                        "{}: ratings differ (Plex {:?}, Trakt {:?}), priority {}",
                        pair.label(),
                        plex_rating,
                        trakt_rating,
                        sync.rating_priority
                    );
                }
                Ok(())
            }
            Some(RatingWrite::Trakt(rating)) => {
                info!("Rating {} with {} on Trakt", pair.label(), rating);
                let entry = entry(pair).rating(rating, pair.plex.rated_at);
                ctx.queue
                    .add(SyncOp::AddRatings, pair.media_type(), entry)
                    .await
            }
            Some(RatingWrite::Plex(rating)) => {
                info!("Rating {} with {} on Plex", pair.label(), rating);
                if !ctx.dry_run {
                    ctx.plex.rate(pair.plex.rating_key, Some(rating)).await?;
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl SyncPlugin for SyncRatings {
    fn name(&self) -> &'static str {
        "SyncRatings"
    }

    async fn walk_movie(&mut self, ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        Self::sync(ctx, pair).await
    }

    async fn walk_episode(&mut self, ctx: &mut RunContext, pair: &MediaPair) -> SyncResult<()> {
        if let Some(show) = &pair.parent {
            self.shows
                .entry(show.trakt.trakt_id)
                .or_insert_with(|| show.clone());
        }
        Self::sync(ctx, pair).await
    }

    async fn fini(&mut self, ctx: &mut RunContext) -> SyncResult<()> {
        for show in std::mem::take(&mut self.shows).into_values() {
            if let Err(e) = Self::sync(ctx, &show).await {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!("{}: show rating failed: {}", show.label(), e);
            }
        }
        Ok(())
    }
}
