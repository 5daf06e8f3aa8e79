use media_sync_models::{MediaType, PayloadEntry, PlexWatchlistItem, SyncOp, TraktItem, WatchlistItem};
use media_sync_sources::PlexServer;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::SyncResult;
use crate::resolver::Resolver;
use crate::write_queue::QueueHandle;

/// Which side wins for items present on only one watchlist
#[derive(Debug, Clone, Copy)]
pub struct WatchlistDirection {
    /// Plex-only items are added to Trakt instead of removed from Plex
    pub update_trakt: bool,
    /// Trakt-only items are added to Plex instead of removed from Trakt
    pub update_plex: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct WatchlistOutcome {
    pub in_both: usize,
    pub added_to_trakt: usize,
    pub removed_from_trakt: usize,
    pub added_to_plex: usize,
    pub removed_from_plex: usize,
    pub unmatched: usize,
}

/// Set difference of the Plex and Trakt watchlists
pub struct WatchlistReconciler<'a> {
    plex: &'a dyn PlexServer,
    resolver: &'a Resolver,
    queue: &'a QueueHandle,
    direction: WatchlistDirection,
    dry_run: bool,
}

impl<'a> WatchlistReconciler<'a> {
    pub fn new(
        plex: &'a dyn PlexServer,
        resolver: &'a Resolver,
        queue: &'a QueueHandle,
        direction: WatchlistDirection,
        dry_run: bool,
    ) -> Self {
        Self {
            plex,
            resolver,
            queue,
            direction,
            dry_run,
        }
    }

    pub async fn reconcile(&self, trakt_watchlist: &[WatchlistItem]) -> SyncResult<WatchlistOutcome> {
        let mut outcome = WatchlistOutcome::default();
        let mut trakt_only: Vec<&TraktItem> = trakt_watchlist.iter().map(|w| &w.item).collect();

        let plex_watchlist = self.plex.watchlist().await?;
        debug!(
            "Watchlists: {} on Plex, {} on Trakt",
            plex_watchlist.len(),
            trakt_only.len()
        );

        for plex_item in &plex_watchlist {
            let Some(trakt) = self
                .resolver
                .find_by_guids(&plex_item.guids, plex_item.media_type, None, None)
                .await?
            else {
                debug!("Plex watchlist item '{}' not found on Trakt", plex_item.title);
                outcome.unmatched += 1;
                continue;
            };

            if let Some(position) = trakt_only.iter().position(|t| **t == trakt) {
                // the Plex discover search is inaccurate, never look these up again
                trakt_only.remove(position);
                outcome.in_both += 1;
            } else if self.direction.update_trakt {
                info!("Adding {} to Trakt watchlist", trakt.label());
                self.queue
                    .add(SyncOp::AddWatchlist, trakt.media_type, PayloadEntry::new(trakt.ids.clone()))
                    .await?;
                outcome.added_to_trakt += 1;
            } else {
                info!("Removing '{}' from Plex watchlist", plex_item.title);
                if !self.dry_run {
                    self.plex.remove_from_watchlist(&plex_item.key).await?;
                }
                outcome.removed_from_plex += 1;
            }
        }

        for trakt in trakt_only {
            if !self.direction.update_plex {
                info!("Removing {} from Trakt watchlist", trakt.label());
                self.queue
                    .add(SyncOp::RemoveWatchlist, trakt.media_type, PayloadEntry::new(trakt.ids.clone()))
                    .await?;
                outcome.removed_from_trakt += 1;
                continue;
            }

            match self.find_on_discover(trakt).await? {
                Some(found) => {
                    info!("Adding '{}' to Plex watchlist", found.title);
                    if !self.dry_run {
                        self.plex.add_to_watchlist(&found.key).await?;
                    }
                    outcome.added_to_plex += 1;
                }
                None => {
                    info!("Skipping {}, not found on Plex discover", trakt.label());
                    outcome.unmatched += 1;
                }
            }
        }

        info!(
            "Watchlist: {} in both, +{} Trakt, -{} Trakt, +{} Plex, -{} Plex",
            outcome.in_both,
            outcome.added_to_trakt,
            outcome.removed_from_trakt,
            outcome.added_to_plex,
            outcome.removed_from_plex
        );
        Ok(outcome)
    }

    /// Discover search by title, confirmed by provider id
    async fn find_on_discover(&self, trakt: &TraktItem) -> SyncResult<Option<PlexWatchlistItem>> {
        if !matches!(trakt.media_type, MediaType::Movie | MediaType::Show) {
            return Ok(None);
        }
        let candidates = self
            .plex
            .search_discover(&trakt.title, trakt.media_type, trakt.year)
            .await?;
        Ok(candidates
            .into_iter()
            .find(|c| c.guids.iter().any(|g| trakt.ids.matches(g))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::RateGovernor;
    use crate::retry::RetryPolicy;
    use crate::testing::{movie, FakePlex, FakeTrakt, PlexCall};
    use crate::write_queue::{TraktWriter, WriteQueue};
    use media_sync_models::{Guid, MediaIds, Provider};
    use std::sync::Arc;
    use std::time::Duration;

    fn trakt_movie(id: u64, title: &str, imdb: &str) -> TraktItem {
        let mut item = movie(id, title);
        item.ids = MediaIds {
            trakt: Some(id),
            imdb: Some(imdb.to_string()),
            ..Default::default()
        };
        item
    }

    fn plex_entry(key: &str, title: &str, imdb: &str) -> PlexWatchlistItem {
        PlexWatchlistItem::new(key, MediaType::Movie, title, vec![Guid::new(Provider::Imdb, imdb)])
    }

    struct Fixture {
        plex: FakePlex,
        trakt: Arc<FakeTrakt>,
        resolver: Resolver,
        trakt_watchlist: Vec<WatchlistItem>,
    }

    /// Heat on both sides, Ronin only on Plex, Alien only on Trakt
    fn fixture() -> Fixture {
        let trakt = FakeTrakt::default();
        let heat = trakt_movie(1, "Heat", "tt0113277");
        let ronin = trakt_movie(2, "Ronin", "tt0122690");
        let alien = trakt_movie(3, "Alien", "tt0078748");
        trakt.add_search(Provider::Imdb, "tt0113277", heat.clone());
        trakt.add_search(Provider::Imdb, "tt0122690", ronin);
        let trakt = Arc::new(trakt);

        let plex = FakePlex::default();
        plex.watchlist.lock().unwrap().extend([
            plex_entry("heat", "Heat", "tt0113277"),
            plex_entry("ronin", "Ronin", "tt0122690"),
        ]);
        plex.discover
            .lock()
            .unwrap()
            .push(plex_entry("alien", "Alien", "tt0078748"));

        Fixture {
            plex,
            resolver: Resolver::new(trakt.clone(), RetryPolicy::default()),
            trakt,
            trakt_watchlist: [heat, alien]
                .into_iter()
                .map(|item| WatchlistItem { item, listed_at: None })
                .collect(),
        }
    }

    async fn run(fixture: &Fixture, direction: WatchlistDirection) -> WatchlistOutcome {
        let writer = TraktWriter::new(fixture.trakt.clone(), Arc::new(RateGovernor::default()), RetryPolicy::default());
        let queue = WriteQueue::start(writer, Duration::from_secs(5));
        let handle = queue.handle();
        let outcome = WatchlistReconciler::new(&fixture.plex, &fixture.resolver, &handle, direction, false)
            .reconcile(&fixture.trakt_watchlist)
            .await
            .unwrap();
        queue.close().await.unwrap();
        outcome
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_write_per_one_sided_item_both_directions() {
        let fixture = fixture();
        let outcome = run(
            &fixture,
            WatchlistDirection {
                update_trakt: true,
                update_plex: true,
            },
        )
        .await;

        assert_eq!(outcome.in_both, 1);
        assert_eq!(outcome.added_to_trakt, 1);
        assert_eq!(outcome.added_to_plex, 1);
        assert_eq!(fixture.plex.writes(), vec![PlexCall::AddToWatchlist("alien".to_string())]);
        let added = fixture.trakt.syncs_for(SyncOp::AddWatchlist);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].movies[0].ids.trakt, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_removals_when_sides_are_not_updated() {
        let fixture = fixture();
        let outcome = run(
            &fixture,
            WatchlistDirection {
                update_trakt: false,
                update_plex: false,
            },
        )
        .await;

        assert_eq!(outcome.removed_from_plex, 1);
        assert_eq!(outcome.removed_from_trakt, 1);
        assert_eq!(
            fixture.plex.writes(),
            vec![PlexCall::RemoveFromWatchlist("ronin".to_string())]
        );
        let removed = fixture.trakt.syncs_for(SyncOp::RemoveWatchlist);
        assert_eq!(removed[0].movies[0].ids.trakt, Some(3));
        assert!(fixture.trakt.syncs_for(SyncOp::AddWatchlist).is_empty());
    }
}
