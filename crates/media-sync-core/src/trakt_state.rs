use chrono::{DateTime, Utc};
use media_sync_models::{
    ListRef, MediaType, PlaybackProgress, Rating, ShowEpisodes, TraktItem, WatchlistItem,
};
use media_sync_sources::TraktApi;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::retry::RetryPolicy;

/// The Trakt account as seen by one sync run
///
/// Every listing is fetched on first use and kept for the rest of the run.
pub struct TraktState {
    trakt: Arc<dyn TraktApi>,
    retry: RetryPolicy,
    collected_movies: OnceCell<HashSet<u64>>,
    collected_shows: OnceCell<HashMap<u64, ShowEpisodes>>,
    watched_movies: OnceCell<HashSet<u64>>,
    watched_shows: OnceCell<HashMap<u64, ShowEpisodes>>,
    movie_ratings: OnceCell<HashMap<u64, Rating>>,
    show_ratings: OnceCell<HashMap<u64, Rating>>,
    episode_ratings: OnceCell<HashMap<u64, Rating>>,
    watchlist: OnceCell<Vec<WatchlistItem>>,
    liked_lists: OnceCell<Vec<ListRef>>,
    playback: OnceCell<HashMap<(MediaType, u64), PlaybackProgress>>,
}

fn by_show(shows: Vec<ShowEpisodes>) -> HashMap<u64, ShowEpisodes> {
    shows.into_iter().map(|s| (s.trakt_id, s)).collect()
}

impl TraktState {
    pub fn new(trakt: Arc<dyn TraktApi>, retry: RetryPolicy) -> Self {
        Self {
            trakt,
            retry,
            collected_movies: OnceCell::new(),
            collected_shows: OnceCell::new(),
            watched_movies: OnceCell::new(),
            watched_shows: OnceCell::new(),
            movie_ratings: OnceCell::new(),
            show_ratings: OnceCell::new(),
            episode_ratings: OnceCell::new(),
            watchlist: OnceCell::new(),
            liked_lists: OnceCell::new(),
            playback: OnceCell::new(),
        }
    }

    pub async fn collected_movies(&self) -> SyncResult<&HashSet<u64>> {
        self.collected_movies
            .get_or_try_init(|| async {
                let movies = self
                    .retry
                    .run("collected_movies", "", || self.trakt.collected_movies())
                    .await?;
                debug!("Loaded {} collected movies", movies.len());
                Ok(movies.into_iter().map(|m| m.trakt_id).collect())
            })
            .await
    }

    pub async fn collected_shows(&self) -> SyncResult<&HashMap<u64, ShowEpisodes>> {
        self.collected_shows
            .get_or_try_init(|| async {
                let shows = self
                    .retry
                    .run("collected_shows", "", || self.trakt.collected_shows())
                    .await?;
                debug!("Loaded {} collected shows", shows.len());
                Ok(by_show(shows))
            })
            .await
    }

    pub async fn watched_movies(&self) -> SyncResult<&HashSet<u64>> {
        self.watched_movies
            .get_or_try_init(|| async {
                let movies = self
                    .retry
                    .run("watched_movies", "", || self.trakt.watched_movies())
                    .await?;
                debug!("Loaded {} watched movies", movies.len());
                Ok(movies.into_iter().map(|m| m.trakt_id).collect())
            })
            .await
    }

    pub async fn watched_shows(&self) -> SyncResult<&HashMap<u64, ShowEpisodes>> {
        self.watched_shows
            .get_or_try_init(|| async {
                let shows = self
                    .retry
                    .run("watched_shows", "", || self.trakt.watched_shows())
                    .await?;
                debug!("Loaded {} watched shows", shows.len());
                Ok(by_show(shows))
            })
            .await
    }

    /// Whether a movie, or an episode by show and number, is in the Trakt collection
    pub async fn is_collected(&self, item: &TraktItem) -> SyncResult<bool> {
        match item.media_type {
            MediaType::Movie => Ok(self.collected_movies().await?.contains(&item.trakt_id)),
            MediaType::Episode => {
                let (Some(show_id), Some(season), Some(number)) = (item.show_id, item.season, item.number) else {
                    return Ok(false);
                };
                Ok(self
                    .collected_shows()
                    .await?
                    .get(&show_id)
                    .is_some_and(|show| show.episodes.contains_key(&(season, number))))
            }
            MediaType::Show => Ok(self.collected_shows().await?.contains_key(&item.trakt_id)),
            MediaType::Season => Ok(false),
        }
    }

    /// Whether Trakt has a watch of the item that is not voided by a show reset
    pub async fn is_watched(&self, item: &TraktItem) -> SyncResult<bool> {
        match item.media_type {
            MediaType::Movie => Ok(self.watched_movies().await?.contains(&item.trakt_id)),
            MediaType::Episode => {
                let (Some(show_id), Some(season), Some(number)) = (item.show_id, item.season, item.number) else {
                    return Ok(false);
                };
                Ok(self
                    .watched_shows()
                    .await?
                    .get(&show_id)
                    .is_some_and(|show| show.has_episode(season, number)))
            }
            MediaType::Show => Ok(self.watched_shows().await?.contains_key(&item.trakt_id)),
            MediaType::Season => Ok(false),
        }
    }

    /// `reset_at` of a watched show
    pub async fn show_reset_at(&self, show_id: u64) -> SyncResult<Option<DateTime<Utc>>> {
        Ok(self
            .watched_shows()
            .await?
            .get(&show_id)
            .and_then(|show| show.reset_at))
    }

    async fn ratings_of(&self, media_type: MediaType) -> SyncResult<&HashMap<u64, Rating>> {
        let cell = match media_type {
            MediaType::Movie => &self.movie_ratings,
            MediaType::Show => &self.show_ratings,
            _ => &self.episode_ratings,
        };
        cell.get_or_try_init(|| async {
            let ratings = self
                .retry
                .run("ratings", media_type.plural(), || self.trakt.ratings(media_type))
                .await?;
            debug!("Loaded {} {} ratings", ratings.len(), media_type);
            Ok(ratings.into_iter().map(|r| (r.trakt_id, r)).collect())
        })
        .await
    }

    pub async fn rating(&self, item: &TraktItem) -> SyncResult<Option<u8>> {
        if item.media_type == MediaType::Season {
            return Ok(None);
        }
        Ok(self
            .ratings_of(item.media_type)
            .await?
            .get(&item.trakt_id)
            .map(|r| r.rating))
    }

    pub async fn watchlist(&self) -> SyncResult<&Vec<WatchlistItem>> {
        self.watchlist
            .get_or_try_init(|| async {
                self.retry
                    .run("watchlist", "", || self.trakt.watchlist())
                    .await
            })
            .await
    }

    pub async fn liked_lists(&self) -> SyncResult<&Vec<ListRef>> {
        self.liked_lists
            .get_or_try_init(|| async {
                self.retry
                    .run("liked_lists", "", || self.trakt.liked_lists())
                    .await
            })
            .await
    }

    /// In-progress playback of the item, if Trakt has one
    pub async fn playback(&self, item: &TraktItem) -> SyncResult<Option<&PlaybackProgress>> {
        let playback = self
            .playback
            .get_or_try_init(|| async {
                let progress = self
                    .retry
                    .run("playback", "", || self.trakt.playback())
                    .await?;
                debug!("Loaded {} playback entries", progress.len());
                Ok::<_, SyncError>(progress.into_iter().map(|p| (p.item.key(), p)).collect())
            })
            .await?;
        Ok(playback.get(&item.key()))
    }

    pub fn trakt(&self) -> &Arc<dyn TraktApi> {
        &self.trakt
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }
}
