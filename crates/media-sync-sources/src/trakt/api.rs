//! Trakt response shapes and their conversion into the shared models

use chrono::{DateTime, Utc};
use media_sync_models::{
    ListEntry, ListRef, MediaIds, MediaType, PlaybackProgress, Rating, ShowEpisodes, TraktItem,
    WatchlistItem,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Movie, show or episode object embedded in most responses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraktMedia {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    #[serde(default)]
    pub ids: MediaIds,
}

/// Generic list entry: collection, watchlist, ratings, list items, playback and search results
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraktEntry {
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub movie: Option<TraktMedia>,
    #[serde(default)]
    pub show: Option<TraktMedia>,
    #[serde(default)]
    pub episode: Option<TraktMedia>,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub listed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub progress: Option<f32>,
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraktEpisodeStamp {
    pub number: u32,
    #[serde(default)]
    pub last_watched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub collected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraktSeasonStamps {
    pub number: u32,
    #[serde(default)]
    pub episodes: Vec<TraktEpisodeStamp>,
}

/// Entry of `/sync/watched/shows` and `/sync/collection/shows`
#[derive(Debug, Clone, Deserialize)]
pub struct TraktShowProgress {
    pub show: TraktMedia,
    #[serde(default)]
    pub last_watched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reset_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seasons: Vec<TraktSeasonStamps>,
}

/// Season of `/shows/:id/seasons?extended=episodes`
#[derive(Debug, Clone, Deserialize)]
pub struct TraktSeason {
    pub number: u32,
    #[serde(default)]
    pub episodes: Vec<TraktMedia>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraktLikedList {
    pub list: TraktListInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraktListInfo {
    pub name: String,
    pub ids: MediaIds,
    #[serde(default)]
    pub user: Option<TraktUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraktUser {
    #[serde(default)]
    pub ids: MediaIds,
}

/// Body of `/scrobble/*`
#[derive(Debug, Clone, Serialize)]
pub struct ScrobbleBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie: Option<TraktMedia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<TraktMedia>,
    pub progress: f64,
}

impl ScrobbleBody {
    pub fn new(item: &TraktItem, progress: f64) -> Self {
        let media = TraktMedia {
            ids: item.ids.clone(),
            ..Default::default()
        };
        let (movie, episode) = match item.media_type {
            MediaType::Episode => (None, Some(media)),
            _ => (Some(media), None),
        };
        Self {
            movie,
            episode,
            progress: (progress * 100.0).round() / 100.0,
        }
    }
}

/// Remove slashes from IMDB ids (Trakt sometimes includes them)
fn normalize_ids(mut ids: MediaIds) -> MediaIds {
    ids.imdb = ids.imdb.map(|s| s.replace('/', "")).filter(|s| !s.is_empty());
    ids
}

impl TraktMedia {
    pub fn to_item(&self, media_type: MediaType) -> Option<TraktItem> {
        let mut item = TraktItem::from_ids(
            media_type,
            normalize_ids(self.ids.clone()),
            self.title.clone().unwrap_or_default(),
        )?;
        item.year = self.year;
        item.season = self.season;
        item.number = self.number;
        Some(item)
    }
}

impl TraktEntry {
    /// The most specific item in the entry; episodes carry their show id
    pub fn to_item(&self) -> Option<TraktItem> {
        let declared = self.item_type.as_deref().and_then(MediaType::parse);
        match (declared, &self.movie, &self.show, &self.episode) {
            (Some(MediaType::Movie) | None, Some(movie), _, None) => movie.to_item(MediaType::Movie),
            (Some(MediaType::Episode) | None, _, show, Some(episode)) => {
                let mut item = episode.to_item(MediaType::Episode)?;
                if let Some(show) = show {
                    item.show_id = show.ids.trakt;
                    if let Some(title) = &show.title {
                        item.title = title.clone();
                    }
                }
                Some(item)
            }
            (Some(MediaType::Show) | None, _, Some(show), None) => show.to_item(MediaType::Show),
            _ => None,
        }
    }

    pub fn to_rating(&self) -> Option<Rating> {
        let item = self.to_item()?;
        Some(Rating {
            trakt_id: item.trakt_id,
            media_type: item.media_type,
            rating: self.rating?,
            rated_at: self.rated_at,
        })
    }

    pub fn to_watchlist_item(&self) -> Option<WatchlistItem> {
        Some(WatchlistItem {
            item: self.to_item()?,
            listed_at: self.listed_at,
        })
    }

    pub fn to_list_entry(&self) -> Option<ListEntry> {
        Some(ListEntry {
            rank: self.rank.unwrap_or(u32::MAX),
            item: self.to_item()?,
        })
    }

    pub fn to_playback(&self) -> Option<PlaybackProgress> {
        Some(PlaybackProgress {
            item: self.to_item()?,
            progress: self.progress?,
            paused_at: self.paused_at,
        })
    }
}

impl TraktShowProgress {
    pub fn to_show_episodes(&self) -> Option<ShowEpisodes> {
        let mut episodes = HashMap::new();
        for season in &self.seasons {
            for episode in &season.episodes {
                episodes.insert(
                    (season.number, episode.number),
                    episode.last_watched_at.or(episode.collected_at),
                );
            }
        }
        Some(ShowEpisodes {
            trakt_id: self.show.ids.trakt?,
            reset_at: self.reset_at,
            last_watched_at: self.last_watched_at,
            episodes,
        })
    }
}

impl TraktLikedList {
    pub fn to_list_ref(&self) -> Option<ListRef> {
        Some(ListRef {
            trakt_id: self.list.ids.trakt?,
            name: self.list.name.clone(),
            owner: self.list.user.as_ref().and_then(|u| u.ids.slug.clone()),
        })
    }
}

/// Flatten seasons into episode items belonging to `show`
pub fn season_episodes(show: &TraktItem, seasons: &[TraktSeason]) -> Vec<TraktItem> {
    seasons
        .iter()
        .flat_map(|season| {
            season.episodes.iter().filter_map(move |episode| {
                let mut item = episode.to_item(MediaType::Episode)?;
                item.season = item.season.or(Some(season.number));
                item.show_id = Some(show.trakt_id);
                item.title = show.title.clone();
                Some(item)
            })
        })
        .collect()
}
