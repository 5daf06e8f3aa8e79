use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::guid::{sort_guids, Guid};
use crate::media::MediaType;
use crate::trakt_item::TraktItem;

/// Entry of the Trakt watchlist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub item: TraktItem,
    pub listed_at: Option<DateTime<Utc>>,
}

/// Entry of the Plex online watchlist
///
/// Watchlist entries live on the Plex discover service, so they are keyed by
/// the discover rating key (a hex string) rather than a library key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlexWatchlistItem {
    pub key: String,
    pub media_type: MediaType,
    pub title: String,
    pub year: Option<u32>,
    #[serde(default)]
    pub guids: Vec<Guid>,
}

impl PlexWatchlistItem {
    pub fn new(key: impl Into<String>, media_type: MediaType, title: impl Into<String>, guids: Vec<Guid>) -> Self {
        Self {
            key: key.into(),
            media_type,
            title: title.into(),
            year: None,
            guids: sort_guids(guids),
        }
    }
}
