use async_trait::async_trait;
use media_sync_models::{
    ListRef, MediaType, PlaybackProgress, PlexItem, PlexWatchlistItem, Provider, Rating,
    ScrobbleAction, ShowEpisodes, SyncOp, SyncPayload, SyncResponse, TraktItem, TraktList,
    WatchlistItem,
};

use crate::error::SourceResult;
use crate::plex::{HistoryEntry, NotificationStream, Page, PlexPlaylist, PlexSession, Section};

/// Media server operations consumed by the sync engine
#[async_trait]
pub trait PlexServer: Send + Sync {
    async fn sections(&self) -> SourceResult<Vec<Section>>;

    /// `None` when the key no longer exists
    async fn fetch_item(&self, rating_key: u64) -> SourceResult<Option<PlexItem>>;

    async fn search(&self, title: &str, media_type: MediaType) -> SourceResult<Vec<PlexItem>>;

    /// One page of the movies or shows of a section
    async fn section_items(&self, section: &Section, start: u32, size: u32) -> SourceResult<Page<PlexItem>>;

    /// One page of the episodes of a show section
    async fn section_episodes(&self, section: &Section, start: u32, size: u32) -> SourceResult<Page<PlexItem>>;

    async fn show_episodes(&self, show_key: u64) -> SourceResult<Vec<PlexItem>>;

    async fn history(&self, rating_key: u64) -> SourceResult<Vec<HistoryEntry>>;

    async fn mark_watched(&self, rating_key: u64) -> SourceResult<()>;

    async fn mark_unwatched(&self, rating_key: u64) -> SourceResult<()>;

    /// Set the 1-10 user rating, `None` clears it
    async fn rate(&self, rating_key: u64, rating: Option<u8>) -> SourceResult<()>;

    async fn set_view_offset(&self, rating_key: u64, offset_ms: u64) -> SourceResult<()>;

    async fn playlist(&self, title: &str) -> SourceResult<Option<PlexPlaylist>>;

    async fn create_playlist(&self, title: &str, items: &[u64]) -> SourceResult<()>;

    /// Replace the playlist contents with `items`, in order
    async fn update_playlist(&self, playlist: &PlexPlaylist, items: &[u64]) -> SourceResult<()>;

    async fn delete_playlist(&self, playlist: &PlexPlaylist) -> SourceResult<()>;

    async fn sessions(&self) -> SourceResult<Vec<PlexSession>>;

    /// Subscribe to the server push stream
    async fn notifications(&self) -> SourceResult<NotificationStream>;

    async fn watchlist(&self) -> SourceResult<Vec<PlexWatchlistItem>>;

    async fn add_to_watchlist(&self, key: &str) -> SourceResult<()>;

    async fn remove_from_watchlist(&self, key: &str) -> SourceResult<()>;

    /// Online (discover) search used for watchlist items missing from the libraries
    async fn search_discover(
        &self,
        title: &str,
        media_type: MediaType,
        year: Option<u32>,
    ) -> SourceResult<Vec<PlexWatchlistItem>>;
}

/// Trakt operations consumed by the sync engine
#[async_trait]
pub trait TraktApi: Send + Sync {
    async fn collected_movies(&self) -> SourceResult<Vec<TraktItem>>;

    async fn collected_shows(&self) -> SourceResult<Vec<ShowEpisodes>>;

    async fn watched_movies(&self) -> SourceResult<Vec<TraktItem>>;

    async fn watched_shows(&self) -> SourceResult<Vec<ShowEpisodes>>;

    async fn ratings(&self, media_type: MediaType) -> SourceResult<Vec<Rating>>;

    async fn watchlist(&self) -> SourceResult<Vec<WatchlistItem>>;

    async fn liked_lists(&self) -> SourceResult<Vec<ListRef>>;

    /// Items of a public list with their rank
    async fn list_items(&self, list: &ListRef) -> SourceResult<TraktList>;

    async fn playback(&self) -> SourceResult<Vec<PlaybackProgress>>;

    async fn search_by_id(
        &self,
        provider: &Provider,
        id: &str,
        media_type: MediaType,
    ) -> SourceResult<Vec<TraktItem>>;

    /// Every episode of a show with its ids, season and number
    async fn show_episodes(&self, show: &TraktItem) -> SourceResult<Vec<TraktItem>>;

    async fn sync(&self, op: SyncOp, payload: &SyncPayload) -> SourceResult<SyncResponse>;

    async fn scrobble(&self, action: ScrobbleAction, item: &TraktItem, progress: f64) -> SourceResult<()>;
}
