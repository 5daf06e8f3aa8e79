//! Recording fakes of the Plex and Trakt clients

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use media_sync_models::{
    Guid, ListRef, MediaIds, MediaType, PlaybackProgress, PlexItem, PlexWatchlistItem, Provider,
    Rating, ScrobbleAction, ShowEpisodes, SyncOp, SyncPayload, SyncResponse, TraktItem, TraktList,
    TypeCounts, WatchlistItem,
};
use media_sync_sources::{
    HistoryEntry, NotificationStream, Page, PlexPlaylist, PlexServer, PlexSession, RawNotification,
    Section, SourceError, SourceResult, TraktApi,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tokio::time::Instant;

pub fn movie(trakt_id: u64, title: &str) -> TraktItem {
    let mut item = TraktItem::new(MediaType::Movie, trakt_id);
    item.title = title.to_string();
    item
}

pub fn show(trakt_id: u64, title: &str) -> TraktItem {
    let mut item = TraktItem::new(MediaType::Show, trakt_id);
    item.title = title.to_string();
    item
}

pub fn episode(show_id: u64, trakt_id: u64, season: u32, number: u32, imdb: &str) -> TraktItem {
    let mut item = TraktItem::new(MediaType::Episode, trakt_id);
    item.show_id = Some(show_id);
    item.season = Some(season);
    item.number = Some(number);
    item.ids = MediaIds {
        trakt: Some(trakt_id),
        imdb: Some(imdb.to_string()),
        ..Default::default()
    };
    item
}

pub fn plex_movie(rating_key: u64, title: &str, imdb: &str) -> PlexItem {
    PlexItem::new(rating_key, MediaType::Movie, title).with_guids(vec![Guid::new(Provider::Imdb, imdb)])
}

pub fn plex_show(rating_key: u64, title: &str, imdb: &str) -> PlexItem {
    PlexItem::new(rating_key, MediaType::Show, title).with_guids(vec![Guid::new(Provider::Imdb, imdb)])
}

pub fn plex_episode(rating_key: u64, show_key: u64, season: u32, number: u32, imdb: &str) -> PlexItem {
    let mut item = PlexItem::new(rating_key, MediaType::Episode, format!("Episode {}", number))
        .with_guids(vec![Guid::new(Provider::Imdb, imdb)]);
    item.show_key = Some(show_key);
    item.show_title = Some("Show".to_string());
    item.season_number = Some(season);
    item.episode_number = Some(number);
    item
}

fn counts(payload: &SyncPayload) -> TypeCounts {
    let nested: usize = payload
        .shows
        .iter()
        .flat_map(|s| s.seasons.iter())
        .map(|s| s.episodes.len())
        .sum();
    TypeCounts {
        movies: payload.movies.len() as u32,
        shows: payload.shows.iter().filter(|s| s.seasons.is_empty()).count() as u32,
        seasons: 0,
        episodes: (payload.episodes.len() + nested) as u32,
    }
}

#[derive(Default)]
pub struct FakeTrakt {
    pub collected_movies: Mutex<Vec<TraktItem>>,
    pub collected_shows: Mutex<Vec<ShowEpisodes>>,
    pub watched_movies: Mutex<Vec<TraktItem>>,
    pub watched_shows: Mutex<Vec<ShowEpisodes>>,
    pub ratings: Mutex<Vec<Rating>>,
    pub watchlist: Mutex<Vec<WatchlistItem>>,
    pub liked_lists: Mutex<Vec<ListRef>>,
    pub lists: Mutex<HashMap<u64, TraktList>>,
    pub playback: Mutex<Vec<PlaybackProgress>>,
    /// Errors returned by the next `sync` calls, in order
    pub sync_errors: Mutex<VecDeque<SourceError>>,
    pub scrobble_errors: Mutex<VecDeque<SourceError>>,
    pub syncs: Mutex<Vec<(SyncOp, SyncPayload)>>,
    pub sync_times: Mutex<Vec<Instant>>,
    pub scrobbles: Mutex<Vec<(ScrobbleAction, u64, f64)>>,
    search: Mutex<HashMap<(Provider, String), Vec<TraktItem>>>,
    episodes: Mutex<HashMap<u64, Vec<TraktItem>>>,
    calls: Mutex<Vec<String>>,
    /// Movies added through `sync`, for idempotent collection adds
    collected: Mutex<HashSet<u64>>,
}

impl FakeTrakt {
    pub fn add_search(&self, provider: Provider, id: &str, item: TraktItem) {
        self.search
            .lock()
            .unwrap()
            .entry((provider, id.to_string()))
            .or_default()
            .push(item);
    }

    pub fn add_episodes(&self, show_id: u64, episodes: Vec<TraktItem>) {
        self.episodes.lock().unwrap().insert(show_id, episodes);
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !c.starts_with("show_episodes"))
            .cloned()
            .collect()
    }

    pub fn show_episode_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with("show_episodes"))
            .count()
    }

    pub fn sync_calls(&self) -> Vec<(SyncOp, SyncPayload)> {
        self.syncs.lock().unwrap().clone()
    }

    pub fn syncs_for(&self, op: SyncOp) -> Vec<SyncPayload> {
        self.sync_calls()
            .into_iter()
            .filter(|(o, _)| *o == op)
            .map(|(_, p)| p)
            .collect()
    }

    pub fn scrobble_calls(&self) -> Vec<(ScrobbleAction, u64, f64)> {
        self.scrobbles.lock().unwrap().clone()
    }
}

#[async_trait]
impl TraktApi for FakeTrakt {
    async fn collected_movies(&self) -> SourceResult<Vec<TraktItem>> {
        Ok(self.collected_movies.lock().unwrap().clone())
    }

    async fn collected_shows(&self) -> SourceResult<Vec<ShowEpisodes>> {
        Ok(self.collected_shows.lock().unwrap().clone())
    }

    async fn watched_movies(&self) -> SourceResult<Vec<TraktItem>> {
        Ok(self.watched_movies.lock().unwrap().clone())
    }

    async fn watched_shows(&self) -> SourceResult<Vec<ShowEpisodes>> {
        Ok(self.watched_shows.lock().unwrap().clone())
    }

    async fn ratings(&self, media_type: MediaType) -> SourceResult<Vec<Rating>> {
        Ok(self
            .ratings
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.media_type == media_type)
            .cloned()
            .collect())
    }

    async fn watchlist(&self) -> SourceResult<Vec<WatchlistItem>> {
        Ok(self.watchlist.lock().unwrap().clone())
    }

    async fn liked_lists(&self) -> SourceResult<Vec<ListRef>> {
        Ok(self.liked_lists.lock().unwrap().clone())
    }

    async fn list_items(&self, list: &ListRef) -> SourceResult<TraktList> {
        self.lists
            .lock()
            .unwrap()
            .get(&list.trakt_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(list.name.clone()))
    }

    async fn playback(&self) -> SourceResult<Vec<PlaybackProgress>> {
        Ok(self.playback.lock().unwrap().clone())
    }

    async fn search_by_id(&self, provider: &Provider, id: &str, media_type: MediaType) -> SourceResult<Vec<TraktItem>> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}:{}", provider, id, media_type));
        Ok(self
            .search
            .lock()
            .unwrap()
            .get(&(provider.clone(), id.to_string()))
            .map(|items| items.iter().filter(|i| i.media_type == media_type).cloned().collect())
            .unwrap_or_default())
    }

    async fn show_episodes(&self, show: &TraktItem) -> SourceResult<Vec<TraktItem>> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("show_episodes:{}", show.trakt_id));
        Ok(self
            .episodes
            .lock()
            .unwrap()
            .get(&show.trakt_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn sync(&self, op: SyncOp, payload: &SyncPayload) -> SourceResult<SyncResponse> {
        self.sync_times.lock().unwrap().push(Instant::now());
        if let Some(err) = self.sync_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.syncs.lock().unwrap().push((op, payload.clone()));

        let mut response = SyncResponse::default();
        match op {
            SyncOp::RemoveCollection | SyncOp::RemoveWatchlist => response.deleted = counts(payload),
            SyncOp::AddCollection => {
                let mut collected = self.collected.lock().unwrap();
                let mut added = counts(payload);
                added.movies = 0;
                for entry in &payload.movies {
                    let id = entry.ids.trakt.unwrap_or_default();
                    if collected.insert(id) {
                        added.movies += 1;
                    } else {
                        response.existing.movies += 1;
                    }
                }
                response.added = added;
            }
            _ => response.added = counts(payload),
        }
        Ok(response)
    }

    async fn scrobble(&self, action: ScrobbleAction, item: &TraktItem, progress: f64) -> SourceResult<()> {
        if let Some(err) = self.scrobble_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.scrobbles
            .lock()
            .unwrap()
            .push((action, item.trakt_id, (progress * 100.0).round() / 100.0));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlexCall {
    MarkWatched(u64),
    MarkUnwatched(u64),
    Rate(u64, Option<u8>),
    ViewOffset(u64, u64),
    CreatePlaylist(String, Vec<u64>),
    UpdatePlaylist(String, Vec<u64>),
    DeletePlaylist(String),
    AddToWatchlist(String),
    RemoveFromWatchlist(String),
    Sessions,
    Subscribe,
}

#[derive(Default)]
pub struct FakePlex {
    pub sections: Mutex<Vec<Section>>,
    /// Every item reachable through `fetch_item`, `search` and `show_episodes`
    pub items: Mutex<HashMap<u64, PlexItem>>,
    /// Movies or shows listed per section key
    pub section_contents: Mutex<HashMap<u32, Vec<PlexItem>>>,
    pub section_episodes: Mutex<HashMap<u32, Vec<PlexItem>>>,
    pub history: Mutex<HashMap<u64, Vec<HistoryEntry>>>,
    pub playlists: Mutex<Vec<PlexPlaylist>>,
    pub sessions: Mutex<Vec<PlexSession>>,
    pub watchlist: Mutex<Vec<PlexWatchlistItem>>,
    pub discover: Mutex<Vec<PlexWatchlistItem>>,
    /// One entry per `notifications` call; the default is a failed subscription
    pub streams: Mutex<VecDeque<Vec<SourceResult<RawNotification>>>>,
    pub calls: Mutex<Vec<PlexCall>>,
}

impl FakePlex {
    pub fn add_section(&self, key: u32, title: &str, media_type: MediaType, items: Vec<PlexItem>) {
        self.sections.lock().unwrap().push(Section {
            key,
            title: title.to_string(),
            media_type,
        });
        let mut all = self.items.lock().unwrap();
        for item in &items {
            all.insert(item.rating_key, item.clone());
        }
        self.section_contents.lock().unwrap().insert(key, items);
    }

    pub fn add_episodes(&self, section: u32, episodes: Vec<PlexItem>) {
        let mut all = self.items.lock().unwrap();
        for item in &episodes {
            all.insert(item.rating_key, item.clone());
        }
        self.section_episodes
            .lock()
            .unwrap()
            .entry(section)
            .or_default()
            .extend(episodes);
    }

    pub fn add_item(&self, item: PlexItem) {
        self.items.lock().unwrap().insert(item.rating_key, item);
    }

    pub fn calls(&self) -> Vec<PlexCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change server state
    pub fn writes(&self) -> Vec<PlexCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, PlexCall::Sessions | PlexCall::Subscribe))
            .collect()
    }

    fn record(&self, call: PlexCall) {
        self.calls.lock().unwrap().push(call);
    }
}

fn page(items: Vec<PlexItem>, start: u32, size: u32) -> Page<PlexItem> {
    let total = items.len() as u32;
    Page {
        items: items
            .into_iter()
            .skip(start as usize)
            .take(size as usize)
            .collect(),
        total,
    }
}

#[async_trait]
impl PlexServer for FakePlex {
    async fn sections(&self) -> SourceResult<Vec<Section>> {
        Ok(self.sections.lock().unwrap().clone())
    }

    async fn fetch_item(&self, rating_key: u64) -> SourceResult<Option<PlexItem>> {
        Ok(self.items.lock().unwrap().get(&rating_key).cloned())
    }

    async fn search(&self, title: &str, media_type: MediaType) -> SourceResult<Vec<PlexItem>> {
        let mut found: Vec<PlexItem> = self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.media_type == media_type && i.title == title)
            .cloned()
            .collect();
        found.sort_by_key(|i| i.rating_key);
        Ok(found)
    }

    async fn section_items(&self, section: &Section, start: u32, size: u32) -> SourceResult<Page<PlexItem>> {
        let items = self
            .section_contents
            .lock()
            .unwrap()
            .get(&section.key)
            .cloned()
            .unwrap_or_default();
        Ok(page(items, start, size))
    }

    async fn section_episodes(&self, section: &Section, start: u32, size: u32) -> SourceResult<Page<PlexItem>> {
        let items = self
            .section_episodes
            .lock()
            .unwrap()
            .get(&section.key)
            .cloned()
            .unwrap_or_default();
        Ok(page(items, start, size))
    }

    async fn show_episodes(&self, show_key: u64) -> SourceResult<Vec<PlexItem>> {
        let mut episodes: Vec<PlexItem> = self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.media_type == MediaType::Episode && i.show_key == Some(show_key))
            .cloned()
            .collect();
        episodes.sort_by_key(|e| (e.season_number, e.episode_number));
        Ok(episodes)
    }

    async fn history(&self, rating_key: u64) -> SourceResult<Vec<HistoryEntry>> {
        Ok(self
            .history
            .lock()
            .unwrap()
            .get(&rating_key)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_watched(&self, rating_key: u64) -> SourceResult<()> {
        self.record(PlexCall::MarkWatched(rating_key));
        Ok(())
    }

    async fn mark_unwatched(&self, rating_key: u64) -> SourceResult<()> {
        self.record(PlexCall::MarkUnwatched(rating_key));
        Ok(())
    }

    async fn rate(&self, rating_key: u64, rating: Option<u8>) -> SourceResult<()> {
        self.record(PlexCall::Rate(rating_key, rating));
        Ok(())
    }

    async fn set_view_offset(&self, rating_key: u64, offset_ms: u64) -> SourceResult<()> {
        self.record(PlexCall::ViewOffset(rating_key, offset_ms));
        Ok(())
    }

    async fn playlist(&self, title: &str) -> SourceResult<Option<PlexPlaylist>> {
        Ok(self
            .playlists
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.title == title)
            .cloned())
    }

    async fn create_playlist(&self, title: &str, items: &[u64]) -> SourceResult<()> {
        self.record(PlexCall::CreatePlaylist(title.to_string(), items.to_vec()));
        let mut playlists = self.playlists.lock().unwrap();
        let key = 9000 + playlists.len() as u64;
        playlists.push(PlexPlaylist {
            key,
            title: title.to_string(),
            items: items.to_vec(),
        });
        Ok(())
    }

    async fn update_playlist(&self, playlist: &PlexPlaylist, items: &[u64]) -> SourceResult<()> {
        self.record(PlexCall::UpdatePlaylist(playlist.title.clone(), items.to_vec()));
        if let Some(existing) = self
            .playlists
            .lock()
            .unwrap()
            .iter_mut()
            .find(|p| p.key == playlist.key)
        {
            existing.items = items.to_vec();
        }
        Ok(())
    }

    async fn delete_playlist(&self, playlist: &PlexPlaylist) -> SourceResult<()> {
        self.record(PlexCall::DeletePlaylist(playlist.title.clone()));
        self.playlists.lock().unwrap().retain(|p| p.key != playlist.key);
        Ok(())
    }

    async fn sessions(&self) -> SourceResult<Vec<PlexSession>> {
        self.record(PlexCall::Sessions);
        Ok(self.sessions.lock().unwrap().clone())
    }

    async fn notifications(&self) -> SourceResult<NotificationStream> {
        self.record(PlexCall::Subscribe);
        match self.streams.lock().unwrap().pop_front() {
            Some(messages) => Ok(stream::iter(messages).boxed()),
            None => Err(SourceError::Request("connection refused".to_string())),
        }
    }

    async fn watchlist(&self) -> SourceResult<Vec<PlexWatchlistItem>> {
        Ok(self.watchlist.lock().unwrap().clone())
    }

    async fn add_to_watchlist(&self, key: &str) -> SourceResult<()> {
        self.record(PlexCall::AddToWatchlist(key.to_string()));
        Ok(())
    }

    async fn remove_from_watchlist(&self, key: &str) -> SourceResult<()> {
        self.record(PlexCall::RemoveFromWatchlist(key.to_string()));
        Ok(())
    }

    async fn search_discover(
        &self,
        title: &str,
        media_type: MediaType,
        _year: Option<u32>,
    ) -> SourceResult<Vec<PlexWatchlistItem>> {
        Ok(self
            .discover
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.title == title && i.media_type == media_type)
            .cloned()
            .collect())
    }
}
