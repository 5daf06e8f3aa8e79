use async_trait::async_trait;
use media_sync_models::{
    ListRef, MediaType, PlaybackProgress, Provider, Rating, ScrobbleAction, ShowEpisodes, SyncOp,
    SyncPayload, SyncResponse, TraktItem, TraktList, WatchlistItem,
};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{check_response, SourceError, SourceResult};
use crate::http_cache::HttpCache;
use crate::traits::TraktApi;
use crate::trakt::api::{
    season_episodes, ScrobbleBody, TraktEntry, TraktLikedList, TraktSeason, TraktShowProgress,
};
use crate::trakt::auth;

const BASE_URL: &str = "https://api.trakt.tv";

#[derive(Clone)]
pub struct TraktClient {
    client: Arc<Client>,
    access_token: String,
    client_id: String,
    cache: Arc<HttpCache>,
}

impl TraktClient {
    pub fn new(client_id: String, access_token: String, cache: Arc<HttpCache>, timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(concat!("plextraktsync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| auth::create_trakt_client());

        Self {
            client: Arc::new(client),
            access_token,
            client_id,
            cache,
        }
    }

    pub fn cache(&self) -> &HttpCache {
        &self.cache
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("trakt-api-version", "2")
            .header("trakt-api-key", &self.client_id)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
    }

    /// GET through the response cache
    async fn get<T: DeserializeOwned>(&self, path: &str) -> SourceResult<T> {
        let url = format!("{}{}", BASE_URL, path);
        if let Some(body) = self.cache.get(&url) {
            return Ok(serde_json::from_str(&body)?);
        }

        debug!("Trakt API: GET {}", path);
        let response = check_response(self.request(Method::GET, &url).send().await?).await?;
        let body = response.text().await?;
        let value = serde_json::from_str(&body)?;
        self.cache.put(&url, &body);
        Ok(value)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> SourceResult<T> {
        let url = format!("{}{}", BASE_URL, path);
        debug!("Trakt API: POST {}", path);
        let response = check_response(self.request(Method::POST, &url).json(body).send().await?).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::from_str("null")?);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn entries(&self, path: &str) -> SourceResult<Vec<TraktEntry>> {
        self.get::<Vec<TraktEntry>>(path).await
    }

    async fn show_progress(&self, path: &str) -> SourceResult<Vec<ShowEpisodes>> {
        let shows: Vec<TraktShowProgress> = self.get(path).await?;
        Ok(shows.iter().filter_map(|s| s.to_show_episodes()).collect())
    }
}

#[async_trait]
impl TraktApi for TraktClient {
    async fn collected_movies(&self) -> SourceResult<Vec<TraktItem>> {
        let entries = self.entries("/sync/collection/movies").await?;
        Ok(entries.iter().filter_map(|e| e.to_item()).collect())
    }

    async fn collected_shows(&self) -> SourceResult<Vec<ShowEpisodes>> {
        self.show_progress("/sync/collection/shows").await
    }

    async fn watched_movies(&self) -> SourceResult<Vec<TraktItem>> {
        let entries = self.entries("/sync/watched/movies").await?;
        Ok(entries.iter().filter_map(|e| e.to_item()).collect())
    }

    async fn watched_shows(&self) -> SourceResult<Vec<ShowEpisodes>> {
        self.show_progress("/sync/watched/shows").await
    }

    async fn ratings(&self, media_type: MediaType) -> SourceResult<Vec<Rating>> {
        let entries = self.entries(&format!("/sync/ratings/{}", media_type.plural())).await?;
        Ok(entries.iter().filter_map(|e| e.to_rating()).collect())
    }

    async fn watchlist(&self) -> SourceResult<Vec<WatchlistItem>> {
        let entries = self.entries("/sync/watchlist?sort=added,asc").await?;
        Ok(entries.iter().filter_map(|e| e.to_watchlist_item()).collect())
    }

    async fn liked_lists(&self) -> SourceResult<Vec<ListRef>> {
        let lists: Vec<TraktLikedList> = self.get("/users/likes/lists?limit=1000").await?;
        Ok(lists.iter().filter_map(|l| l.to_list_ref()).collect())
    }

    async fn list_items(&self, list: &ListRef) -> SourceResult<TraktList> {
        let entries = self.entries(&format!("/lists/{}/items", list.trakt_id)).await?;
        Ok(TraktList {
            trakt_id: list.trakt_id,
            name: list.name.clone(),
            items: entries.iter().filter_map(|e| e.to_list_entry()).collect(),
        })
    }

    async fn playback(&self) -> SourceResult<Vec<PlaybackProgress>> {
        let entries = self.entries("/sync/playback").await?;
        Ok(entries.iter().filter_map(|e| e.to_playback()).collect())
    }

    async fn search_by_id(
        &self,
        provider: &Provider,
        id: &str,
        media_type: MediaType,
    ) -> SourceResult<Vec<TraktItem>> {
        if !provider.is_resolvable() {
            return Err(SourceError::Other(format!("Unsupported search provider: {}", provider)));
        }
        let path = format!(
            "/search/{}/{}?type={}",
            provider,
            urlencoding::encode(id),
            media_type.as_str()
        );
        let entries = self.entries(&path).await?;
        // search by id ignores `type` for some providers, filter here
        Ok(entries
            .iter()
            .filter_map(|e| e.to_item())
            .filter(|item| item.media_type == media_type)
            .collect())
    }

    async fn show_episodes(&self, show: &TraktItem) -> SourceResult<Vec<TraktItem>> {
        let seasons: Vec<TraktSeason> = self
            .get(&format!("/shows/{}/seasons?extended=episodes", show.trakt_id))
            .await?;
        Ok(season_episodes(show, &seasons))
    }

    async fn sync(&self, op: SyncOp, payload: &SyncPayload) -> SourceResult<SyncResponse> {
        let response: Option<SyncResponse> = self.post(op.path(), payload).await?;
        Ok(response.unwrap_or_default())
    }

    async fn scrobble(&self, action: ScrobbleAction, item: &TraktItem, progress: f64) -> SourceResult<()> {
        let body = ScrobbleBody::new(item, progress);
        let _: Option<serde_json::Value> = self.post(action.path(), &body).await?;
        info!("Trakt {} {} at {:.2}%", action, item.label(), body.progress);
        Ok(())
    }
}
