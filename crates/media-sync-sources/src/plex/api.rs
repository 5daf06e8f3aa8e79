use async_trait::async_trait;
use media_sync_models::{MediaType, PlexItem, PlexWatchlistItem};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::events::notification_stream;
use super::parse::{self, XbmcFallback};
use super::{HistoryEntry, NotificationStream, Page, PlexPlaylist, PlexSession, Section};
use crate::error::{check_response, SourceError, SourceResult};
use crate::traits::PlexServer;

const DISCOVER_BASE_URL: &str = "https://discover.provider.plex.tv";
const CLIENT_IDENTIFIER: &str = "plextraktsync";
const LIBRARY_IDENTIFIER: &str = "com.plexapp.plugins.library";

/// HTTP client for a single Plex Media Server
pub struct PlexHttpClient {
    client: Client,
    /// No overall timeout, used for the long-lived notification stream
    stream_client: Client,
    server_url: String,
    discover_base_url: String,
    xbmc: XbmcFallback,
    machine_identifier: OnceCell<String>,
}

impl PlexHttpClient {
    pub fn new(server_url: &str, token: &str, timeout: Duration, xbmc: XbmcFallback) -> SourceResult<Self> {
        let headers = {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(
                reqwest::header::ACCEPT,
                reqwest::header::HeaderValue::from_static("application/json"),
            );
            headers.insert(
                reqwest::header::HeaderName::from_static("x-plex-token"),
                reqwest::header::HeaderValue::from_str(token)
                    .map_err(|_| SourceError::Unauthorized("Invalid Plex token format".to_string()))?,
            );
            headers.insert(
                reqwest::header::HeaderName::from_static("x-plex-client-identifier"),
                reqwest::header::HeaderValue::from_static(CLIENT_IDENTIFIER),
            );
            headers.insert(
                reqwest::header::HeaderName::from_static("x-plex-product"),
                reqwest::header::HeaderValue::from_static(CLIENT_IDENTIFIER),
            );
            headers
        };

        let client = Client::builder()
            .default_headers(headers.clone())
            .timeout(timeout)
            .build()?;
        let stream_client = Client::builder()
            .default_headers(headers)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            stream_client,
            server_url: server_url.trim_end_matches('/').to_string(),
            discover_base_url: DISCOVER_BASE_URL.to_string(),
            xbmc,
            machine_identifier: OnceCell::new(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.server_url, path))
    }

    async fn get_json(&self, path: &str) -> SourceResult<Value> {
        debug!("Plex API: GET {}", path);
        let response = check_response(self.request(Method::GET, path).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn send(&self, method: Method, path: &str) -> SourceResult<()> {
        debug!("Plex API: {} {}", method, path);
        check_response(self.request(method, path).send().await?).await?;
        Ok(())
    }

    async fn discover_json(&self, method: Method, path: &str) -> SourceResult<Value> {
        let url = format!("{}{}", self.discover_base_url, path);
        debug!("Plex discover: {} {}", method, path);
        let response = check_response(self.client.request(method, url).send().await?).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn machine_identifier(&self) -> SourceResult<&str> {
        let id = self
            .machine_identifier
            .get_or_try_init(|| async {
                let json = self.get_json("/identity").await?;
                parse::container(&json)
                    .get("machineIdentifier")
                    .and_then(|m| m.as_str())
                    .map(|s| s.to_string())
                    .ok_or_else(|| SourceError::Decode("Missing machineIdentifier".to_string()))
            })
            .await?;
        Ok(id.as_str())
    }

    async fn items_uri(&self, items: &[u64]) -> SourceResult<String> {
        let keys: Vec<String> = items.iter().map(|k| k.to_string()).collect();
        let uri = format!(
            "server://{}/{}/library/metadata/{}",
            self.machine_identifier().await?,
            LIBRARY_IDENTIFIER,
            keys.join(",")
        );
        Ok(urlencoding::encode(&uri).to_string())
    }

    async fn page(&self, section: &Section, media_type: MediaType, start: u32, size: u32) -> SourceResult<Page<PlexItem>> {
        let path = format!(
            "/library/sections/{}/all?type={}&includeGuids=1&X-Plex-Container-Start={}&X-Plex-Container-Size={}",
            section.key,
            media_type.plex_type_id(),
            start,
            size
        );
        let json = self.get_json(&path).await?;
        let items = parse::parse_items(&json, &self.xbmc);
        let total = parse::parse_total(&json, start as usize + items.len());
        debug!(
            "Plex section '{}': {} {} at offset {} (total {})",
            section.title,
            items.len(),
            media_type.plural(),
            start,
            total
        );
        Ok(Page { items, total })
    }
}

#[async_trait]
impl PlexServer for PlexHttpClient {
    async fn sections(&self) -> SourceResult<Vec<Section>> {
        let json = self.get_json("/library/sections").await?;
        Ok(parse::parse_sections(&json))
    }

    async fn fetch_item(&self, rating_key: u64) -> SourceResult<Option<PlexItem>> {
        match self.get_json(&format!("/library/metadata/{}?includeGuids=1", rating_key)).await {
            Ok(json) => Ok(parse::parse_items(&json, &self.xbmc).into_iter().next()),
            Err(SourceError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn search(&self, title: &str, media_type: MediaType) -> SourceResult<Vec<PlexItem>> {
        let path = format!(
            "/library/all?type={}&title={}&includeGuids=1",
            media_type.plex_type_id(),
            urlencoding::encode(title)
        );
        let json = self.get_json(&path).await?;
        Ok(parse::parse_items(&json, &self.xbmc))
    }

    async fn section_items(&self, section: &Section, start: u32, size: u32) -> SourceResult<Page<PlexItem>> {
        self.page(section, section.media_type, start, size).await
    }

    async fn section_episodes(&self, section: &Section, start: u32, size: u32) -> SourceResult<Page<PlexItem>> {
        self.page(section, MediaType::Episode, start, size).await
    }

    async fn show_episodes(&self, show_key: u64) -> SourceResult<Vec<PlexItem>> {
        let json = self
            .get_json(&format!("/library/metadata/{}/allLeaves?includeGuids=1", show_key))
            .await?;
        Ok(parse::parse_items(&json, &self.xbmc))
    }

    async fn history(&self, rating_key: u64) -> SourceResult<Vec<HistoryEntry>> {
        let json = self
            .get_json(&format!("/status/sessions/history/all?metadataItemID={}", rating_key))
            .await?;
        Ok(parse::parse_history(&json))
    }

    async fn mark_watched(&self, rating_key: u64) -> SourceResult<()> {
        self.send(
            Method::GET,
            &format!("/:/scrobble?identifier={}&key={}", LIBRARY_IDENTIFIER, rating_key),
        )
        .await
    }

    async fn mark_unwatched(&self, rating_key: u64) -> SourceResult<()> {
        self.send(
            Method::GET,
            &format!("/:/unscrobble?identifier={}&key={}", LIBRARY_IDENTIFIER, rating_key),
        )
        .await
    }

    async fn rate(&self, rating_key: u64, rating: Option<u8>) -> SourceResult<()> {
        // -1 clears the rating
        let value = rating.map(|r| r as i32).unwrap_or(-1);
        self.send(
            Method::PUT,
            &format!("/:/rate?identifier={}&key={}&rating={}", LIBRARY_IDENTIFIER, rating_key, value),
        )
        .await
    }

    async fn set_view_offset(&self, rating_key: u64, offset_ms: u64) -> SourceResult<()> {
        self.send(
            Method::GET,
            &format!(
                "/:/progress?identifier={}&key={}&time={}&state=stopped",
                LIBRARY_IDENTIFIER, rating_key, offset_ms
            ),
        )
        .await
    }

    async fn playlist(&self, title: &str) -> SourceResult<Option<PlexPlaylist>> {
        let json = self.get_json("/playlists?playlistType=video").await?;
        let Some(mut playlist) = parse::parse_playlists(&json).into_iter().find(|p| p.title == title) else {
            return Ok(None);
        };

        let items = self.get_json(&format!("/playlists/{}/items", playlist.key)).await?;
        playlist.items = parse::metadata(&items)
            .iter()
            .filter_map(|item| parse::parse_key(item.get("ratingKey")))
            .collect();
        Ok(Some(playlist))
    }

    async fn create_playlist(&self, title: &str, items: &[u64]) -> SourceResult<()> {
        let uri = self.items_uri(items).await?;
        self.send(
            Method::POST,
            &format!(
                "/playlists?type=video&smart=0&title={}&uri={}",
                urlencoding::encode(title),
                uri
            ),
        )
        .await?;
        info!("Created Plex playlist '{}' with {} items", title, items.len());
        Ok(())
    }

    async fn update_playlist(&self, playlist: &PlexPlaylist, items: &[u64]) -> SourceResult<()> {
        self.send(Method::DELETE, &format!("/playlists/{}/items", playlist.key)).await?;
        if !items.is_empty() {
            let uri = self.items_uri(items).await?;
            self.send(Method::PUT, &format!("/playlists/{}/items?uri={}", playlist.key, uri))
                .await?;
        }
        info!("Updated Plex playlist '{}' with {} items", playlist.title, items.len());
        Ok(())
    }

    async fn delete_playlist(&self, playlist: &PlexPlaylist) -> SourceResult<()> {
        self.send(Method::DELETE, &format!("/playlists/{}", playlist.key)).await
    }

    async fn sessions(&self) -> SourceResult<Vec<PlexSession>> {
        let json = self.get_json("/status/sessions").await?;
        Ok(parse::parse_sessions(&json))
    }

    async fn notifications(&self) -> SourceResult<NotificationStream> {
        let url = format!(
            "{}/:/eventsource/notifications?filters=playing,activity,timeline",
            self.server_url
        );
        let response = self
            .stream_client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = check_response(response).await?;
        info!("Subscribed to Plex notifications at {}", self.server_url);
        Ok(notification_stream(response))
    }

    async fn watchlist(&self) -> SourceResult<Vec<PlexWatchlistItem>> {
        let json = self
            .discover_json(Method::GET, "/library/sections/watchlist/all?includeGuids=1")
            .await?;
        let items = parse::parse_watchlist(&json);
        debug!("Plex watchlist: {} items", items.len());
        Ok(items)
    }

    async fn add_to_watchlist(&self, key: &str) -> SourceResult<()> {
        self.discover_json(Method::PUT, &format!("/actions/addToWatchlist?ratingKey={}", key))
            .await?;
        Ok(())
    }

    async fn remove_from_watchlist(&self, key: &str) -> SourceResult<()> {
        self.discover_json(Method::PUT, &format!("/actions/removeFromWatchlist?ratingKey={}", key))
            .await?;
        Ok(())
    }

    async fn search_discover(
        &self,
        title: &str,
        media_type: MediaType,
        year: Option<u32>,
    ) -> SourceResult<Vec<PlexWatchlistItem>> {
        let search_type = match media_type {
            MediaType::Movie => "movies",
            _ => "tv",
        };
        let path = format!(
            "/library/search?query={}&searchTypes={}&searchProviders=discover&includeMetadata=1&includeGuids=1",
            urlencoding::encode(title),
            search_type
        );
        let json = self.discover_json(Method::GET, &path).await?;
        Ok(parse::parse_discover_search(&json)
            .into_iter()
            .filter(|r| r.media_type == media_type)
            .filter(|r| year.is_none() || r.year.is_none() || r.year == year)
            .collect())
    }
}
