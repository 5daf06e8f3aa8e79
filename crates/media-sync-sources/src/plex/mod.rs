pub mod api;
pub mod auth;
pub mod events;
mod parse;

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use media_sync_models::MediaType;
use serde_json::Value;

use crate::error::SourceResult;

pub use api::PlexHttpClient;
pub use auth::verify_token;
pub use parse::XbmcFallback;

/// A library section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub key: u32,
    pub title: String,
    pub media_type: MediaType,
}

/// One page of a paginated listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total size of the listing across all pages
    pub total: u32,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub viewed_at: Option<DateTime<Utc>>,
    pub account_id: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PlexPlaylist {
    pub key: u64,
    pub title: String,
    /// Item rating keys in playlist order
    pub items: Vec<u64>,
}

/// An active playback session from `/status/sessions`
#[derive(Debug, Clone)]
pub struct PlexSession {
    pub session_key: String,
    pub rating_key: u64,
    pub username: Option<String>,
}

/// Undecoded message of the server push stream
#[derive(Debug, Clone, PartialEq)]
pub struct RawNotification {
    /// SSE event name (`playing`, `activity`, `timeline`, ...)
    pub event: String,
    pub data: Value,
}

pub type NotificationStream = BoxStream<'static, SourceResult<RawNotification>>;
