use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::media::MediaType;
use crate::media_ids::MediaIds;

/// One element of a Trakt batch write
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PayloadEntry {
    pub ids: MediaIds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watched_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rated_at: Option<DateTime<Utc>>,
    /// Episode selection when the entry is a show
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<SeasonEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeasonEntry {
    pub number: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub episodes: Vec<EpisodeNumber>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct EpisodeNumber {
    pub number: u32,
}

impl PayloadEntry {
    pub fn new(ids: MediaIds) -> Self {
        Self {
            ids,
            ..Default::default()
        }
    }

    pub fn watched_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.watched_at = at;
        self
    }

    pub fn rating(mut self, rating: u8, rated_at: Option<DateTime<Utc>>) -> Self {
        self.rating = Some(rating);
        self.rated_at = rated_at;
        self
    }

    /// Select episodes of a show entry, grouped by season in ascending order
    pub fn episodes(mut self, mut numbers: Vec<(u32, u32)>) -> Self {
        numbers.sort_unstable();
        for (season, episode) in numbers {
            match self.seasons.last_mut() {
                Some(entry) if entry.number == season => {
                    entry.episodes.push(EpisodeNumber { number: episode })
                }
                _ => self.seasons.push(SeasonEntry {
                    number: season,
                    episodes: vec![EpisodeNumber { number: episode }],
                }),
            }
        }
        self
    }
}

/// Trakt `/sync/*` batch endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncOp {
    AddCollection,
    RemoveCollection,
    AddWatchlist,
    RemoveWatchlist,
    AddHistory,
    AddRatings,
}

impl SyncOp {
    pub const ALL: [SyncOp; 6] = [
        SyncOp::AddCollection,
        SyncOp::RemoveCollection,
        SyncOp::AddWatchlist,
        SyncOp::RemoveWatchlist,
        SyncOp::AddHistory,
        SyncOp::AddRatings,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            SyncOp::AddCollection => "/sync/collection",
            SyncOp::RemoveCollection => "/sync/collection/remove",
            SyncOp::AddWatchlist => "/sync/watchlist",
            SyncOp::RemoveWatchlist => "/sync/watchlist/remove",
            SyncOp::AddHistory => "/sync/history",
            SyncOp::AddRatings => "/sync/ratings",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOp::AddCollection => "add-to-collection",
            SyncOp::RemoveCollection => "remove-from-collection",
            SyncOp::AddWatchlist => "add-to-watchlist",
            SyncOp::RemoveWatchlist => "remove-from-watchlist",
            SyncOp::AddHistory => "add-to-history",
            SyncOp::AddRatings => "add-ratings",
        }
    }
}

impl std::fmt::Display for SyncOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trakt `/scrobble/*` endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrobbleAction {
    Start,
    Pause,
    Stop,
}

impl ScrobbleAction {
    pub fn path(&self) -> &'static str {
        match self {
            ScrobbleAction::Start => "/scrobble/start",
            ScrobbleAction::Pause => "/scrobble/pause",
            ScrobbleAction::Stop => "/scrobble/stop",
        }
    }
}

impl std::fmt::Display for ScrobbleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScrobbleAction::Start => "scrobble-update",
            ScrobbleAction::Pause => "scrobble-pause",
            ScrobbleAction::Stop => "scrobble-stop",
        };
        f.write_str(name)
    }
}

/// Body of a Trakt `/sync/*` batch write, grouped by media type
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncPayload {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub movies: Vec<PayloadEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shows: Vec<PayloadEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub episodes: Vec<PayloadEntry>,
}

impl SyncPayload {
    pub fn push(&mut self, media_type: MediaType, entry: PayloadEntry) {
        match media_type {
            MediaType::Movie => self.movies.push(entry),
            MediaType::Show | MediaType::Season => self.shows.push(entry),
            MediaType::Episode => self.episodes.push(entry),
        }
    }

    pub fn single(media_type: MediaType, entry: PayloadEntry) -> Self {
        let mut payload = Self::default();
        payload.push(media_type, entry);
        payload
    }

    pub fn extend(&mut self, other: SyncPayload) {
        self.movies.extend(other.movies);
        self.shows.extend(other.shows);
        self.episodes.extend(other.episodes);
    }

    pub fn len(&self) -> usize {
        self.movies.len() + self.shows.len() + self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeCounts {
    #[serde(default)]
    pub movies: u32,
    #[serde(default)]
    pub shows: u32,
    #[serde(default)]
    pub seasons: u32,
    #[serde(default)]
    pub episodes: u32,
}

impl TypeCounts {
    pub fn total(&self) -> u32 {
        self.movies + self.shows + self.seasons + self.episodes
    }

    pub fn add(&mut self, other: &TypeCounts) {
        self.movies += other.movies;
        self.shows += other.shows;
        self.seasons += other.seasons;
        self.episodes += other.episodes;
    }
}

impl std::fmt::Display for TypeCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        for (name, count) in [
            ("movies", self.movies),
            ("shows", self.shows),
            ("seasons", self.seasons),
            ("episodes", self.episodes),
        ] {
            if count > 0 {
                parts.push(format!("{}: {}", name, count));
            }
        }
        f.write_str(&parts.join(", "))
    }
}

/// Entries Trakt could not match
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotFound {
    #[serde(default)]
    pub movies: Vec<PayloadEntry>,
    #[serde(default)]
    pub shows: Vec<PayloadEntry>,
    #[serde(default)]
    pub seasons: Vec<PayloadEntry>,
    #[serde(default)]
    pub episodes: Vec<PayloadEntry>,
}

impl NotFound {
    pub fn len(&self) -> usize {
        self.movies.len() + self.shows.len() + self.seasons.len() + self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Response of a Trakt `/sync/*` batch write
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncResponse {
    #[serde(default)]
    pub added: TypeCounts,
    #[serde(default)]
    pub updated: TypeCounts,
    #[serde(default)]
    pub existing: TypeCounts,
    #[serde(default)]
    pub deleted: TypeCounts,
    #[serde(default)]
    pub not_found: NotFound,
}

impl SyncResponse {
    pub fn merge(&mut self, other: &SyncResponse) {
        self.added.add(&other.added);
        self.updated.add(&other.updated);
        self.existing.add(&other.existing);
        self.deleted.add(&other.deleted);
        self.not_found.movies.extend(other.not_found.movies.iter().cloned());
        self.not_found.shows.extend(other.not_found.shows.iter().cloned());
        self.not_found.seasons.extend(other.not_found.seasons.iter().cloned());
        self.not_found.episodes.extend(other.not_found.episodes.iter().cloned());
    }
}
