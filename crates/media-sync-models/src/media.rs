use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::guid::{sort_guids, Guid, Provider};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Show,
    Season,
    Episode,
}

impl MediaType {
    /// Singular name as used by both the Plex and Trakt APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Show => "show",
            MediaType::Season => "season",
            MediaType::Episode => "episode",
        }
    }

    /// Plural name used as the key of Trakt batch payloads
    pub fn plural(&self) -> &'static str {
        match self {
            MediaType::Movie => "movies",
            MediaType::Show => "shows",
            MediaType::Season => "seasons",
            MediaType::Episode => "episodes",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "movie" | "movies" => Some(MediaType::Movie),
            "show" | "shows" => Some(MediaType::Show),
            "season" | "seasons" => Some(MediaType::Season),
            "episode" | "episodes" => Some(MediaType::Episode),
            _ => None,
        }
    }

    /// Plex numeric library type (`type=` query parameter)
    pub fn plex_type_id(&self) -> u8 {
        match self {
            MediaType::Movie => 1,
            MediaType::Show => 2,
            MediaType::Season => 3,
            MediaType::Episode => 4,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A media server record
///
/// Identity is the server `rating_key`; two records with the same key are the
/// same item regardless of how fresh their other fields are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlexItem {
    pub rating_key: u64,
    pub media_type: MediaType,
    pub title: String,
    pub year: Option<u32>,
    pub added_at: Option<DateTime<Utc>>,
    pub last_viewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub view_count: u32,
    /// Resume position in milliseconds
    pub view_offset: Option<u64>,
    /// Duration in milliseconds
    pub duration: Option<u64>,
    /// Plex 0-10 scale (half stars allowed)
    pub user_rating: Option<f32>,
    pub rated_at: Option<DateTime<Utc>>,
    /// Ordered by provider priority, at most one guid per provider
    #[serde(default)]
    pub guids: Vec<Guid>,
    /// `grandparentRatingKey` for episodes
    pub show_key: Option<u64>,
    pub show_title: Option<String>,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
    pub edition_title: Option<String>,
    pub library_section_id: Option<u32>,
}

impl PlexItem {
    pub fn new(rating_key: u64, media_type: MediaType, title: impl Into<String>) -> Self {
        Self {
            rating_key,
            media_type,
            title: title.into(),
            year: None,
            added_at: None,
            last_viewed_at: None,
            view_count: 0,
            view_offset: None,
            duration: None,
            user_rating: None,
            rated_at: None,
            guids: Vec::new(),
            show_key: None,
            show_title: None,
            season_number: None,
            episode_number: None,
            edition_title: None,
            library_section_id: None,
        }
    }

    /// Replace the guid list, normalizing it to the canonical provider order
    pub fn with_guids(mut self, guids: Vec<Guid>) -> Self {
        self.guids = sort_guids(guids);
        self
    }

    pub fn is_watched(&self) -> bool {
        self.view_count > 0
    }

    /// User rating rounded to the Trakt 1-10 integer scale
    pub fn rating(&self) -> Option<u8> {
        self.user_rating
            .filter(|r| *r > 0.0)
            .map(|r| r.round().clamp(1.0, 10.0) as u8)
    }

    /// Watch percentage derived from view offset and duration
    pub fn watch_percent(&self) -> Option<f64> {
        match (self.view_offset, self.duration) {
            (Some(offset), Some(duration)) if duration > 0 => {
                Some(offset as f64 / duration as f64 * 100.0)
            }
            _ => None,
        }
    }

    /// Plex discover key taken from the `plex://<type>/<key>` guid
    pub fn discover_key(&self) -> Option<&str> {
        self.guids
            .iter()
            .find(|g| g.provider == Provider::Plex)
            .and_then(|g| g.id.rsplit('/').next())
            .filter(|key| !key.is_empty())
    }

    /// Human readable label used in log lines, e.g. `Heat (1995)` or `Show S01E02`
    pub fn label(&self) -> String {
        match self.media_type {
            MediaType::Episode => format!(
                "{} S{:02}E{:02}",
                self.show_title.as_deref().unwrap_or(&self.title),
                self.season_number.unwrap_or(0),
                self.episode_number.unwrap_or(0)
            ),
            _ => match self.year {
                Some(year) => format!("{} ({})", self.title, year),
                None => self.title.clone(),
            },
        }
    }
}

impl PartialEq for PlexItem {
    fn eq(&self, other: &Self) -> bool {
        self.rating_key == other.rating_key
    }
}

impl Eq for PlexItem {}
