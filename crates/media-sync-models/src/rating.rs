use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::media::MediaType;

/// Which side's rating wins when both have one
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RatingSource {
    /// Only fill in missing ratings
    None,
    Trakt,
    #[default]
    Plex,
}

impl std::fmt::Display for RatingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RatingSource::None => "none",
            RatingSource::Trakt => "trakt",
            RatingSource::Plex => "plex",
        };
        f.write_str(name)
    }
}

/// A user rating on the Trakt side (1-10)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rating {
    pub trakt_id: u64,
    pub media_type: MediaType,
    pub rating: u8,
    pub rated_at: Option<DateTime<Utc>>,
}
