use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::trakt_item::TraktItem;

/// In-progress playback stored on Trakt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackProgress {
    pub item: TraktItem,
    /// Percentage 0-100
    pub progress: f32,
    pub paused_at: Option<DateTime<Utc>>,
}
