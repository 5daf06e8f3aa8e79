use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A show from the Trakt watched or collection list, with per-episode timestamps
///
/// `reset_at` (watched list only) voids every watch that happened before it.
#[derive(Debug, Clone, Default)]
pub struct ShowEpisodes {
    pub trakt_id: u64,
    pub reset_at: Option<DateTime<Utc>>,
    pub last_watched_at: Option<DateTime<Utc>>,
    /// (season, episode) to last watched or collected time
    pub episodes: HashMap<(u32, u32), Option<DateTime<Utc>>>,
}

impl ShowEpisodes {
    /// Episode present and not voided by a reset
    pub fn has_episode(&self, season: u32, episode: u32) -> bool {
        match self.episodes.get(&(season, episode)) {
            None => false,
            Some(watched_at) => match (self.reset_at, watched_at) {
                (Some(reset), Some(at)) => *at >= reset,
                _ => true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_reset_voids_earlier_watches() {
        let mut show = ShowEpisodes {
            trakt_id: 1,
            reset_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        show.episodes.insert((1, 1), Some(Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()));
        show.episodes.insert((1, 2), Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()));
        assert!(!show.has_episode(1, 1));
        assert!(show.has_episode(1, 2));
        assert!(!show.has_episode(1, 3));
    }
}
