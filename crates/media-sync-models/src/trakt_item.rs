use serde::{Deserialize, Serialize};
use crate::media::MediaType;
use crate::media_ids::MediaIds;

/// A Trakt movie, show, season or episode
///
/// Equality is by `(media_type, trakt_id)`. Episodes carry their show's trakt id
/// and their season/episode numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraktItem {
    pub media_type: MediaType,
    pub trakt_id: u64,
    #[serde(default)]
    pub ids: MediaIds,
    #[serde(default)]
    pub title: String,
    pub year: Option<u32>,
    pub season: Option<u32>,
    pub number: Option<u32>,
    pub show_id: Option<u64>,
}

impl TraktItem {
    pub fn new(media_type: MediaType, trakt_id: u64) -> Self {
        Self {
            media_type,
            trakt_id,
            ids: MediaIds::with_trakt(trakt_id),
            title: String::new(),
            year: None,
            season: None,
            number: None,
            show_id: None,
        }
    }

    /// Build from a Trakt ids object; `None` when it has no trakt id
    pub fn from_ids(media_type: MediaType, ids: MediaIds, title: impl Into<String>) -> Option<Self> {
        let trakt_id = ids.trakt?;
        Some(Self {
            media_type,
            trakt_id,
            ids,
            title: title.into(),
            year: None,
            season: None,
            number: None,
            show_id: None,
        })
    }

    pub fn key(&self) -> (MediaType, u64) {
        (self.media_type, self.trakt_id)
    }

    pub fn label(&self) -> String {
        match (self.media_type, self.season, self.number) {
            (MediaType::Episode, Some(s), Some(e)) => format!("{} S{:02}E{:02}", self.title, s, e),
            _ => match self.year {
                Some(year) => format!("{} ({})", self.title, year),
                None => self.title.clone(),
            },
        }
    }
}

impl PartialEq for TraktItem {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for TraktItem {}

impl std::hash::Hash for TraktItem {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_by_type_and_id() {
        let mut a = TraktItem::new(MediaType::Movie, 7);
        a.title = "Heat".to_string();
        let b = TraktItem::new(MediaType::Movie, 7);
        let c = TraktItem::new(MediaType::Show, 7);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_from_ids_requires_trakt() {
        assert!(TraktItem::from_ids(MediaType::Movie, MediaIds::default(), "x").is_none());
        let item = TraktItem::from_ids(MediaType::Movie, MediaIds::with_trakt(3), "x").unwrap();
        assert_eq!(item.trakt_id, 3);
    }
}
