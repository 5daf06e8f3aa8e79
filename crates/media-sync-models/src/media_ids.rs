use serde::{Deserialize, Serialize};
use crate::guid::{Guid, Provider};

/// Trakt `ids` object
///
/// Serialized exactly the way Trakt expects it inside request payloads, so
/// unset ids are omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MediaIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trakt: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb: Option<u64>,
}

impl MediaIds {
    pub fn with_trakt(trakt: u64) -> Self {
        Self {
            trakt: Some(trakt),
            ..Default::default()
        }
    }

    /// Id under the given provider, rendered as string for guid comparison
    pub fn get(&self, provider: &Provider) -> Option<String> {
        match provider {
            Provider::Imdb => self.imdb.clone(),
            Provider::Tmdb => self.tmdb.map(|id| id.to_string()),
            Provider::Tvdb => self.tvdb.map(|id| id.to_string()),
            _ => None,
        }
    }

    /// Whether these ids carry the guid's provider id
    pub fn matches(&self, guid: &Guid) -> bool {
        self.get(&guid.provider).as_deref() == Some(guid.id.as_str())
    }

    /// Fill unset fields from `other`
    pub fn merge(&mut self, other: &MediaIds) {
        if self.trakt.is_none() {
            self.trakt = other.trakt;
        }
        if self.slug.is_none() {
            self.slug = other.slug.clone();
        }
        if self.imdb.is_none() {
            self.imdb = other.imdb.clone();
        }
        if self.tmdb.is_none() {
            self.tmdb = other.tmdb;
        }
        if self.tvdb.is_none() {
            self.tvdb = other.tvdb;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trakt.is_none()
            && self.slug.is_none()
            && self.imdb.is_none()
            && self.tmdb.is_none()
            && self.tvdb.is_none()
    }
}
