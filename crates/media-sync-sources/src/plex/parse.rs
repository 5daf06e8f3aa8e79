use chrono::{DateTime, TimeZone, Utc};
use media_sync_models::{Guid, MediaType, PlexItem, PlexWatchlistItem, Provider};
use serde_json::Value;

use super::{HistoryEntry, PlexPlaylist, PlexSession, Section};

/// Legacy `xbmcnfo` guids name no provider; these are assumed per item type
#[derive(Debug, Clone)]
pub struct XbmcFallback {
    pub movies: Provider,
    pub shows: Provider,
}

impl Default for XbmcFallback {
    fn default() -> Self {
        Self {
            movies: Provider::Imdb,
            shows: Provider::Tvdb,
        }
    }
}

impl XbmcFallback {
    fn for_type(&self, media_type: MediaType) -> &Provider {
        match media_type {
            MediaType::Movie => &self.movies,
            _ => &self.shows,
        }
    }
}

pub(crate) fn container(json: &Value) -> &Value {
    json.get("MediaContainer").unwrap_or(&Value::Null)
}

pub(crate) fn metadata(json: &Value) -> &[Value] {
    container(json)
        .get("Metadata")
        .and_then(|m| m.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[])
}

/// Plex sends keys as strings, occasionally as numbers
pub(crate) fn parse_key(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

pub(crate) fn parse_u32(value: Option<&Value>) -> Option<u32> {
    parse_key(value).and_then(|v| u32::try_from(v).ok())
}

pub(crate) fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(|t| t.as_i64())
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
}

fn parse_str(item: &Value, field: &str) -> Option<String> {
    item.get(field).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Collect the item's main `guid` plus every entry of its `Guid` array
pub(crate) fn parse_guids(item: &Value, fallback: &Provider) -> Vec<Guid> {
    let mut raw = Vec::new();
    if let Some(guid) = item.get("guid").and_then(|g| g.as_str()) {
        raw.push(guid);
    }
    match item.get("Guid") {
        Some(Value::Array(entries)) => {
            for entry in entries {
                if let Some(id) = entry.get("id").and_then(|i| i.as_str()).or_else(|| entry.as_str()) {
                    raw.push(id);
                }
            }
        }
        Some(Value::Object(entry)) => {
            if let Some(id) = entry.get("id").and_then(|i| i.as_str()) {
                raw.push(id);
            }
        }
        _ => {}
    }

    raw.into_iter()
        .filter_map(|g| Guid::parse_with(g, Some(fallback)))
        .collect()
}

pub(crate) fn parse_item(item: &Value, xbmc: &XbmcFallback) -> Option<PlexItem> {
    let rating_key = parse_key(item.get("ratingKey"))?;
    let media_type = item.get("type").and_then(|t| t.as_str()).and_then(MediaType::parse)?;
    let title = parse_str(item, "title").unwrap_or_default();

    let mut plex = PlexItem::new(rating_key, media_type, title)
        .with_guids(parse_guids(item, xbmc.for_type(media_type)));
    plex.year = parse_u32(item.get("year"));
    plex.added_at = parse_timestamp(item.get("addedAt"));
    plex.last_viewed_at = parse_timestamp(item.get("lastViewedAt"));
    plex.view_count = parse_u32(item.get("viewCount")).unwrap_or(0);
    plex.view_offset = parse_key(item.get("viewOffset"));
    plex.duration = parse_key(item.get("duration"));
    plex.user_rating = item.get("userRating").and_then(|r| r.as_f64()).map(|r| r as f32);
    plex.rated_at = parse_timestamp(item.get("lastRatedAt"));
    plex.edition_title = parse_str(item, "editionTitle");
    plex.library_section_id = parse_u32(item.get("librarySectionID"));

    if media_type == MediaType::Episode {
        plex.show_key = parse_key(item.get("grandparentRatingKey"));
        plex.show_title = parse_str(item, "grandparentTitle");
        plex.season_number = parse_u32(item.get("parentIndex"));
        plex.episode_number = parse_u32(item.get("index"));
    }

    Some(plex)
}

pub(crate) fn parse_items(json: &Value, xbmc: &XbmcFallback) -> Vec<PlexItem> {
    metadata(json).iter().filter_map(|item| parse_item(item, xbmc)).collect()
}

pub(crate) fn parse_sections(json: &Value) -> Vec<Section> {
    container(json)
        .get("Directory")
        .and_then(|d| d.as_array())
        .map(|dirs| {
            dirs.iter()
                .filter_map(|dir| {
                    let media_type = dir.get("type").and_then(|t| t.as_str()).and_then(MediaType::parse)?;
                    if !matches!(media_type, MediaType::Movie | MediaType::Show) {
                        return None;
                    }
                    Some(Section {
                        key: parse_u32(dir.get("key"))?,
                        title: parse_str(dir, "title").unwrap_or_default(),
                        media_type,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_total(json: &Value, fallback: usize) -> u32 {
    parse_u32(container(json).get("totalSize")).unwrap_or(fallback as u32)
}

pub(crate) fn parse_history(json: &Value) -> Vec<HistoryEntry> {
    metadata(json)
        .iter()
        .map(|entry| HistoryEntry {
            viewed_at: parse_timestamp(entry.get("viewedAt")),
            account_id: parse_key(entry.get("accountID")),
        })
        .collect()
}

pub(crate) fn parse_playlists(json: &Value) -> Vec<PlexPlaylist> {
    metadata(json)
        .iter()
        .filter_map(|entry| {
            Some(PlexPlaylist {
                key: parse_key(entry.get("ratingKey"))?,
                title: parse_str(entry, "title")?,
                items: Vec::new(),
            })
        })
        .collect()
}

pub(crate) fn parse_sessions(json: &Value) -> Vec<PlexSession> {
    metadata(json)
        .iter()
        .filter_map(|entry| {
            let session_key = match entry.get("sessionKey")? {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some(PlexSession {
                session_key,
                rating_key: parse_key(entry.get("ratingKey"))?,
                username: entry
                    .get("User")
                    .and_then(|u| u.get("title"))
                    .and_then(|t| t.as_str())
                    .map(|s| s.to_string()),
            })
        })
        .collect()
}

fn parse_discover_item(item: &Value) -> Option<PlexWatchlistItem> {
    let key = parse_str(item, "ratingKey")?;
    let media_type = item.get("type").and_then(|t| t.as_str()).and_then(MediaType::parse)?;
    let title = parse_str(item, "title").unwrap_or_default();
    let guids = parse_guids(item, &Provider::Unsupported("xbmcnfo".to_string()));
    let mut entry = PlexWatchlistItem::new(key, media_type, title, guids);
    entry.year = parse_u32(item.get("year"));
    Some(entry)
}

pub(crate) fn parse_watchlist(json: &Value) -> Vec<PlexWatchlistItem> {
    metadata(json).iter().filter_map(parse_discover_item).collect()
}

/// Discover search nests results as `SearchResults[].SearchResult[].Metadata`
pub(crate) fn parse_discover_search(json: &Value) -> Vec<PlexWatchlistItem> {
    container(json)
        .get("SearchResults")
        .and_then(|r| r.as_array())
        .into_iter()
        .flatten()
        .filter_map(|group| group.get("SearchResult").and_then(|r| r.as_array()))
        .flatten()
        .filter_map(|result| result.get("Metadata"))
        .filter_map(parse_discover_item)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_movie_new_agent() {
        let item = json!({
            "ratingKey": "101",
            "type": "movie",
            "title": "Heat",
            "year": 1995,
            "viewCount": 1,
            "lastViewedAt": 1704916800,
            "userRating": 8.0,
            "guid": "plex://movie/5d776b5e1e5c36001f8e9b8a",
            "Guid": [{"id": "imdb://tt0113277"}, {"id": "tmdb://949"}]
        });
        let plex = parse_item(&item, &XbmcFallback::default()).unwrap();
        assert_eq!(plex.rating_key, 101);
        assert_eq!(plex.year, Some(1995));
        assert!(plex.is_watched());
        assert_eq!(plex.rating(), Some(8));
        assert_eq!(plex.guids[0].provider, Provider::Tmdb);
        assert_eq!(plex.guids[1].provider, Provider::Imdb);
        assert_eq!(plex.last_viewed_at.unwrap().to_rfc3339(), "2024-01-10T20:00:00+00:00");
    }

    #[test]
    fn test_parse_episode_legacy_agent() {
        let item = json!({
            "ratingKey": 202,
            "type": "episode",
            "title": "Pilot",
            "grandparentRatingKey": "200",
            "grandparentTitle": "Show",
            "parentIndex": 1,
            "index": 2,
            "guid": "com.plexapp.agents.thetvdb://73739/1/2?lang=en"
        });
        let plex = parse_item(&item, &XbmcFallback::default()).unwrap();
        assert_eq!(plex.show_key, Some(200));
        assert_eq!(plex.season_number, Some(1));
        assert_eq!(plex.episode_number, Some(2));
        assert!(plex.guids[0].is_episode_encoded());
    }

    #[test]
    fn test_xbmcnfo_fallback_by_type() {
        let xbmc = XbmcFallback {
            movies: Provider::Tmdb,
            shows: Provider::Tvdb,
        };
        let movie = json!({"ratingKey": "1", "type": "movie", "guid": "com.plexapp.agents.xbmcnfo://949"});
        assert_eq!(parse_item(&movie, &xbmc).unwrap().guids[0].provider, Provider::Tmdb);
    }

    #[test]
    fn test_parse_sections_skips_music() {
        let json = json!({"MediaContainer": {"Directory": [
            {"key": "1", "type": "movie", "title": "Movies"},
            {"key": "2", "type": "artist", "title": "Music"},
            {"key": "3", "type": "show", "title": "TV"}
        ]}});
        let sections = parse_sections(&json);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].media_type, MediaType::Show);
    }

    #[test]
    fn test_parse_sessions() {
        let json = json!({"MediaContainer": {"Metadata": [
            {"sessionKey": "23", "ratingKey": "500", "User": {"title": "alice"}}
        ]}});
        let sessions = parse_sessions(&json);
        assert_eq!(sessions[0].session_key, "23");
        assert_eq!(sessions[0].username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_parse_discover_search() {
        let json = json!({"MediaContainer": {"SearchResults": [
            {"SearchResult": [
                {"Metadata": {"ratingKey": "5d77", "type": "movie", "title": "Heat", "year": 1995,
                              "guid": "plex://movie/5d77", "Guid": [{"id": "imdb://tt0113277"}]}}
            ]}
        ]}});
        let results = parse_discover_search(&json);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, "5d77");
        assert_eq!(results[0].guids[0].provider, Provider::Imdb);
    }
}
