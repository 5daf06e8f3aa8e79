use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// External id provider attached to a Plex guid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Imdb,
    Tmdb,
    Tvdb,
    Local,
    None,
    Plex,
    Unsupported(String),
}

impl Provider {
    pub fn parse(value: &str) -> Provider {
        match value {
            "imdb" => Provider::Imdb,
            "tmdb" | "themoviedb" => Provider::Tmdb,
            "tvdb" | "thetvdb" => Provider::Tvdb,
            "local" => Provider::Local,
            "none" => Provider::None,
            "plex" => Provider::Plex,
            other => Provider::Unsupported(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Provider::Imdb => "imdb",
            Provider::Tmdb => "tmdb",
            Provider::Tvdb => "tvdb",
            Provider::Local => "local",
            Provider::None => "none",
            Provider::Plex => "plex",
            Provider::Unsupported(name) => name,
        }
    }

    /// Canonical lookup order: tmdb, tvdb, imdb, then everything else
    pub fn priority(&self) -> u8 {
        match self {
            Provider::Tmdb => 0,
            Provider::Tvdb => 1,
            Provider::Imdb => 2,
            _ => 3,
        }
    }

    /// Whether Trakt can search by this provider
    pub fn is_resolvable(&self) -> bool {
        matches!(self, Provider::Imdb | Provider::Tmdb | Provider::Tvdb)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-scoped external id
///
/// Legacy agents may encode an episode as `<show>/<season>/<episode>`; in that
/// case `id` holds the show id and `season`/`episode` are set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Guid {
    pub provider: Provider,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// Parsed from a `com.plexapp.agents.*` guid
    #[serde(default)]
    pub legacy: bool,
}

pub fn is_imdb_id(value: &str) -> bool {
    value
        .strip_prefix("tt")
        .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

impl Guid {
    pub fn new(provider: Provider, id: impl Into<String>) -> Self {
        Self {
            provider,
            id: id.into(),
            season: None,
            episode: None,
            legacy: false,
        }
    }

    /// Parse a Plex guid string
    ///
    /// Accepts new-agent guids (`imdb://tt0113277`, `tmdb://949`, `plex://movie/5d77...`)
    /// and legacy agent guids (`com.plexapp.agents.thetvdb://73739/1/2?lang=en`).
    /// `xbmc_fallback` is the provider assumed for `xbmcnfo` guids that are not imdb ids.
    pub fn parse_with(raw: &str, xbmc_fallback: Option<&Provider>) -> Option<Guid> {
        let (scheme, rest) = raw.split_once("://")?;
        let rest = rest.split('?').next().unwrap_or("").trim_end_matches('/');

        let (provider, legacy) = match scheme.strip_prefix("com.plexapp.agents.") {
            Some("xbmcnfo") => (
                xbmc_fallback
                    .cloned()
                    .unwrap_or_else(|| Provider::Unsupported("xbmcnfo".to_string())),
                true,
            ),
            Some("hama") => {
                // hama ids look like `tvdb-73739/1/2` or `anidb-1234`
                let (prefix, id) = rest.split_once('-').unwrap_or(("", rest));
                let provider = match prefix {
                    "tvdb" | "tvdb2" | "tvdb3" | "tvdb4" | "tvdb5" => Provider::Tvdb,
                    "tmdb" => Provider::Tmdb,
                    "imdb" => Provider::Imdb,
                    other => Provider::Unsupported(format!("hama-{}", other)),
                };
                return Some(Self::from_path(provider, id, true));
            }
            Some(agent) => (Provider::parse(agent), true),
            None => (Provider::parse(scheme), false),
        };

        if provider == Provider::Plex {
            return Some(Guid::new(Provider::Plex, rest));
        }

        Some(Self::from_path(provider, rest, legacy))
    }

    pub fn parse(raw: &str) -> Option<Guid> {
        Self::parse_with(raw, None)
    }

    fn from_path(provider: Provider, path: &str, legacy: bool) -> Guid {
        let mut parts = path.split('/');
        let id = parts.next().unwrap_or("").to_string();
        let season = parts.next().and_then(|s| s.parse().ok());
        let episode = parts.next().and_then(|s| s.parse().ok());

        // `tt\d+` is an imdb id whatever agent produced it
        let provider = if is_imdb_id(&id) { Provider::Imdb } else { provider };

        Guid {
            provider,
            id,
            season,
            episode,
            legacy,
        }
    }

    /// Guid encodes `<show>/<season>/<episode>`
    pub fn is_episode_encoded(&self) -> bool {
        self.season.is_some() && self.episode.is_some()
    }

    /// An id Trakt accepts: `tt\d+` or numeric shorter than 12 digits
    pub fn is_valid_id(&self) -> bool {
        is_imdb_id(&self.id)
            || (!self.id.is_empty()
                && self.id.len() < 12
                && self.id.chars().all(|c| c.is_ascii_digit()))
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.provider, self.id)?;
        if let (Some(season), Some(episode)) = (self.season, self.episode) {
            write!(f, "/{}/{}", season, episode)?;
        }
        Ok(())
    }
}

/// Order guids as tmdb, tvdb, imdb, others, keeping the first guid of each provider
pub fn sort_guids(mut guids: Vec<Guid>) -> Vec<Guid> {
    guids.sort_by_key(|g| g.provider.priority());
    let mut seen = HashSet::new();
    guids.retain(|g| seen.insert(g.provider.clone()));
    guids
}
