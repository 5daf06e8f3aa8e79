use media_sync_models::{Guid, Provider, TraktItem};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Episodes of one Trakt show, addressable by number and by provider id
///
/// The number table is built eagerly from the show's seasons. The reverse
/// provider-id table is only built the first time a numbered lookup disagrees
/// with the Plex guid, which happens when the two sides order episodes
/// differently (DVD vs aired order, specials, ...).
pub struct EpisodeLookup {
    show: TraktItem,
    by_number: HashMap<(u32, u32), TraktItem>,
    by_id: OnceLock<HashMap<(Provider, String), TraktItem>>,
    mismatches: AtomicUsize,
}

impl EpisodeLookup {
    pub fn new(show: TraktItem, episodes: Vec<TraktItem>) -> Self {
        let by_number = episodes
            .into_iter()
            .filter_map(|episode| Some(((episode.season?, episode.number?), episode)))
            .collect();

        Self {
            show,
            by_number,
            by_id: OnceLock::new(),
            mismatches: AtomicUsize::new(0),
        }
    }

    pub fn show(&self) -> &TraktItem {
        &self.show
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }

    pub fn from_number(&self, season: u32, episode: u32) -> Option<&TraktItem> {
        self.by_number.get(&(season, episode))
    }

    pub fn from_id(&self, provider: &Provider, id: &str) -> Option<&TraktItem> {
        let by_id = self.by_id.get_or_init(|| {
            let mut by_id = HashMap::new();
            for episode in self.by_number.values() {
                for provider in [Provider::Imdb, Provider::Tmdb, Provider::Tvdb] {
                    if let Some(id) = episode.ids.get(&provider) {
                        by_id.entry((provider, id)).or_insert_with(|| episode.clone());
                    }
                }
            }
            debug!(
                "Built provider id table for {} with {} entries",
                self.show.label(),
                by_id.len()
            );
            by_id
        });
        by_id.get(&(provider.clone(), id.to_string()))
    }

    /// Find the Trakt episode for a Plex episode at `season`/`episode` carrying `guid`
    ///
    /// The numbered entry wins when it carries the guid's id, or carries no id
    /// for that provider at all. Otherwise the provider id decides.
    pub fn find(&self, guid: &Guid, season: Option<u32>, episode: Option<u32>) -> Option<TraktItem> {
        if let (Some(season), Some(episode)) = (season, episode) {
            if let Some(found) = self.from_number(season, episode) {
                match found.ids.get(&guid.provider) {
                    Some(id) if id == guid.id => return Some(found.clone()),
                    None => return Some(found.clone()),
                    Some(_) => {
                        self.note_mismatch(season, episode, guid);
                    }
                }
            }
        }

        self.from_id(&guid.provider, &guid.id).cloned()
    }

    /// Returns true when this call emitted the warning
    fn note_mismatch(&self, season: u32, episode: u32, guid: &Guid) -> bool {
        if self.mismatches.fetch_add(1, Ordering::Relaxed) > 0 {
            debug!(
                "{}: S{:02}E{:02} does not match {}, using provider id",
                self.show.label(),
                season,
                episode,
                guid
            );
            return false;
        }
        warn!(
            "Episode ordering of {} differs between Plex and Trakt (S{:02}E{:02} does not match {}), matching episodes by id",
            self.show.label(),
            season,
            episode,
            guid
        );
        true
    }

    pub fn mismatch_count(&self) -> usize {
        self.mismatches.load(Ordering::Relaxed)
    }
}
