use media_sync_models::{ListRef, MediaType, PlexItem, TraktList};
use media_sync_sources::PlexServer;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::resolver::MediaPair;
use crate::retry::RetryPolicy;
use crate::trakt_state::TraktState;

/// A Trakt list being rendered into a Plex playlist
#[derive(Debug, Default)]
pub struct ListPlaylist {
    pub name: String,
    ranks: HashMap<(MediaType, u64), u32>,
    items: Vec<(u32, PlexItem)>,
}

impl ListPlaylist {
    pub fn new(list: &TraktList) -> Self {
        Self {
            name: list.name.clone(),
            ranks: list
                .items
                .iter()
                .map(|entry| (entry.item.key(), entry.rank))
                .collect(),
            items: Vec::new(),
        }
    }

    pub fn contains(&self, key: &(MediaType, u64)) -> bool {
        self.ranks.contains_key(key)
    }

    fn add(&mut self, pair: &MediaPair) {
        let Some(&rank) = self.ranks.get(&pair.trakt.key()) else {
            return;
        };

        if let Some((_, existing)) = self.items.iter().find(|(r, _)| *r == rank) {
            if is_other_edition(existing, &pair.plex) {
                debug!(
                    "{}: '{}' and '{}' are different editions of the same item",
                    self.name,
                    existing.label(),
                    pair.plex.label()
                );
            } else {
                warn!(
                    "{}: duplicate Plex items for {}: {} and {}",
                    self.name,
                    pair.trakt.label(),
                    existing.rating_key,
                    pair.plex.rating_key
                );
            }
        }
        self.items.push((rank, pair.plex.clone()));
    }

    /// Plex keys ordered by Trakt rank
    pub fn keys(&self) -> Vec<u64> {
        let mut items: Vec<&(u32, PlexItem)> = self.items.iter().collect();
        items.sort_by_key(|(rank, _)| *rank);
        items.into_iter().map(|(_, item)| item.rating_key).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Trakt lists collected during a run and written to Plex at the end
#[derive(Debug, Default)]
pub struct ListCollection {
    pending: Vec<ListRef>,
    lists: Vec<ListPlaylist>,
}

impl ListCollection {
    /// Register lists whose items still have to be fetched
    pub fn add_refs(&mut self, refs: impl IntoIterator<Item = ListRef>) {
        for list in refs {
            if !self.pending.iter().any(|p| p.trakt_id == list.trakt_id) {
                self.pending.push(list);
            }
        }
    }

    pub fn add_list(&mut self, list: &TraktList) {
        debug!("Collecting list '{}' with {} items", list.name, list.items.len());
        self.lists.push(ListPlaylist::new(list));
    }

    /// Fetch the items of every registered list
    ///
    /// A list that cannot be loaded is skipped.
    pub async fn load_pending(&mut self, state: &TraktState) -> SyncResult<()> {
        let retry: RetryPolicy = state.retry();
        let trakt = state.trakt();
        for list in std::mem::take(&mut self.pending) {
            let result = retry
                .run("list_items", &list.trakt_id.to_string(), || trakt.list_items(&list))
                .await;
            match result {
                Ok(items) => self.add_list(&items),
                Err(e) if !e.is_fatal() => warn!("Unable to load list '{}': {}", list.name, e),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Offer a walked pair to every list that contains its Trakt item
    pub fn offer(&mut self, pair: &MediaPair) {
        let key = pair.trakt.key();
        for list in self.lists.iter_mut().filter(|l| l.contains(&key)) {
            list.add(pair);
        }
    }

    pub fn lists(&self) -> &[ListPlaylist] {
        &self.lists
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.lists.is_empty()
    }

    /// Write every list to its playlist
    ///
    /// Playlists whose contents already match are left alone; empty lists
    /// remove their playlist.
    pub async fn sync(&self, plex: &dyn PlexServer) -> SyncResult<usize> {
        let mut updated = 0;
        for list in &self.lists {
            if update_playlist(plex, &list.name, &list.keys()).await? {
                updated += 1;
            }
        }
        Ok(updated)
    }
}

fn same_contents(a: &[u64], b: &[u64]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

/// Returns whether Plex was changed
pub async fn update_playlist(plex: &dyn PlexServer, name: &str, keys: &[u64]) -> SyncResult<bool> {
    let existing = plex.playlist(name).await?;
    match existing {
        None if keys.is_empty() => Ok(false),
        None => {
            info!("Creating playlist '{}' with {} items", name, keys.len());
            plex.create_playlist(name, keys).await?;
            Ok(true)
        }
        Some(playlist) if keys.is_empty() => {
            info!("Removing empty playlist '{}'", name);
            plex.delete_playlist(&playlist).await?;
            Ok(true)
        }
        Some(playlist) if same_contents(&playlist.items, keys) => {
            debug!("Playlist '{}' is up to date", name);
            Ok(false)
        }
        Some(playlist) => {
            info!("Updating playlist '{}' with {} items", name, keys.len());
            plex.update_playlist(&playlist, keys).await?;
            Ok(true)
        }
    }
}

/// Two copies of one title where at least one names its edition
fn is_other_edition(a: &PlexItem, b: &PlexItem) -> bool {
    (a.edition_title.is_some() || b.edition_title.is_some()) && a.edition_title != b.edition_title
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{movie, plex_movie, FakePlex, FakeTrakt, PlexCall};
    use media_sync_models::ListEntry;
    use media_sync_sources::PlexPlaylist;
    use std::sync::Arc;

    fn ranked(name: &str, entries: &[(u32, u64)]) -> TraktList {
        TraktList {
            trakt_id: 1,
            name: name.to_string(),
            items: entries
                .iter()
                .map(|(rank, id)| ListEntry {
                    rank: *rank,
                    item: movie(*id, "x"),
                })
                .collect(),
        }
    }

    fn pair(plex_key: u64, trakt_id: u64) -> MediaPair {
        MediaPair::new(plex_movie(plex_key, "x", "tt1"), movie(trakt_id, "x"), None)
    }

    #[test]
    fn test_keys_follow_rank() {
        let mut lists = ListCollection::default();
        lists.add_list(&ranked("Top", &[(3, 30), (1, 10), (2, 20)]));
        lists.offer(&pair(103, 30));
        lists.offer(&pair(101, 10));
        lists.offer(&pair(999, 99));
        lists.offer(&pair(102, 20));
        assert_eq!(lists.lists()[0].keys(), vec![101, 102, 103]);
    }

    #[test]
    fn test_edition_on_either_copy() {
        let plain = plex_movie(1, "Blade Runner", "tt0083658");
        let mut cut = plex_movie(2, "Blade Runner", "tt0083658");
        cut.edition_title = Some("Final Cut".to_string());

        assert!(is_other_edition(&plain, &cut));
        assert!(is_other_edition(&cut, &plain));
        assert!(!is_other_edition(&plain, &plain.clone()));
        assert!(!is_other_edition(&cut, &cut.clone()));
    }

    #[tokio::test]
    async fn test_playlist_written_only_when_contents_differ() {
        let plex = FakePlex::default();
        plex.playlists.lock().unwrap().push(PlexPlaylist {
            key: 1,
            title: "Top".to_string(),
            items: vec![102, 101],
        });

        assert!(!update_playlist(&plex, "Top", &[101, 102]).await.unwrap());
        assert!(update_playlist(&plex, "Top", &[101, 102, 103]).await.unwrap());
        assert!(update_playlist(&plex, "New", &[5]).await.unwrap());
        assert!(!update_playlist(&plex, "Empty", &[]).await.unwrap());

        assert_eq!(
            plex.writes(),
            vec![
                PlexCall::UpdatePlaylist("Top".to_string(), vec![101, 102, 103]),
                PlexCall::CreatePlaylist("New".to_string(), vec![5]),
            ]
        );
    }

    #[tokio::test]
    async fn test_load_pending_skips_missing_lists() {
        let trakt = FakeTrakt::default();
        trakt.lists.lock().unwrap().insert(1, ranked("Top", &[(1, 10)]));
        let state = TraktState::new(Arc::new(trakt), RetryPolicy::default());

        let mut lists = ListCollection::default();
        lists.add_refs(vec![
            ListRef {
                trakt_id: 1,
                name: "Top".to_string(),
                owner: None,
            },
            ListRef {
                trakt_id: 2,
                name: "Gone".to_string(),
                owner: None,
            },
        ]);
        lists.load_pending(&state).await.unwrap();
        assert_eq!(lists.lists().len(), 1);
        assert_eq!(lists.lists()[0].name, "Top");
    }
}
