use async_trait::async_trait;
use media_sync_config::WatchConfig;
use media_sync_models::{MediaType, PayloadEntry, SyncOp};
use media_sync_sources::PlexServer;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::SyncResult;
use crate::events::{Event, EventFilter, EventHandler, EventKind, PlayState, PlaySessionState, TIMELINE_DELETED_STATE};
use crate::resolver::{MediaPair, Resolver};
use crate::scrobbler::ScrobbleRegistry;
use crate::write_queue::QueueHandle;

/// Playback position reported to a progress display
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackUpdate {
    pub session_key: String,
    pub label: String,
    pub state: PlayState,
    pub percent: f64,
}

/// Turns Plex push events into scrobbles and collection updates
pub struct WatchStateUpdater {
    plex: Arc<dyn PlexServer>,
    resolver: Arc<Resolver>,
    queue: QueueHandle,
    scrobbler: ScrobbleRegistry,
    config: WatchConfig,
    username: Option<String>,
    /// Session key to owner, rebuilt from `/status/sessions` on a miss
    sessions: HashMap<String, Option<String>>,
    /// Resolved items by rating key; deleted items can only be found here
    pairs: HashMap<u64, Arc<MediaPair>>,
    shows: HashMap<u64, Option<Arc<MediaPair>>>,
    progress: Option<mpsc::UnboundedSender<PlaybackUpdate>>,
}

impl WatchStateUpdater {
    pub fn new(
        plex: Arc<dyn PlexServer>,
        resolver: Arc<Resolver>,
        queue: QueueHandle,
        config: WatchConfig,
        username: Option<String>,
    ) -> Self {
        let scrobbler = ScrobbleRegistry::new(queue.clone(), config.scrobble_threshold as f64);
        Self {
            plex,
            resolver,
            queue,
            scrobbler,
            config,
            username,
            sessions: HashMap::new(),
            pairs: HashMap::new(),
            shows: HashMap::new(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<PlaybackUpdate>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn scrobbler(&self) -> &ScrobbleRegistry {
        &self.scrobbler
    }

    /// Owner of a playback session; `None` once the session is gone
    async fn session_user(&mut self, session_key: &str) -> SyncResult<Option<String>> {
        if !self.sessions.contains_key(session_key) {
            let sessions = self.plex.sessions().await?;
            debug!("Refreshed {} playback sessions", sessions.len());
            self.sessions = sessions
                .into_iter()
                .map(|s| (s.session_key, s.username))
                .collect();
        }
        match self.sessions.get(session_key) {
            Some(owner) => Ok(owner.clone()),
            None => Ok(None),
        }
    }

    async fn is_own_session(&mut self, session_key: &str) -> SyncResult<bool> {
        if !self.config.username_filter {
            return Ok(true);
        }
        let Some(username) = self.username.clone() else {
            return Ok(true);
        };
        match self.session_user(session_key).await? {
            Some(owner) if owner == username => Ok(true),
            Some(owner) => {
                debug!("Ignoring session {} of {}", session_key, owner);
                Ok(false)
            }
            None => {
                debug!("Session {} has ended", session_key);
                Ok(false)
            }
        }
    }

    async fn show_pair(&mut self, show_key: u64) -> SyncResult<Option<Arc<MediaPair>>> {
        if let Some(pair) = self.shows.get(&show_key) {
            return Ok(pair.clone());
        }
        let pair = match self.plex.fetch_item(show_key).await? {
            Some(show) => self.resolver.resolve(&show, None).await?.map(Arc::new),
            None => None,
        };
        self.shows.insert(show_key, pair.clone());
        Ok(pair)
    }

    /// Resolve a Plex rating key, caching the pair
    async fn pair(&mut self, rating_key: u64) -> SyncResult<Option<Arc<MediaPair>>> {
        if let Some(pair) = self.pairs.get(&rating_key) {
            return Ok(Some(pair.clone()));
        }
        let Some(item) = self.plex.fetch_item(rating_key).await? else {
            debug!("Item {} not found on Plex", rating_key);
            return Ok(None);
        };
        let parent = match (item.media_type, item.show_key) {
            (MediaType::Episode, Some(show_key)) => self.show_pair(show_key).await?,
            _ => None,
        };
        let Some(pair) = self.resolver.resolve(&item, parent).await? else {
            info!("{}: not found on Trakt", item.label());
            return Ok(None);
        };
        let pair = Arc::new(pair);
        self.pairs.insert(rating_key, pair.clone());
        Ok(Some(pair))
    }

    async fn on_play_session(&mut self, event: &PlaySessionState) -> SyncResult<()> {
        if event.state == PlayState::Buffering {
            return Ok(());
        }
        if !self.is_own_session(&event.session_key).await? {
            return Ok(());
        }
        let Some(pair) = self.pair(event.rating_key).await? else {
            return Ok(());
        };
        let Some(duration) = pair.plex.duration.filter(|d| *d > 0) else {
            debug!("{}: no duration, cannot scrobble", pair.label());
            return Ok(());
        };

        let percent = event.view_offset as f64 / duration as f64 * 100.0;
        debug!(
            "{} {} at {:.2}% (session {})",
            pair.label(),
            event.state.as_str(),
            percent,
            event.session_key
        );
        if let Some(progress) = &self.progress {
            // the display may be gone, scrobbling goes on
            let _ = progress.send(PlaybackUpdate {
                session_key: event.session_key.clone(),
                label: pair.label(),
                state: event.state,
                percent,
            });
        }

        let session_key = Some(event.session_key.as_str());
        match event.state {
            PlayState::Playing => self.scrobbler.update(&pair.trakt, session_key, percent).await,
            PlayState::Paused => self.scrobbler.pause(&pair.trakt, session_key, percent).await,
            PlayState::Stopped => {
                if let Some(freed) = self.scrobbler.stop(&pair.trakt, session_key, percent).await? {
                    self.sessions.remove(&freed);
                }
                Ok(())
            }
            PlayState::Buffering => Ok(()),
        }
    }

    async fn on_library_added(&mut self, rating_key: u64) -> SyncResult<()> {
        let Some(pair) = self.pair(rating_key).await? else {
            return Ok(());
        };
        info!("Adding {} to the Trakt collection", pair.label());
        let mut entry = PayloadEntry::new(pair.trakt.ids.clone());
        entry.collected_at = pair.plex.added_at;
        self.queue
            .add(SyncOp::AddCollection, pair.media_type(), entry)
            .await
    }

    async fn on_library_deleted(&mut self, rating_key: u64) -> SyncResult<()> {
        let Some(pair) = self.pairs.remove(&rating_key) else {
            debug!("Deleted item {} was never resolved, nothing to remove", rating_key);
            return Ok(());
        };
        info!("Removing {} from the Trakt collection", pair.label());
        self.queue
            .add(
                SyncOp::RemoveCollection,
                pair.media_type(),
                PayloadEntry::new(pair.trakt.ids.clone()),
            )
            .await
    }
}

#[async_trait]
impl EventHandler for WatchStateUpdater {
    fn name(&self) -> &'static str {
        "WatchStateUpdater"
    }

    fn filters(&self) -> Vec<EventFilter> {
        let mut filters = vec![EventFilter::new(EventKind::PlaySessionState)];
        if self.config.add_collection {
            filters.push(
                EventFilter::new(EventKind::Activity)
                    .with("event", "ended")
                    .with("progress", "100")
                    .with("type", "library.refresh.items"),
            );
        }
        if self.config.remove_collection {
            filters.push(
                EventFilter::new(EventKind::Timeline)
                    .with("state", TIMELINE_DELETED_STATE.to_string())
                    .with("metadata_state", "deleted"),
            );
        }
        filters
    }

    async fn handle(&mut self, event: &Event) -> anyhow::Result<()> {
        match event {
            Event::PlaySessionState(state) => self.on_play_session(state).await?,
            Event::Activity(activity) => {
                if let Some(key) = activity.key {
                    self.on_library_added(key).await?;
                }
            }
            Event::Timeline(timeline) => self.on_library_deleted(timeline.item_id).await?,
            Event::Error(_) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ActivityEvent, TimelineEvent};
    use crate::rate::RateGovernor;
    use crate::retry::RetryPolicy;
    use crate::testing::{movie, plex_movie, FakePlex, FakeTrakt};
    use crate::write_queue::{TraktWriter, WriteQueue};
    use media_sync_models::{Provider, ScrobbleAction};
    use media_sync_sources::PlexSession;
    use std::time::Duration;

    const MINUTE: u64 = 60 * 1000;

    fn fixture() -> (Arc<FakePlex>, Arc<FakeTrakt>) {
        let plex = FakePlex::default();
        let mut heat = plex_movie(500, "Heat", "tt0113277");
        heat.duration = Some(60 * MINUTE);
        plex.add_item(heat);
        plex.sessions.lock().unwrap().extend([
            PlexSession {
                session_key: "23".to_string(),
                rating_key: 500,
                username: Some("me".to_string()),
            },
            PlexSession {
                session_key: "24".to_string(),
                rating_key: 500,
                username: Some("guest".to_string()),
            },
        ]);

        let trakt = FakeTrakt::default();
        trakt.add_search(Provider::Imdb, "tt0113277", movie(500, "Heat"));
        (Arc::new(plex), Arc::new(trakt))
    }

    fn updater(plex: &Arc<FakePlex>, trakt: &Arc<FakeTrakt>, queue: &WriteQueue, config: WatchConfig) -> WatchStateUpdater {
        let resolver = Arc::new(Resolver::new(trakt.clone(), RetryPolicy::default()));
        WatchStateUpdater::new(plex.clone(), resolver, queue.handle(), config, Some("me".to_string()))
    }

    fn start_queue(trakt: &Arc<FakeTrakt>) -> WriteQueue {
        let writer = TraktWriter::new(trakt.clone(), Arc::new(RateGovernor::default()), RetryPolicy::default());
        WriteQueue::start(writer, Duration::from_secs(5))
    }

    fn play(session: &str, state: PlayState, minutes: u64) -> Event {
        Event::PlaySessionState(PlaySessionState {
            session_key: session.to_string(),
            rating_key: 500,
            view_offset: minutes * MINUTE,
            state,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrobble_sequence() {
        let (plex, trakt) = fixture();
        let queue = start_queue(&trakt);
        let mut updater = updater(&plex, &trakt, &queue, WatchConfig::default());

        for event in [
            play("23", PlayState::Playing, 0),
            play("23", PlayState::Playing, 10),
            play("23", PlayState::Paused, 10),
            play("23", PlayState::Playing, 52),
            play("23", PlayState::Stopped, 54),
        ] {
            updater.handle(&event).await.unwrap();
        }
        assert!(updater.scrobbler().is_empty());
        drop(updater);
        queue.close().await.unwrap();

        assert_eq!(
            trakt.scrobble_calls(),
            vec![
                (ScrobbleAction::Start, 500, 0.0),
                (ScrobbleAction::Start, 500, 16.67),
                (ScrobbleAction::Pause, 500, 16.67),
                (ScrobbleAction::Start, 500, 86.67),
                (ScrobbleAction::Stop, 500, 90.0),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_users_are_ignored() {
        let (plex, trakt) = fixture();
        let queue = start_queue(&trakt);
        let mut updater = updater(&plex, &trakt, &queue, WatchConfig::default());

        updater.handle(&play("24", PlayState::Playing, 5)).await.unwrap();
        // unknown session after a refresh means it ended
        updater.handle(&play("99", PlayState::Playing, 5)).await.unwrap();
        drop(updater);
        queue.close().await.unwrap();

        assert!(trakt.scrobble_calls().is_empty());
        // "99" forced a second sessions refresh
        let refreshes = plex
            .calls()
            .into_iter()
            .filter(|c| *c == crate::testing::PlexCall::Sessions)
            .count();
        assert_eq!(refreshes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_library_events_update_collection() {
        let (plex, trakt) = fixture();
        let queue = start_queue(&trakt);
        let config = WatchConfig {
            add_collection: true,
            remove_collection: true,
            ..Default::default()
        };
        let mut updater = updater(&plex, &trakt, &queue, config);
        assert_eq!(updater.filters().len(), 3);

        updater
            .handle(&Event::Activity(ActivityEvent {
                event: "ended".to_string(),
                activity_type: "library.refresh.items".to_string(),
                progress: 100,
                key: Some(500),
            }))
            .await
            .unwrap();

        plex.items.lock().unwrap().clear();
        updater
            .handle(&Event::Timeline(TimelineEvent {
                item_id: 500,
                state: TIMELINE_DELETED_STATE,
                metadata_state: Some("deleted".to_string()),
            }))
            .await
            .unwrap();
        drop(updater);
        queue.close().await.unwrap();

        assert_eq!(trakt.syncs_for(SyncOp::AddCollection).len(), 1);
        let removed = trakt.syncs_for(SyncOp::RemoveCollection);
        assert_eq!(removed[0].movies[0].ids.trakt, Some(500));
    }
}
