use media_sync_models::{MediaType, ScrobbleAction, TraktItem};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::SyncResult;
use crate::write_queue::QueueHandle;

pub const DEFAULT_SCROBBLE_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrobbleState {
    Idle,
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct ScrobbleSession {
    pub item: TraktItem,
    pub state: ScrobbleState,
    pub last_progress: f64,
    /// Plex session key of the player, freed when the session ends
    pub session_key: Option<String>,
}

/// Scrobble sessions keyed by Trakt item, at most one per item
///
/// Every call is posted to the write queue; stopping below the threshold is
/// sent as a pause so Trakt keeps the playback position instead of marking
/// the item watched.
pub struct ScrobbleRegistry {
    queue: QueueHandle,
    threshold: f64,
    sessions: HashMap<(MediaType, u64), ScrobbleSession>,
}

impl ScrobbleRegistry {
    pub fn new(queue: QueueHandle, threshold: f64) -> Self {
        Self {
            queue,
            threshold,
            sessions: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn session(&mut self, item: &TraktItem, session_key: Option<&str>) -> &mut ScrobbleSession {
        let session = self.sessions.entry(item.key()).or_insert_with(|| {
            debug!("New scrobble session for {}", item.label());
            ScrobbleSession {
                item: item.clone(),
                state: ScrobbleState::Idle,
                last_progress: 0.0,
                session_key: None,
            }
        });
        if let Some(key) = session_key {
            session.session_key = Some(key.to_string());
        }
        session
    }

    pub async fn update(&mut self, item: &TraktItem, session_key: Option<&str>, progress: f64) -> SyncResult<()> {
        let session = self.session(item, session_key);
        session.state = ScrobbleState::Playing;
        session.last_progress = progress;
        self.queue.scrobble(ScrobbleAction::Start, item.clone(), progress).await
    }

    pub async fn pause(&mut self, item: &TraktItem, session_key: Option<&str>, progress: f64) -> SyncResult<()> {
        let session = self.session(item, session_key);
        session.state = ScrobbleState::Paused;
        session.last_progress = progress;
        self.queue.scrobble(ScrobbleAction::Pause, item.clone(), progress).await
    }

    /// End the session; returns its Plex session key
    pub async fn stop(&mut self, item: &TraktItem, session_key: Option<&str>, progress: f64) -> SyncResult<Option<String>> {
        if progress >= self.threshold {
            let session = self.session(item, session_key);
            session.state = ScrobbleState::Stopped;
            session.last_progress = progress;
            info!("{} watched at {:.2}%", item.label(), progress);
            self.queue.scrobble(ScrobbleAction::Stop, item.clone(), progress).await?;
        } else {
            debug!(
                "{} stopped at {:.2}%, below the {:.0}% threshold, pausing",
                item.label(),
                progress,
                self.threshold
            );
            self.pause(item, session_key, progress).await?;
        }
        Ok(self.sessions.remove(&item.key()).and_then(|s| s.session_key))
    }

    pub fn get(&self, item: &TraktItem) -> Option<&ScrobbleSession> {
        self.sessions.get(&item.key())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
